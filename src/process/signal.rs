//! Signal delivery to supervised children.
//!
//! Children are spawned as leaders of their own process group, so every
//! signal goes to the whole group: grandchildren holding the output pipes
//! stop with their parent.

use std::io;

/// Ask the process group led by `pgid` to stop (SIGINT).
pub fn interrupt_group(pgid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        send_group(pgid, libc::SIGINT)
    }
    #[cfg(not(unix))]
    {
        unsupported(pgid)
    }
}

/// Force the process group led by `pgid` to stop (SIGKILL).
pub fn kill_group(pgid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        send_group(pgid, libc::SIGKILL)
    }
    #[cfg(not(unix))]
    {
        unsupported(pgid)
    }
}

#[cfg(unix)]
fn send_group(pgid: u32, signal: libc::c_int) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .ok()
        .filter(|pgid| *pgid > 1)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "pgid out of range"))?;
    // SAFETY: killpg(2) takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn unsupported(_pgid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_out_of_range_pgid() {
        let err = interrupt_group(u32::MAX).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(kill_group(1).unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_interrupt_reaches_grandchild() {
        let mut child = tokio::process::Command::new("/bin/sh")
            .args(["-c", "sleep 30; sleep 30"])
            .process_group(0)
            .spawn()
            .unwrap();
        interrupt_group(child.id().unwrap()).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_kill_group() {
        let mut child = tokio::process::Command::new("/bin/sh")
            .args(["-c", "trap '' INT; sleep 30; sleep 30"])
            .process_group(0)
            .spawn()
            .unwrap();
        kill_group(child.id().unwrap()).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!status.success());
    }
}
