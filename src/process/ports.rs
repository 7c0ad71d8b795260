//! Listening sockets owned by a process.
//!
//! Linux only: socket inodes from `/proc/<pid>/fd` are matched against the
//! LISTEN entries of `/proc/net/tcp` and `/proc/net/tcp6`. Elsewhere, and on
//! any read failure, the list is empty.

/// `ip:port` for every TCP socket `pid` listens on. Wildcard addresses are
/// shown as `:port`.
pub fn listening_ports(pid: u32) -> Vec<String> {
    #[cfg(target_os = "linux")]
    {
        linux::listening(pid).unwrap_or_default()
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = pid;
        Vec::new()
    }
}

/// Parse one `/proc/net/tcp{,6}` row. Returns the local address and inode of
/// a LISTEN socket.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_listen_row(row: &str) -> Option<(String, u64)> {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    const LISTEN: &str = "0A";

    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() < 10 || fields[3] != LISTEN {
        return None;
    }

    let (ip_hex, port_hex) = fields[1].split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let inode = fields[9].parse().ok()?;

    // Addresses are printed as native-endian 32-bit words.
    let ip = match ip_hex.len() {
        8 => {
            let word = u32::from_str_radix(ip_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(&ip_hex[i * 8..i * 8 + 8], 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };

    let address = if ip.is_unspecified() {
        format!(":{}", port)
    } else {
        match ip {
            IpAddr::V4(v4) => format!("{}:{}", v4, port),
            IpAddr::V6(v6) => format!("[{}]:{}", v6, port),
        }
    };
    Some((address, inode))
}

#[cfg(target_os = "linux")]
mod linux {
    use std::collections::HashSet;
    use std::fs;
    use std::io;

    use super::parse_listen_row;

    const TABLES: &[&str] = &["/proc/net/tcp", "/proc/net/tcp6"];

    pub(super) fn listening(pid: u32) -> io::Result<Vec<String>> {
        let inodes = socket_inodes(pid)?;
        if inodes.is_empty() {
            return Ok(Vec::new());
        }

        let mut ports = Vec::new();
        for table in TABLES {
            let Ok(content) = fs::read_to_string(table) else {
                continue;
            };
            for row in content.lines().skip(1) {
                if let Some((address, inode)) = parse_listen_row(row) {
                    if inodes.contains(&inode) {
                        ports.push(address);
                    }
                }
            }
        }
        ports.sort();
        ports.dedup();
        Ok(ports)
    }

    fn socket_inodes(pid: u32) -> io::Result<HashSet<u64>> {
        let mut inodes = HashSet::new();
        for entry in fs::read_dir(format!("/proc/{}/fd", pid))? {
            let Ok(target) = fs::read_link(entry?.path()) else {
                continue;
            };
            let target = target.to_string_lossy();
            if let Some(inode) = target
                .strip_prefix("socket:[")
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|inode| inode.parse().ok())
            {
                inodes.insert(inode);
            }
        }
        Ok(inodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_endian = "little")]
    fn test_parse_ipv4_listen() {
        let row = "   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 123456 1 0000000000000000 100 0 0 10 0";
        let (address, inode) = parse_listen_row(row).unwrap();
        assert_eq!(address, "127.0.0.1:8080");
        assert_eq!(inode, 123456);
    }

    #[test]
    fn test_parse_wildcard() {
        let row = "   1: 00000000:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 42 1 0000000000000000 100 0 0 10 0";
        let (address, _) = parse_listen_row(row).unwrap();
        assert_eq!(address, ":80");

        let row6 = "   0: 00000000000000000000000000000000:1F90 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 77 1 0000000000000000 100 0 0 10 0";
        let (address, inode) = parse_listen_row(row6).unwrap();
        assert_eq!(address, ":8080");
        assert_eq!(inode, 77);
    }

    #[test]
    #[cfg(target_endian = "little")]
    fn test_parse_ipv6_loopback() {
        let row = "   0: 00000000000000000000000001000000:1F90 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 88 1 0000000000000000 100 0 0 10 0";
        let (address, _) = parse_listen_row(row).unwrap();
        assert_eq!(address, "[::1]:8080");
    }

    #[test]
    fn test_parse_skips_non_listen() {
        let row = "   2: 0100007F:1F90 0100007F:C350 01 00000000:00000000 00:00000000 00000000  1000        0 999 1 0000000000000000 20 4 30 10 -1";
        assert!(parse_listen_row(row).is_none());
        assert!(parse_listen_row("  sl  local_address rem_address   st").is_none());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_own_listener_found() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let ports = listening_ports(std::process::id());
        assert!(
            ports.contains(&format!("127.0.0.1:{}", port)),
            "{:?}",
            ports
        );
    }

    #[test]
    fn test_missing_process() {
        assert!(listening_ports(u32::MAX).is_empty());
    }
}
