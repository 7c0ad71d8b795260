//! Output pipes for supervised processes.
//!
//! A [`Pipe`] receives the raw bytes a child writes to stdout and stderr.
//! Every pipe owns an [`Observation`] that matches those bytes against the
//! declared watches. Implementations:
//!
//! - [`LoggingPipe`]: splits output into lines and keeps them in memory
//! - [`StandardPipe`]: copies output to the supervisor's own stdout/stderr
//! - [`PlexingPipe`]: fans each write out to several pipes

pub mod lines;
pub mod logging;
pub mod observation;
pub mod plexing;
pub mod standard;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use lines::LineSplitter;
pub use logging::{json_fields, LineParser, LogEntry, LogLine, LoggingPipe};
pub use observation::{Observation, Watch, WatchEffect, WatchSet};
pub use plexing::PlexingPipe;
pub use standard::StandardPipe;

/// Longest line kept intact, in bytes.
pub const MAX_LINE_LENGTH: usize = 2 * 1024 * 1024;

/// Appended to a cut line and prefixed to its carried remainder.
pub const TRUNCATION_MARKER: &str = "…";

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamClass {
    Out,
    Err,
}

impl StreamClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamClass::Out => "out",
            StreamClass::Err => "err",
        }
    }
}

impl std::fmt::Display for StreamClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sink for a child's two output streams.
pub trait Pipe: Send + Sync {
    fn observation(&self) -> &Observation;

    /// Handle one raw chunk from `class`. Returns the number of bytes
    /// consumed, which is always the whole chunk on success.
    fn write(&self, class: StreamClass, chunk: &[u8]) -> Result<usize>;

    /// Emit anything buffered for `class`, such as an unterminated line.
    fn flush(&self, _class: StreamClass) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_class_names() {
        assert_eq!(StreamClass::Out.as_str(), "out");
        assert_eq!(StreamClass::Err.to_string(), "err");
        assert_eq!(serde_json::to_string(&StreamClass::Err).unwrap(), "\"err\"");
    }
}
