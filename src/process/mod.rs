//! Process supervision.
//!
//! [`ProcessManager`] owns one [`Supervisor`] per configured command. Each
//! supervisor gates its child on requirements, captures its output, and
//! restarts it with [`Backoff`] until closed.

pub mod backoff;
pub mod env;
pub mod manager;
pub mod ports;
pub mod signal;
pub mod status;
pub mod supervisor;

pub use backoff::Backoff;
pub use manager::ProcessManager;
pub use ports::listening_ports;
pub use status::{CommandEcho, ProcessStatus};
pub use supervisor::Supervisor;
