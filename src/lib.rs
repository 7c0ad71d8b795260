//! Cynosure - dependency-gated process supervisor
//!
//! Each supervised process waits until its declared requirements hold, runs
//! with captured output, and is restarted with backoff when it exits.

pub mod config;
pub mod context;
pub mod deps;
pub mod error;
pub mod pipes;
pub mod process;
pub mod utils;

pub use config::Config;
pub use context::AppContext;
pub use deps::{Broker, CheckOutcome, CheckReport, Depender, DependencyList};
pub use deps::{InstanceRegistry, ProviderRegistry};
pub use error::{CynoError, Result};
pub use pipes::{LoggingPipe, Pipe, StreamClass};
pub use process::{ProcessManager, ProcessStatus, Supervisor};
