//! Fixed delay: satisfied once a number of milliseconds has passed since the
//! check was built.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::deps::{Broker, CheckOutcome, Depender, StringMap};
use crate::error::{CynoError, Result};

pub const KIND: &str = "wait";

pub fn create(_config: &StringMap) -> Result<Arc<dyn Broker>> {
    Ok(Arc::new(WaitBroker))
}

struct WaitBroker;

impl Broker for WaitBroker {
    fn kind(&self) -> &str {
        KIND
    }

    fn dep(&self, wait: &str) -> Result<Arc<dyn Depender>> {
        let millis: u64 = wait.trim().parse().map_err(|e| {
            CynoError::Config(format!("invalid wait duration '{}': {}", wait, e))
        })?;
        Ok(Arc::new(Delay {
            millis,
            deadline: Instant::now() + Duration::from_millis(millis),
        }))
    }
}

struct Delay {
    millis: u64,
    deadline: Instant,
}

#[async_trait]
impl Depender for Delay {
    async fn check(&self) -> CheckOutcome {
        let message = format!("{} {}ms", KIND, self.millis);
        if Instant::now() < self.deadline {
            return CheckOutcome::waiting(format!("{} waiting", message));
        }
        CheckOutcome::ready(format!("{} complete", message))
    }
}
