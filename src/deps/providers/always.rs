//! Constant readiness, mostly useful for wiring and tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::deps::{Broker, CheckOutcome, Depender, StringMap};
use crate::error::{CynoError, Result};

pub const KIND: &str = "always";

/// Build an `always` broker. Settings must carry `state` = `true` or `false`.
pub fn create(config: &StringMap) -> Result<Arc<dyn Broker>> {
    let state = match config.get("state").map(String::as_str) {
        Some("true") => true,
        Some("false") => false,
        other => {
            return Err(CynoError::Config(format!(
                "unknown state {}",
                other.unwrap_or("")
            )))
        }
    };
    Ok(Arc::new(AlwaysBroker { state }))
}

struct AlwaysBroker {
    state: bool,
}

impl Broker for AlwaysBroker {
    fn kind(&self) -> &str {
        KIND
    }

    fn dep(&self, _wait: &str) -> Result<Arc<dyn Depender>> {
        Ok(Arc::new(Always { state: self.state }))
    }
}

struct Always {
    state: bool,
}

#[async_trait]
impl Depender for Always {
    async fn check(&self) -> CheckOutcome {
        CheckOutcome::new(format!("{} {}", KIND, self.state), self.state)
    }
}
