//! Built-in broker providers.
//!
//! | Kind     | Wait expression                              |
//! |----------|----------------------------------------------|
//! | `always` | ignored; settings `state` is `true`/`false`  |
//! | `wait`   | milliseconds to wait after the check is built |
//! | `port`   | `[host]:port[/TCP\|/UDP]`                     |
//! | `http`   | a URL, or a JSON request/expectation object  |

pub mod always;
pub mod http;
pub mod port;
pub mod wait;

use super::registry::ProviderRegistry;

/// Register every built-in provider under its kind name.
pub fn register_builtin(registry: &mut ProviderRegistry) {
    registry.register(always::KIND, always::create);
    registry.register(wait::KIND, wait::create);
    registry.register(port::KIND, port::create);
    registry.register(http::KIND, http::create);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let registry = ProviderRegistry::with_builtin();
        assert_eq!(registry.kinds(), vec!["always", "http", "port", "wait"]);
    }
}
