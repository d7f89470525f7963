/// Process-level configuration, read once at startup. Consolidates
/// every environment input behind one fallible constructor so the
/// rest of the crate never touches the environment directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Opaque key consumed by the persistence collaborator. The core
    /// never parses or validates it — it is threaded through untouched
    /// so operators can pass it to whichever process owns the encrypted
    /// profile store.
    pub master_key: Option<String>,

    /// Port the control protocol's WebSocket server binds to.
    pub bridge_port: u16,

    /// Enables verbose structured logs (`tracing` at `debug` instead of
    /// `info`).
    pub debug: bool,
}

const DEFAULT_BRIDGE_PORT: u16 = 8766;

impl Config {
    pub fn from_env() -> Self {
        let master_key = std::env::var("MASTER_KEY").ok();

        let bridge_port = std::env::var("BRIDGE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BRIDGE_PORT);

        let debug = std::env::var("DEBUG")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        Self {
            master_key,
            bridge_port,
            debug,
        }
    }

    pub fn tracing_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        std::env::remove_var("BRIDGE_PORT");
        std::env::remove_var("DEBUG");
        std::env::remove_var("MASTER_KEY");
        let cfg = Config::from_env();
        assert_eq!(cfg.bridge_port, DEFAULT_BRIDGE_PORT);
        assert!(!cfg.debug);
        assert!(cfg.master_key.is_none());
    }
}
