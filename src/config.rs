//! Environment configuration for the Binance USDⓈ-M futures agent tools.
//!
//! Loading `.env` files and initializing the `tracing` subscriber is the
//! embedding host's job (see `spec.md` §1, out of scope here); this module
//! only reads already-present process environment variables.

use std::env;

/// Hardcoded symbol allowlist. Every symbol argument accepted by any tool
/// in this crate is normalized (upper-cased, trimmed) then checked
/// against this list before anything else happens.
pub const ALLOWED_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT"];

pub fn is_allowed_symbol(symbol: &str) -> bool {
    ALLOWED_SYMBOLS.contains(&symbol)
}

/// Normalize a caller-supplied symbol: upper-case, trim, then allowlist-check.
pub fn normalize_symbol(symbol: &str) -> Result<String, String> {
    let normalized = symbol.trim().to_uppercase();
    if normalized.is_empty() {
        return Err("symbol must be a non-empty string".to_string());
    }
    if !is_allowed_symbol(&normalized) {
        return Err(format!(
            "symbol '{normalized}' is not in allowed list. Allowed: {}",
            ALLOWED_SYMBOLS.join(", ")
        ));
    }
    Ok(normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Production,
    Testnet,
}

impl Network {
    pub fn rest_base_url(self) -> &'static str {
        match self {
            Network::Production => "https://fapi.binance.com",
            Network::Testnet => "https://testnet.binancefuture.com",
        }
    }

    pub fn ws_base_url(self) -> &'static str {
        match self {
            Network::Production => "wss://fstream.binance.com",
            Network::Testnet => "wss://stream.binancefuture.com",
        }
    }
}

/// Process-lifetime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct FuturesConfig {
    pub api_key: String,
    pub api_secret: String,
    pub network: Network,
    pub recv_window_ms: u64,
}

impl FuturesConfig {
    /// Read configuration from the process environment.
    ///
    /// Credential *validation beyond presence* (e.g. checking the key is
    /// active against the exchange) is out of scope per `spec.md` §1; this
    /// only checks that the required variables are set and non-empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = read_required("BINANCE_API_KEY")?;
        let api_secret = read_required("BINANCE_API_SECRET")?;

        let testnet = env::var("BINANCE_TESTNET")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let network = if testnet {
            Network::Testnet
        } else {
            Network::Production
        };

        let recv_window_ms = env::var("BINANCE_RECV_WINDOW")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5000);

        Ok(Self {
            api_key,
            api_secret,
            network,
            recv_window_ms,
        })
    }

    pub fn rest_base_url(&self) -> &'static str {
        self.network.rest_base_url()
    }

    pub fn ws_base_url(&self) -> &'static str {
        self.network.ws_base_url()
    }
}

fn read_required(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_validates_symbol() {
        assert_eq!(normalize_symbol(" btcusdt ").unwrap(), "BTCUSDT");
        assert!(normalize_symbol("DOGEUSDT").is_err());
        assert!(normalize_symbol("").is_err());
    }

    #[test]
    fn network_urls_match_spec() {
        assert_eq!(Network::Production.rest_base_url(), "https://fapi.binance.com");
        assert_eq!(Network::Testnet.ws_base_url(), "wss://stream.binancefuture.com");
    }
}
