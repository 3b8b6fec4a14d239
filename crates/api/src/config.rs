//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — Postgres connection string (absent: in-memory store)
/// - `SHIPPING_FEE_CENTS` — flat shipping fee added to every order (default: `0`)
/// - `CART_TTL_DAYS` — abandoned-cart deadline (default: `15`)
/// - `PAYMOB_HMAC_SECRET` — shared secret for webhook signatures
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub shipping_fee_cents: i64,
    pub cart_ttl_days: i64,
    pub paymob_hmac_secret: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            shipping_fee_cents: std::env::var("SHIPPING_FEE_CENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            cart_ttl_days: std::env::var("CART_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            paymob_hmac_secret: std::env::var("PAYMOB_HMAC_SECRET").unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            shipping_fee_cents: 0,
            cart_ttl_days: 15,
            paymob_hmac_secret: String::new(),
        }
    }
}
