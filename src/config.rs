//! Application configuration, loaded from the environment.

use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub mail: MailConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the hosted relational backend. Empty means the local
    /// fallback store is used instead.
    pub base_url: String,
    pub api_key: String,
    /// Directory for the local fallback store.
    pub fallback_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: String,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub webdriver_url: String,
    pub chromedriver_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                base_url: String::new(),
                api_key: String::new(),
                fallback_dir: PathBuf::from(".invoice-kit"),
            },
            mail: MailConfig {
                relay_url: String::from("http://localhost:4000"),
            },
            render: RenderConfig {
                webdriver_url: String::from("http://localhost:4444"),
                chromedriver_port: 4444,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store: StoreConfig {
                base_url: std::env::var("INVOICE_STORE_URL")
                    .unwrap_or(defaults.store.base_url),
                api_key: std::env::var("INVOICE_STORE_KEY").unwrap_or(defaults.store.api_key),
                fallback_dir: std::env::var("INVOICE_FALLBACK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.store.fallback_dir),
            },
            mail: MailConfig {
                relay_url: std::env::var("INVOICE_MAIL_RELAY_URL")
                    .unwrap_or(defaults.mail.relay_url),
            },
            render: RenderConfig {
                webdriver_url: std::env::var("INVOICE_WEBDRIVER_URL")
                    .unwrap_or(defaults.render.webdriver_url),
                chromedriver_port: std::env::var("INVOICE_CHROMEDRIVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.render.chromedriver_port),
            },
        }
    }

    /// Whether a hosted store is configured; otherwise the local fallback
    /// store should be used.
    pub fn has_remote_store(&self) -> bool {
        !self.store.base_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_services() {
        let config = AppConfig::default();
        assert!(!config.has_remote_store());
        assert_eq!(config.render.chromedriver_port, 4444);
        assert_eq!(config.mail.relay_url, "http://localhost:4000");
    }
}
