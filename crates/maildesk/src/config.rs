//! Environment-driven daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Everything the daemon reads from its environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Domain minted Message-IDs and forwarding addresses live under.
    pub mail_domain: String,
    /// Shared secret presented by the provider's webhooks.
    pub webhook_secret: Option<String>,
    /// Whether the secret is enforced. Disabling is an accepted
    /// operational risk, never a default.
    pub webhook_enforce: bool,
    /// Mail provider send API base URL.
    pub provider_url: String,
    /// Mail provider API key; sends fail without one.
    pub provider_api_key: Option<String>,
    /// Platform base URL for notifications and permission checks.
    pub platform_url: String,
    /// Bearer token for platform calls.
    pub platform_token: Option<String>,
    /// Job queue poll interval.
    pub worker_interval: Duration,
}

impl Config {
    /// Read configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let database_path = get("MAILDESK_DATABASE").map_or_else(default_database_path, PathBuf::from);

        Self {
            database_path,
            bind: get("MAILDESK_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            mail_domain: get("MAILDESK_MAIL_DOMAIN")
                .unwrap_or_else(|| "mail.localhost".to_string()),
            webhook_secret: get("MAILDESK_WEBHOOK_SECRET"),
            webhook_enforce: get("MAILDESK_WEBHOOK_ENFORCE")
                .is_none_or(|value| !matches!(value.as_str(), "false" | "0" | "no")),
            provider_url: get("MAILDESK_PROVIDER_URL")
                .unwrap_or_else(|| "http://127.0.0.1:9100".to_string()),
            provider_api_key: get("MAILDESK_PROVIDER_API_KEY"),
            platform_url: get("MAILDESK_PLATFORM_URL")
                .unwrap_or_else(|| "http://127.0.0.1:9000".to_string()),
            platform_token: get("MAILDESK_PLATFORM_TOKEN"),
            worker_interval: Duration::from_secs(
                get("MAILDESK_WORKER_INTERVAL_SECS")
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("maildesk")
        .join("maildesk.db")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_lookup(|key| map.get(key).map(ToString::to_string))
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.mail_domain, "mail.localhost");
        assert!(config.webhook_secret.is_none());
        assert!(config.webhook_enforce);
        assert_eq!(config.worker_interval, Duration::from_secs(5));
        assert!(config.database_path.ends_with("maildesk/maildesk.db"));
    }

    #[test]
    fn test_enforcement_opt_out() {
        assert!(!config_from(&[("MAILDESK_WEBHOOK_ENFORCE", "false")]).webhook_enforce);
        assert!(!config_from(&[("MAILDESK_WEBHOOK_ENFORCE", "0")]).webhook_enforce);
        assert!(config_from(&[("MAILDESK_WEBHOOK_ENFORCE", "true")]).webhook_enforce);
    }

    #[test]
    fn test_explicit_values_win() {
        let config = config_from(&[
            ("MAILDESK_DATABASE", "/tmp/desk.db"),
            ("MAILDESK_MAIL_DOMAIN", "mail.acme.com"),
            ("MAILDESK_WEBHOOK_SECRET", "s3cret"),
            ("MAILDESK_WORKER_INTERVAL_SECS", "30"),
        ]);

        assert_eq!(config.database_path, PathBuf::from("/tmp/desk.db"));
        assert_eq!(config.mail_domain, "mail.acme.com");
        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.worker_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_unparseable_interval_falls_back() {
        let config = config_from(&[("MAILDESK_WORKER_INTERVAL_SECS", "soon")]);
        assert_eq!(config.worker_interval, Duration::from_secs(5));
    }
}
