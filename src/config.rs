use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which backend a generation call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Straight to the Gemini REST API with the user's own key.
    Direct,
    /// Through the dashboard's application server.
    Proxied,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Direct => "direct",
            TransportKind::Proxied => "proxied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" | "gemini" | "provider" => Some(TransportKind::Direct),
            "proxied" | "proxy" | "backend" => Some(TransportKind::Proxied),
            _ => None,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            TransportKind::Direct => "https://generativelanguage.googleapis.com/v1beta/models",
            TransportKind::Proxied => "http://localhost:8000",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub transport: TransportKind,
    pub provider_base_url: String,
    pub backend_base_url: String,
    pub default_model: String,
    pub request_timeout_secs: u64,
}

impl AssistantConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn base_url(&self) -> &str {
        match self.transport {
            TransportKind::Direct => &self.provider_base_url,
            TransportKind::Proxied => &self.backend_base_url,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Direct,
            provider_base_url: TransportKind::Direct.default_base_url().to_string(),
            backend_base_url: TransportKind::Proxied.default_base_url().to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_parse_accepts_aliases() {
        assert_eq!(TransportKind::parse(" Direct "), Some(TransportKind::Direct));
        assert_eq!(TransportKind::parse("backend"), Some(TransportKind::Proxied));
        assert_eq!(TransportKind::parse("ollama"), None);
    }

    #[test]
    fn base_url_follows_selected_transport() {
        let mut config = AssistantConfig::default();
        assert!(config.base_url().starts_with("https://generativelanguage"));

        config.transport = TransportKind::Proxied;
        assert_eq!(config.base_url(), "http://localhost:8000");
    }

    #[test]
    fn zero_timeout_is_clamped_to_one_second() {
        let config = AssistantConfig {
            request_timeout_secs: 0,
            ..AssistantConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
