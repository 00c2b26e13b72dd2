use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://metaso.cn";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("METASO_API_KEY is required")]
    MissingApiKey,
    #[error("Invalid API key format. Expected format: mk-[32 alphanumeric characters]")]
    InvalidApiKey,
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("timeout must be a positive number of milliseconds")]
    InvalidTimeout,
}

/// Process-wide settings, loaded once at startup and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub debug: bool,
}

impl Config {
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout_ms: Option<u64>,
        debug: bool,
    ) -> Result<Self, ConfigError> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        if !is_valid_api_key(&api_key) {
            return Err(ConfigError::InvalidApiKey);
        }

        let base_url = base_url
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        match url::Url::parse(&base_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some() => {}
            _ => return Err(ConfigError::InvalidBaseUrl(base_url)),
        }

        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(timeout_ms),
            debug,
        })
    }

    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }
}

// Never print the key itself, even in `{:?}`.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.masked_api_key())
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .finish()
    }
}

/// `mk-` followed by exactly 32 uppercase letters or digits.
pub fn is_valid_api_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("mk-") else {
        return false;
    };
    rest.len() == 32
        && rest
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Keep the first and last three characters; short secrets are masked entirely.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 6))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "mk-0123456789ABCDEFGHIJKLMNOPQRSTUV";

    #[test]
    fn defaults_are_filled() {
        let c = Config::new(Some(KEY.to_string()), None, None, false).unwrap();
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.timeout, Duration::from_millis(30_000));
        assert!(!c.debug);
    }

    #[test]
    fn api_key_shape_is_enforced() {
        assert_eq!(
            Config::new(None, None, None, false).unwrap_err(),
            ConfigError::MissingApiKey
        );
        assert_eq!(
            Config::new(Some("  ".into()), None, None, false).unwrap_err(),
            ConfigError::MissingApiKey
        );
        for bad in [
            "mk-short",
            "sk-0123456789ABCDEFGHIJKLMNOPQRSTUV",
            "mk-0123456789abcdefghijklmnopqrstuv",
            "mk-0123456789ABCDEFGHIJKLMNOPQRSTUVW",
        ] {
            assert_eq!(
                Config::new(Some(bad.into()), None, None, false).unwrap_err(),
                ConfigError::InvalidApiKey,
                "{bad}"
            );
        }
    }

    #[test]
    fn base_url_must_be_http_and_loses_trailing_slash() {
        let c = Config::new(
            Some(KEY.into()),
            Some("http://127.0.0.1:8080/".into()),
            Some(5),
            true,
        )
        .unwrap();
        assert_eq!(c.base_url, "http://127.0.0.1:8080");
        assert!(matches!(
            Config::new(Some(KEY.into()), Some("ftp://x.y".into()), None, false),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
        assert_eq!(
            Config::new(Some(KEY.into()), None, Some(0), false).unwrap_err(),
            ConfigError::InvalidTimeout
        );
    }

    #[test]
    fn mask_keeps_three_chars_each_side() {
        assert_eq!(mask_secret(KEY), format!("mk-{}TUV", "*".repeat(29)));
        assert_eq!(mask_secret("abcdefgh"), "********");
        assert_eq!(mask_secret("abcdefghi"), "abc***ghi");
    }

    #[test]
    fn debug_output_does_not_leak_key() {
        let c = Config::new(Some(KEY.to_string()), None, None, false).unwrap();
        let s = format!("{c:?}");
        assert!(!s.contains(KEY), "{s}");
        assert!(s.contains("mk-"), "{s}");
    }
}
