use std::env;

use url::Url;

use crate::error::AppError;

const DEFAULT_STORAGE_BUCKET: &str = "images";

/// Connection settings for the hosted backend service.
///
/// Missing or malformed values are fatal at construction: nothing
/// data-dependent can render without them, so they surface as a single
/// `Configuration` error rather than per-request failures.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the hosted service, with a trailing slash.
    pub base_url: Url,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Storage bucket holding post media.
    pub storage_bucket: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let base_url = env::var("SUPABASE_URL").map_err(|_| missing_env())?;
        let anon_key = env::var("SUPABASE_ANON_KEY").map_err(|_| missing_env())?;
        let storage_bucket = env::var("SNAPFEED_STORAGE_BUCKET")
            .unwrap_or_else(|_| DEFAULT_STORAGE_BUCKET.to_string());

        Self::new(&base_url, &anon_key, &storage_bucket)
    }

    pub fn new(base_url: &str, anon_key: &str, storage_bucket: &str) -> Result<Self, AppError> {
        if anon_key.trim().is_empty() {
            return Err(AppError::Configuration("API key is empty".to_string()));
        }

        // Url::join treats a path without a trailing slash as a file segment
        // and would drop it on join, so normalize here.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Configuration(format!("invalid service URL: {e}")))?;

        Ok(Self {
            base_url,
            anon_key: anon_key.to_string(),
            storage_bucket: storage_bucket.to_string(),
        })
    }
}

fn missing_env() -> AppError {
    AppError::Configuration(
        "missing service environment variables; set SUPABASE_URL and SUPABASE_ANON_KEY".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let settings = Settings::new("https://example.supabase.co", "anon", "images").unwrap();
        assert_eq!(settings.base_url.as_str(), "https://example.supabase.co/");
    }

    #[test]
    fn empty_key_is_a_configuration_error() {
        let err = Settings::new("https://example.supabase.co", "", "images").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn invalid_url_is_a_configuration_error() {
        let err = Settings::new("not a url", "anon", "images").unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
