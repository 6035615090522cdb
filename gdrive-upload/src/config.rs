use std::env;
use std::time::Duration;

use crate::upload::backoff::Backoff;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;
const DEFAULT_RETRY_BUDGET: i64 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 500;
const DEFAULT_RETRY_MAX_MS: u64 = 8_000;

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub api_base: String,
    pub probe_interval: Duration,
    /// Negative means retry forever.
    pub retry_budget: i64,
    pub retry_backoff: Backoff,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            retry_budget: DEFAULT_RETRY_BUDGET,
            retry_backoff: Backoff::new(
                Duration::from_millis(DEFAULT_RETRY_BASE_MS),
                Duration::from_millis(DEFAULT_RETRY_MAX_MS),
                true,
            ),
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from `lookup`; unset or malformed values keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_base = lookup("GDRIVE_API_BASE")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let probe_interval = Duration::from_secs(
            parse_u64(lookup("GDRIVE_PROBE_INTERVAL_SECS"))
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS),
        );
        let retry_budget = lookup("GDRIVE_RETRY_BUDGET")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_RETRY_BUDGET);
        // Zero for either bound turns backoff off.
        let retry_backoff = Backoff::new(
            Duration::from_millis(
                parse_u64(lookup("GDRIVE_RETRY_BASE_MS")).unwrap_or(DEFAULT_RETRY_BASE_MS),
            ),
            Duration::from_millis(
                parse_u64(lookup("GDRIVE_RETRY_MAX_MS")).unwrap_or(DEFAULT_RETRY_MAX_MS),
            ),
            true,
        );

        Self {
            api_base,
            probe_interval,
            retry_budget,
            retry_backoff,
        }
    }
}

fn parse_u64(value: Option<String>) -> Option<u64> {
    value.and_then(|value| value.trim().parse::<u64>().ok())
}
