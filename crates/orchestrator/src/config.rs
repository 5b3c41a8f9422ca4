use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use hirebatch_runner::PollConfig;

/// Orchestrator configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Base URL of the batch processor API.
    pub processor_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Poll loop tuning shared by every runner.
    pub poll: PollConfig,
    /// Directory holding the session documents of the job store.
    pub store_dir: PathBuf,
    /// Scopes persisted records to one foreground session.
    pub session_id: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            processor_url: "http://localhost:8080/api".into(),
            request_timeout: Duration::from_secs(30),
            poll: PollConfig::default(),
            store_dir: std::env::temp_dir().join("hirebatch"),
            session_id: "default".into(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default                      |
    /// |-----------------------------------|------------------------------|
    /// | `HIREBATCH_PROCESSOR_URL`         | `http://localhost:8080/api`  |
    /// | `HIREBATCH_REQUEST_TIMEOUT_SECS`  | `30`                         |
    /// | `HIREBATCH_POLL_INTERVAL_MS`      | `3000`                       |
    /// | `HIREBATCH_POLL_MAX_ATTEMPTS`     | `30`                         |
    /// | `HIREBATCH_POLL_STABLE_THRESHOLD` | `3`                          |
    /// | `HIREBATCH_STORE_DIR`             | `<temp dir>/hirebatch`       |
    /// | `HIREBATCH_SESSION_ID`            | `default`                    |
    ///
    /// Values that fail to parse fall back to the default with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let processor_url = lookup("HIREBATCH_PROCESSOR_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.processor_url);

        let request_timeout_secs = parsed(
            &lookup,
            "HIREBATCH_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        );

        let interval_ms = parsed(
            &lookup,
            "HIREBATCH_POLL_INTERVAL_MS",
            defaults.poll.interval.as_millis() as u64,
        );
        let max_attempts = parsed(
            &lookup,
            "HIREBATCH_POLL_MAX_ATTEMPTS",
            defaults.poll.max_attempts,
        );
        let stable_threshold = parsed(
            &lookup,
            "HIREBATCH_POLL_STABLE_THRESHOLD",
            defaults.poll.stable_threshold,
        );

        let store_dir = lookup("HIREBATCH_STORE_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.store_dir);

        let session_id = lookup("HIREBATCH_SESSION_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.session_id);

        Self {
            processor_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
            poll: PollConfig {
                interval: Duration::from_millis(interval_ms),
                max_attempts,
                stable_threshold,
            }
            .normalized(),
            store_dir,
            session_id,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    var = name,
                    value = %raw,
                    default = %default,
                    "Invalid configuration value, using default",
                );
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = OrchestratorConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, OrchestratorConfig::default());
        assert_eq!(cfg.poll.max_attempts, 30);
        assert_eq!(cfg.poll.interval, Duration::from_secs(3));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = OrchestratorConfig::from_lookup(lookup(&[
            ("HIREBATCH_PROCESSOR_URL", "https://proc.example/api/"),
            ("HIREBATCH_REQUEST_TIMEOUT_SECS", "5"),
            ("HIREBATCH_POLL_INTERVAL_MS", "250"),
            ("HIREBATCH_POLL_MAX_ATTEMPTS", "12"),
            ("HIREBATCH_POLL_STABLE_THRESHOLD", "4"),
            ("HIREBATCH_STORE_DIR", "/var/lib/hirebatch"),
            ("HIREBATCH_SESSION_ID", "tab-9"),
        ]));

        assert_eq!(cfg.processor_url, "https://proc.example/api/");
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.poll.interval, Duration::from_millis(250));
        assert_eq!(cfg.poll.max_attempts, 12);
        assert_eq!(cfg.poll.stable_threshold, 4);
        assert_eq!(cfg.store_dir, PathBuf::from("/var/lib/hirebatch"));
        assert_eq!(cfg.session_id, "tab-9");
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let cfg = OrchestratorConfig::from_lookup(lookup(&[
            ("HIREBATCH_POLL_MAX_ATTEMPTS", "lots"),
            ("HIREBATCH_REQUEST_TIMEOUT_SECS", "-1"),
            ("HIREBATCH_SESSION_ID", "   "),
        ]));

        assert_eq!(cfg.poll.max_attempts, 30);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.session_id, "default");
    }

    #[test]
    fn zero_poll_settings_are_clamped() {
        let cfg = OrchestratorConfig::from_lookup(lookup(&[
            ("HIREBATCH_POLL_MAX_ATTEMPTS", "0"),
            ("HIREBATCH_POLL_STABLE_THRESHOLD", "0"),
        ]));
        assert_eq!(cfg.poll.max_attempts, 1);
        assert_eq!(cfg.poll.stable_threshold, 1);
    }
}
