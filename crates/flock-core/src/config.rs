//! Pipeline configuration: plain values, optionally overridden from `FLOCK_*` env vars.

use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key}={value:?} is not a valid {expected}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Inputs of the estimated-total fallback used while a phase total is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateConfig {
    pub avg_posts_per_group: u64,
    pub avg_comments_per_post: u64,
    /// Floor, so early percentages are not stuck at zero.
    pub min_estimate: u64,
    /// User-provided cap on the estimate.
    pub max_total: Option<u64>,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            avg_posts_per_group: 10,
            avg_comments_per_post: 20,
            min_estimate: 100,
            max_total: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Keys per directory call; the client's own limit still applies.
    pub batch_size: usize,
    /// Pause between directory calls.
    pub inter_batch_delay: Duration,
    /// Communities drained at the same time.
    pub collection_concurrency: usize,
    pub posts_per_community: usize,
    pub comments_page_size: usize,
    /// Guard against a pagination cursor that never runs dry.
    pub max_comment_pages: usize,
    pub estimate: EstimateConfig,
    /// Terminal tasks older than this may be swept.
    pub retention: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            inter_batch_delay: Duration::from_millis(400),
            collection_concurrency: 5,
            posts_per_community: 10,
            comments_page_size: 100,
            max_comment_pages: 50,
            estimate: EstimateConfig::default(),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by any `FLOCK_*` variable that is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading from an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse::<usize>(&lookup, "FLOCK_BATCH_SIZE")? {
            config.batch_size = v.max(1);
        }
        if let Some(v) = parse::<u64>(&lookup, "FLOCK_INTER_BATCH_DELAY_MS")? {
            config.inter_batch_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse::<usize>(&lookup, "FLOCK_COLLECTION_CONCURRENCY")? {
            config.collection_concurrency = v.max(1);
        }
        if let Some(v) = parse::<usize>(&lookup, "FLOCK_POSTS_PER_COMMUNITY")? {
            config.posts_per_community = v;
        }
        if let Some(v) = parse::<usize>(&lookup, "FLOCK_COMMENTS_PAGE_SIZE")? {
            config.comments_page_size = v.max(1);
        }
        if let Some(v) = parse::<usize>(&lookup, "FLOCK_MAX_COMMENT_PAGES")? {
            config.max_comment_pages = v.max(1);
        }
        if let Some(v) = parse::<u64>(&lookup, "FLOCK_AVG_POSTS_PER_GROUP")? {
            config.estimate.avg_posts_per_group = v;
        }
        if let Some(v) = parse::<u64>(&lookup, "FLOCK_AVG_COMMENTS_PER_POST")? {
            config.estimate.avg_comments_per_post = v;
        }
        if let Some(v) = parse::<u64>(&lookup, "FLOCK_MIN_ESTIMATE")? {
            config.estimate.min_estimate = v;
        }
        if let Some(v) = parse::<u64>(&lookup, "FLOCK_MAX_TOTAL")? {
            config.estimate.max_total = Some(v);
        }
        if let Some(v) = parse::<u64>(&lookup, "FLOCK_RETENTION_HOURS")? {
            let secs = v.checked_mul(60 * 60).ok_or_else(|| ConfigError {
                key: "FLOCK_RETENTION_HOURS",
                value: v.to_string(),
                expected: "number of hours that fits in u64 seconds",
            })?;
            config.retention = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|_| ConfigError {
        key,
        value: raw,
        expected: std::any::type_name::<T>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_external_api_limits() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.inter_batch_delay, Duration::from_millis(400));
        assert_eq!(config.collection_concurrency, 5);
        assert_eq!(config.posts_per_community, 10);
    }

    #[test]
    fn overrides_from_lookup() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("FLOCK_BATCH_SIZE", "100"),
            ("FLOCK_INTER_BATCH_DELAY_MS", "0"),
            ("FLOCK_MAX_TOTAL", "5000"),
        ]))
        .unwrap();

        assert_eq!(config.batch_size, 100);
        assert_eq!(config.inter_batch_delay, Duration::ZERO);
        assert_eq!(config.estimate.max_total, Some(5000));
        assert_eq!(config.comments_page_size, 100);
    }

    #[test]
    fn retention_hours_overflow_is_an_error() {
        let huge = u64::MAX.to_string();
        let err = PipelineConfig::from_lookup(lookup(&[("FLOCK_RETENTION_HOURS", huge.as_str())])).unwrap_err();
        assert_eq!(err.key, "FLOCK_RETENTION_HOURS");
        assert_eq!(err.value, huge);

        let config = PipelineConfig::from_lookup(lookup(&[("FLOCK_RETENTION_HOURS", "48")])).unwrap();
        assert_eq!(config.retention, Duration::from_secs(48 * 60 * 60));
    }

    #[test]
    fn malformed_value_is_an_error() {
        let err = PipelineConfig::from_lookup(lookup(&[("FLOCK_BATCH_SIZE", "lots")])).unwrap_err();
        assert_eq!(err.key, "FLOCK_BATCH_SIZE");
        assert_eq!(err.value, "lots");
    }
}
