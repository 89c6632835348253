//! Tunables for the reliability layer.
//!
//! Every value has a default; a partial JSON document only overrides what it
//! names. Durations are expressed in milliseconds.
//!
//! ```ignore
//! let config = ReliabilityConfig::from_json(r#"{ "retry": { "max_attempts": 5 } }"#)?;
//! let executor = RetryExecutor::new(config.retry.clone());
//! let worker = OutboxWorker::from_config(LogPublisher::default(), &config.outbox);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityConfig {
    pub retry: RetryPolicy,
    pub outbox: OutboxConfig,
    pub idempotency: IdempotencyConfig,
}

impl ReliabilityConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the outbox settings.
    pub fn with_outbox(mut self, outbox: OutboxConfig) -> Self {
        self.outbox = outbox;
        self
    }

    /// Set the idempotency settings.
    pub fn with_idempotency(mut self, idempotency: IdempotencyConfig) -> Self {
        self.idempotency = idempotency;
        self
    }
}

/// Outbox publisher loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Failed publish attempts after which an entry becomes `Failed`.
    pub max_retries: u32,
    /// Entries fetched per query while draining.
    pub batch_size: usize,
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl OutboxConfig {
    /// Set the maximum number of failed publishes before an entry fails.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the batch size (max entries fetched per query).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set how long the worker thread sleeps between drains.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// How long a completed result is replayed, counted from completion.
    #[serde(rename = "ttl_ms", with = "duration_ms")]
    pub ttl: Duration,
    /// How long a processing record may sit before another caller can
    /// reclaim the key. `None` never reclaims; the key stays processing
    /// until its operation completes.
    #[serde(rename = "processing_lease_ms", with = "duration_ms::option")]
    pub processing_lease: Option<Duration>,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            processing_lease: None,
        }
    }
}

impl IdempotencyConfig {
    /// Set the retention of completed results.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Let stale processing records be reclaimed after `lease`.
    pub fn with_processing_lease(mut self, lease: Duration) -> Self {
        self.processing_lease = Some(lease);
        self
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }

    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                .serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReliabilityConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.retry.max_delay, Duration::from_secs(5));
        assert_eq!(config.retry.backoff_factor, 2.0);
        assert_eq!(config.outbox.max_retries, 5);
        assert_eq!(config.idempotency.ttl, Duration::from_secs(86_400));
        assert_eq!(config.idempotency.processing_lease, None);
    }

    #[test]
    fn processing_lease_from_json() {
        let config =
            ReliabilityConfig::from_json(r#"{ "idempotency": { "processing_lease_ms": 30000 } }"#)
                .unwrap();
        assert_eq!(
            config.idempotency.processing_lease,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.idempotency.ttl, Duration::from_secs(86_400));

        let json = serde_json::to_value(IdempotencyConfig::default()).unwrap();
        assert!(json["processing_lease_ms"].is_null());
    }

    #[test]
    fn partial_json_overrides_only_named_values() {
        let config = ReliabilityConfig::from_json(
            r#"{
                "retry": { "max_attempts": 7, "max_delay_ms": 250 },
                "outbox": { "poll_interval_ms": 20 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.max_delay, Duration::from_millis(250));
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.outbox.poll_interval, Duration::from_millis(20));
        assert_eq!(config.outbox.batch_size, 100);
        assert_eq!(config.idempotency, IdempotencyConfig::default());
    }

    #[test]
    fn builders() {
        let config = ReliabilityConfig::default()
            .with_outbox(OutboxConfig::default().with_max_retries(2).with_batch_size(10))
            .with_idempotency(IdempotencyConfig::default().with_ttl(Duration::from_secs(60)));

        assert_eq!(config.outbox.max_retries, 2);
        assert_eq!(config.outbox.batch_size, 10);
        assert_eq!(config.idempotency.ttl, Duration::from_secs(60));
    }

    #[test]
    fn serializes_durations_as_millis() {
        let json = serde_json::to_value(OutboxConfig::default()).unwrap();
        assert_eq!(json["poll_interval_ms"], 500);
    }
}
