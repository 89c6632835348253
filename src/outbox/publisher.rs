use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

#[cfg(feature = "emitter")]
use base64::{engine::general_purpose::STANDARD, Engine};
#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;

/// Delivers outbox entries to whatever sits downstream (broker, log, local
/// subscribers).
///
/// `payload` is the bitcode-encoded [`EventPayload`](super::EventPayload);
/// `metadata` carries the envelope fields (`event_id`, `aggregate_id`,
/// `aggregate_version`, `tenant_id`, `schema_version`). Returning `Ok` means
/// the downstream accepted the event.
pub trait OutboxPublisher {
    type Error: fmt::Display;

    fn publish(
        &mut self,
        event_type: &str,
        payload: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), Self::Error>;
}

impl<P: OutboxPublisher + ?Sized> OutboxPublisher for Box<P> {
    type Error = P::Error;

    fn publish(
        &mut self,
        event_type: &str,
        payload: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), Self::Error> {
        (**self).publish(event_type, payload, metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogPublisherError {
    #[error("log publisher buffer poisoned")]
    BufferPoisoned,
}

/// Writes one line per event to the tracing log, or to a shared buffer.
pub struct LogPublisher {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl Default for LogPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl LogPublisher {
    /// Create a publisher that only logs.
    pub fn new() -> Self {
        LogPublisher { buffer: None }
    }

    /// Create a publisher that also appends each line to `buffer`.
    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogPublisher {
            buffer: Some(buffer),
        }
    }
}

impl OutboxPublisher for LogPublisher {
    type Error = LogPublisherError;

    fn publish(
        &mut self,
        event_type: &str,
        payload: &[u8],
        metadata: &HashMap<String, String>,
    ) -> Result<(), Self::Error> {
        let ordered: BTreeMap<_, _> = metadata.iter().collect();
        let meta_str = ordered
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        let line = format!("[OUTBOX] {} {} bytes {}", event_type, payload.len(), meta_str);

        match &self.buffer {
            Some(buffer) => {
                let mut buffer = buffer
                    .lock()
                    .map_err(|_| LogPublisherError::BufferPoisoned)?;
                buffer.push(line);
            }
            None => info!(target: "outbox", "{}", line),
        }
        Ok(())
    }
}

/// Emits events to in-process subscribers. Listeners registered for an event
/// type receive the payload as base64 text.
#[cfg(feature = "emitter")]
pub struct LocalEmitterPublisher {
    emitter: EventEmitter,
}

#[cfg(feature = "emitter")]
impl LocalEmitterPublisher {
    /// Create a publisher that emits on `emitter`.
    pub fn new(emitter: EventEmitter) -> Self {
        LocalEmitterPublisher { emitter }
    }

    /// Get a mutable reference to the emitter, e.g. to add listeners.
    pub fn emitter_mut(&mut self) -> &mut EventEmitter {
        &mut self.emitter
    }
}

#[cfg(feature = "emitter")]
impl OutboxPublisher for LocalEmitterPublisher {
    type Error = std::convert::Infallible;

    fn publish(
        &mut self,
        event_type: &str,
        payload: &[u8],
        _metadata: &HashMap<String, String>,
    ) -> Result<(), Self::Error> {
        self.emitter.emit(event_type, STANDARD.encode(payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_publisher_to_buffer() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut publisher = LogPublisher::with_buffer(buffer.clone());
        let empty = HashMap::new();

        publisher.publish("CountryCreated", &[1, 2, 3], &empty).unwrap();
        publisher.publish("CountryUpdated", &[4], &empty).unwrap();

        let logs = buffer.lock().unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].starts_with("[OUTBOX] CountryCreated 3 bytes"));
        assert!(logs[1].contains("CountryUpdated"));
    }

    #[test]
    fn log_publisher_orders_metadata() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut publisher = LogPublisher::with_buffer(buffer.clone());
        let meta = HashMap::from([
            ("tenant_id".to_string(), "t-1".to_string()),
            ("aggregate_id".to_string(), "c-1".to_string()),
        ]);

        publisher.publish("RegionDeleted", &[], &meta).unwrap();

        let logs = buffer.lock().unwrap();
        assert_eq!(
            logs[0],
            "[OUTBOX] RegionDeleted 0 bytes aggregate_id=c-1 tenant_id=t-1"
        );
    }
}
