use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClassifiedError, ErrorCode};

/// A caller's request to change state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Doubles as the idempotency key in
    /// [`execute_command`](super::IdempotencyCoordinator::execute_command).
    pub id: String,
    pub correlation_id: String,
    pub requested_by: String,
    pub requested_at: SystemTime,
}

impl Command {
    /// Create a command with fresh id and correlation id.
    pub fn new(requested_by: impl Into<String>) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            correlation_id: id.clone(),
            id,
            requested_by: requested_by.into(),
            requested_at: SystemTime::now(),
        }
    }

    /// Set the command id, which is also its idempotency key.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

/// Outcome of one command execution, stored verbatim and replayed on
/// duplicate requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command_id: String,
    pub success: bool,
    #[serde(with = "payload_serde")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub error: Option<ClassifiedError>,
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl CommandResult {
    /// A successful result carrying `payload`.
    pub fn success(command_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            command_id: command_id.into(),
            success: true,
            payload,
            error: None,
        }
    }

    /// Successful result whose payload is `value` as JSON.
    pub fn encode<T: Serialize>(
        command_id: impl Into<String>,
        value: &T,
    ) -> Result<Self, ClassifiedError> {
        let payload = serde_json::to_vec(value).map_err(|err| {
            ClassifiedError::new(
                ErrorCode::Unknown,
                format!("result encoding failed: {}", err),
            )
        })?;
        Ok(Self::success(command_id, payload))
    }

    /// A failed result carrying `error`.
    pub fn failure(command_id: impl Into<String>, error: ClassifiedError) -> Self {
        Self {
            command_id: command_id.into(),
            success: false,
            payload: Vec::new(),
            error: Some(error),
        }
    }

    /// Decode a JSON payload written by [`encode`](Self::encode).
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// Convert into a `Result` over the payload.
    pub fn into_result(self) -> Result<Vec<u8>, ClassifiedError> {
        match self.error {
            Some(err) if !self.success => Err(err),
            _ => Ok(self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_defaults_correlation_to_id() {
        let cmd = Command::new("user-1");
        assert_eq!(cmd.id, cmd.correlation_id);
        let cmd = cmd.with_id("req-1").with_correlation_id("trace-9");
        assert_eq!(cmd.id, "req-1");
        assert_eq!(cmd.correlation_id, "trace-9");
    }

    #[test]
    fn payload_is_base64_in_json() {
        let result = CommandResult::success("cmd-1", vec![0, 159, 146, 150]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["payload"], "AJ+Slg==");
        assert_eq!(json["commandId"], "cmd-1");

        let back: CommandResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn encode_and_decode_json_payload() {
        let result = CommandResult::encode("cmd-1", &vec!["a", "b"]).unwrap();
        let decoded: Vec<String> = result.decode().unwrap();
        assert_eq!(decoded, vec!["a", "b"]);
    }

    #[test]
    fn failure_into_result() {
        let result = CommandResult::failure("cmd-2", ClassifiedError::not_found("Country"));
        assert!(!result.success);
        let err = result.into_result().unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
