//! JSON encoding of the four protocol message kinds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Command, EngineConfig, FrameResult};

const TYPE_FIELD: &str = "type";
const KNOWN_TYPES: [&str; 4] = ["init", "ready", "reset", "result"];

/// Every message that may cross the engine boundary.
///
/// Encoded as a JSON object whose `"type"` field names the variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Consumer to engine: establish the configuration.
    Init(EngineConfig),
    /// Consumer to engine: compute one frame.
    Ready,
    /// Consumer to engine: return particles to their initial positions.
    Reset,
    /// Engine to consumer: one computed frame.
    Result(FrameResult),
}

impl Message {
    /// Converts an inbound message into the command it requests.
    ///
    /// Returns `None` for [`Message::Result`], which only flows outward.
    #[must_use]
    pub fn into_command(self) -> Option<Command> {
        match self {
            Self::Init(config) => Some(Command::Init {
                config: Box::new(config),
            }),
            Self::Ready => Some(Command::Ready),
            Self::Reset => Some(Command::Reset),
            Self::Result(_) => None,
        }
    }
}

impl From<FrameResult> for Message {
    fn from(frame: FrameResult) -> Self {
        Self::Result(frame)
    }
}

/// Failures raised while decoding or encoding wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload was not a JSON object carrying a string `"type"` field.
    #[error("message has no string `type` field")]
    MissingType,
    /// The payload named a message kind this protocol does not define.
    #[error("unrecognized message type `{0}`")]
    UnrecognizedType(String),
    /// The payload could not be parsed or its fields did not match the kind.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decodes a single JSON message.
pub fn decode_message(text: &str) -> Result<Message, WireError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get(TYPE_FIELD)
        .and_then(serde_json::Value::as_str)
        .ok_or(WireError::MissingType)?;

    if !KNOWN_TYPES.contains(&kind) {
        return Err(WireError::UnrecognizedType(kind.to_owned()));
    }

    Ok(serde_json::from_value(value)?)
}

/// Encodes a single message as one line of JSON.
pub fn encode_message(message: &Message) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::{decode_message, encode_message, Message, WireError};
    use crate::{Command, FrameResult, Vec3};

    #[test]
    fn decodes_init_with_camel_case_fields() {
        let text = r#"{
            "type": "init",
            "periodSeconds": 8,
            "bounds": [25, 6.25, 25],
            "innerBounds": [1, 1, 1],
            "initialPositions": [[-10, 0, 0], [10, 0, 0]],
            "maximumVelocity": 0.02,
            "attractionRepulsionBias": 0,
            "attractionRepulsionIntensity": 0.005,
            "revertIntensity": 0,
            "distancingThreshold": 0.005,
            "matchingVelocityIntensity": 0.03,
            "boundingReturnIntensity": 0.1
        }"#;

        let Message::Init(config) = decode_message(text).expect("decode") else {
            panic!("expected init message");
        };

        assert_eq!(config.period_seconds, 8.0);
        assert_eq!(config.bounds, Vec3::new(25.0, 6.25, 25.0));
        assert_eq!(config.inner_bounds, Some(Vec3::ONE));
        assert_eq!(config.initial_positions.len(), 2);
        assert_eq!(config.weights.matching_velocity_intensity, 0.03);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn decodes_payload_free_kinds() {
        assert_eq!(
            decode_message(r#"{"type":"ready"}"#).expect("ready"),
            Message::Ready
        );
        assert_eq!(
            decode_message(r#"{"type":"reset"}"#).expect("reset"),
            Message::Reset
        );
    }

    #[test]
    fn unknown_type_is_reported_by_name() {
        let error = decode_message(r#"{"type":"pause"}"#).expect_err("unknown type");
        assert!(matches!(error, WireError::UnrecognizedType(name) if name == "pause"));
    }

    #[test]
    fn missing_type_is_reported() {
        let error = decode_message(r#"{"bounds":[1,1,1]}"#).expect_err("missing type");
        assert!(matches!(error, WireError::MissingType));
    }

    #[test]
    fn result_encodes_with_wire_field_names() {
        let frame = FrameResult {
            sequence: 1,
            means: Vec3::ZERO,
            stdevs: Vec3::splat(0.01),
            positions: vec![Vec3::X, Vec3::NEG_X],
            clock_percentage: 0.5,
            attraction_repulsion_factor: 1.0,
        };

        let text = encode_message(&Message::from(frame.clone())).expect("encode");
        assert!(text.contains(r#""type":"result""#));
        assert!(text.contains(r#""clockPercentage":0.5"#));
        assert!(text.contains(r#""attractionRepulsionFactor":1.0"#));

        let decoded = decode_message(&text).expect("decode");
        assert_eq!(decoded, Message::Result(frame));
    }

    #[test]
    fn result_message_is_not_a_command() {
        assert_eq!(Message::Ready.into_command(), Some(Command::Ready));
        let frame = FrameResult {
            sequence: 1,
            means: Vec3::ZERO,
            stdevs: Vec3::ONE,
            positions: Vec::new(),
            clock_percentage: 0.0,
            attraction_repulsion_factor: 0.0,
        };
        assert_eq!(Message::Result(frame).into_command(), None);
    }
}
