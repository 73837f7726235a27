use serde_json::{Map, Value};

use crate::api::{Ephemeral, Push};
use crate::stream::client::StreamError;

/// Tickle subtype announcing a change in push history.
pub const TICKLE_PUSH: &str = "push";

/// One decoded realtime frame.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    /// Keep-alive heartbeat.
    Nop,
    /// Something changed server-side; `subtype` names the collection.
    Tickle { subtype: String },
    /// Mirrored notification carried inside a `push` frame.
    Mirror(Ephemeral),
    /// Any other payload, surfaced to the caller as a push.
    Push(Push),
}

impl StreamMessage {
    pub fn parse(text: &str) -> Result<Self, StreamError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut frame) = value else {
            return Err(StreamError::Protocol(format!(
                "expected a JSON object frame, got {}",
                json_kind(&value)
            )));
        };

        match frame.get("type").and_then(Value::as_str) {
            Some("nop") => Ok(Self::Nop),
            Some("tickle") => Ok(Self::Tickle {
                subtype: frame
                    .get("subtype")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            Some("push") => match frame.remove("push") {
                Some(Value::Object(inner)) if is_mirror(&inner) => {
                    Ok(Self::Mirror(serde_json::from_value(Value::Object(inner))?))
                }
                Some(Value::Object(inner)) => {
                    Ok(Self::Push(serde_json::from_value(Value::Object(inner))?))
                }
                Some(other) => {
                    frame.insert("push".to_string(), other);
                    Ok(Self::Push(serde_json::from_value(Value::Object(frame))?))
                }
                None => Ok(Self::Push(serde_json::from_value(Value::Object(frame))?)),
            },
            _ => Ok(Self::Push(serde_json::from_value(Value::Object(frame))?)),
        }
    }

    /// True for a tickle that should trigger a history refill.
    pub fn is_push_tickle(&self) -> bool {
        matches!(self, Self::Tickle { subtype } if subtype == TICKLE_PUSH)
    }
}

fn is_mirror(inner: &Map<String, Value>) -> bool {
    inner.get("type").and_then(Value::as_str) == Some(Ephemeral::MIRROR)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::StreamMessage;
    use crate::api::PushKind;
    use crate::stream::client::StreamError;

    #[test]
    fn parses_heartbeat_and_tickles() {
        assert_eq!(
            StreamMessage::parse(r#"{"type":"nop"}"#).expect("nop"),
            StreamMessage::Nop
        );

        let tickle = StreamMessage::parse(r#"{"type":"tickle","subtype":"push"}"#).expect("tickle");
        assert!(tickle.is_push_tickle());

        let device_tickle =
            StreamMessage::parse(r#"{"type":"tickle","subtype":"device"}"#).expect("tickle");
        assert_eq!(
            device_tickle,
            StreamMessage::Tickle {
                subtype: "device".to_string()
            }
        );
        assert!(!device_tickle.is_push_tickle());
    }

    #[test]
    fn nested_mirror_becomes_ephemeral() {
        let message = StreamMessage::parse(
            r#"{"type":"push","push":{"type":"mirror","title":"hi","package_name":"com.example","notification_id":"7"}}"#,
        )
        .expect("mirror");
        let ephemeral = match message {
            StreamMessage::Mirror(ephemeral) => ephemeral,
            other => panic!("expected mirror, got {other:?}"),
        };
        assert!(ephemeral.is_mirror());
        assert_eq!(ephemeral.title.as_deref(), Some("hi"));
        assert_eq!(ephemeral.notification_id.as_deref(), Some("7"));
    }

    #[test]
    fn other_nested_push_is_surfaced_as_push() {
        let message = StreamMessage::parse(
            r#"{"type":"push","push":{"type":"dismissal","package_name":"com.example"}}"#,
        )
        .expect("push");
        let push = match message {
            StreamMessage::Push(push) => push,
            other => panic!("expected push, got {other:?}"),
        };
        assert_eq!(push.kind, PushKind::Other("dismissal".to_string()));
        assert_eq!(push.extra["package_name"], "com.example");
    }

    #[test]
    fn unknown_frame_type_is_kept_whole() {
        let message = StreamMessage::parse(r#"{"type":"tickle_v2","x":1}"#).expect("frame");
        let push = match message {
            StreamMessage::Push(push) => push,
            other => panic!("expected push, got {other:?}"),
        };
        assert_eq!(push.kind.as_str(), "tickle_v2");
        assert_eq!(push.extra["x"], 1);
    }

    #[test]
    fn rejects_non_object_and_invalid_json() {
        assert!(matches!(
            StreamMessage::parse("[1,2]"),
            Err(StreamError::Protocol(_))
        ));
        assert!(matches!(
            StreamMessage::parse("{oops"),
            Err(StreamError::Json(_))
        ));
    }
}
