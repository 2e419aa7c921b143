use crate::error::{Error, ErrorKind};
use bytes::Bytes;
use serde::Serialize;

/// Event name carried by heartbeat frames.
pub const KEEPALIVE_EVENT: &str = "keepalive";

/// Value written in the `id:` field of every frame. Events carry no identity,
/// so `Last-Event-ID` resumption is not supported.
pub const EVENT_ID: u64 = 0;

/// Bytes written once when a push stream is opened, before any frame.
pub const STREAM_PREAMBLE: &[u8] = b"\n";

/// One wire-protocol unit: `id`, `event` and `data` lines followed by a blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    event: String,
    data: Option<String>,
}

impl Frame {
    /// Builds a data frame, serializing `payload` to JSON once up front.
    pub fn data<T: Serialize + ?Sized>(event: &str, payload: &T) -> Result<Self, Error> {
        validate_event_name(event)?;
        let data = serde_json::to_string(payload)?;
        Ok(Self {
            event: event.to_string(),
            data: Some(data),
        })
    }

    /// Builds a heartbeat frame with an empty `data:` field.
    pub fn keepalive() -> Self {
        Self {
            event: KEEPALIVE_EVENT.to_string(),
            data: None,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Renders the frame exactly as it goes on the wire.
    pub fn to_bytes(&self) -> Bytes {
        let text = match &self.data {
            Some(data) => format!("id: {EVENT_ID}\nevent: {}\ndata: {data}\n\n", self.event),
            None => format!("id: {EVENT_ID}\nevent: {}\ndata:\n\n", self.event),
        };
        Bytes::from(text)
    }
}

fn validate_event_name(event: &str) -> Result<(), Error> {
    if event.contains(['\n', '\r']) {
        return Err(Error::new(ErrorKind::InvalidEventName));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn data_line(frame: &Bytes) -> String {
        let text = std::str::from_utf8(frame).unwrap();
        text.lines()
            .find_map(|line| line.strip_prefix("data:"))
            .map(|value| value.trim_start().to_string())
            .unwrap()
    }

    #[test]
    fn data_frame_is_four_lines() {
        let frame = Frame::data("update", &json!({ "count": 1 })).unwrap();
        assert_eq!(
            frame.to_bytes(),
            Bytes::from_static(b"id: 0\nevent: update\ndata: {\"count\":1}\n\n")
        );
    }

    #[test]
    fn keepalive_frame_has_empty_data_field() {
        let frame = Frame::keepalive();
        assert_eq!(frame.event(), KEEPALIVE_EVENT);
        assert_eq!(
            frame.to_bytes(),
            Bytes::from_static(b"id: 0\nevent: keepalive\ndata:\n\n")
        );
    }

    #[test]
    fn multi_line_strings_stay_on_one_data_line() {
        let frame = Frame::data("note", &"first\nsecond").unwrap();
        let bytes = frame.to_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text.matches('\n').count(), 4);
        assert_eq!(data_line(&bytes), "\"first\\nsecond\"");
    }

    #[test]
    fn rejects_event_names_with_line_breaks() {
        let err = Frame::data("bad\nevent", &1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEventName);

        let err = Frame::data("bad\revent", &1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEventName);
    }

    #[test]
    fn non_serializable_payload_fails() {
        // JSON object keys must be strings
        let mut payload = BTreeMap::new();
        payload.insert(vec![1u8], "value");

        let err = Frame::data("update", &payload).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn data_field_parses_back_to_payload() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Reading {
            sensor: String,
            values: Vec<f64>,
            active: bool,
            note: Option<String>,
        }

        let reading = Reading {
            sensor: "höhe: \"north\"".to_string(),
            values: vec![1.5, -2.0, 0.0],
            active: true,
            note: None,
        };
        let frame = Frame::data("reading", &reading).unwrap();
        let parsed: Reading = serde_json::from_str(&data_line(&frame.to_bytes())).unwrap();
        assert_eq!(parsed, reading);

        let nested = json!({ "a": [1, { "b": null }], "c": "line\nbreak" });
        let frame = Frame::data("nested", &nested).unwrap();
        let parsed: Value = serde_json::from_str(&data_line(&frame.to_bytes())).unwrap();
        assert_eq!(parsed, nested);
    }
}
