/*
[INPUT]:  Raw WebSocket frames
[OUTPUT]: Decoded InboundMessage values keyed by optional req_id
[POS]:    WebSocket layer - frame decoding
[UPDATE]: When changing how replies are identified
*/

use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// A decoded reply frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Echoed `req_id`, absent for push data or errors the server cannot attribute
    pub request_id: Option<u64>,
    pub body: Value,
}

impl InboundMessage {
    pub fn new(body: Value) -> Self {
        let request_id = body.get("req_id").and_then(Value::as_u64);
        Self { request_id, body }
    }
}

/// Outcome of decoding one frame.
#[derive(Debug)]
pub(crate) enum Decoded {
    Message(InboundMessage),
    /// Control frames carry nothing for the correlator
    Control,
    Malformed {
        error: String,
        raw: String,
    },
}

pub(crate) fn decode_frame(message: WsMessage) -> Decoded {
    let text: String = match message {
        WsMessage::Text(text) => text.to_string(),
        WsMessage::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => text,
            Err(err) => {
                return Decoded::Malformed {
                    error: err.to_string(),
                    raw: String::new(),
                };
            }
        },
        _ => return Decoded::Control,
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(body) => Decoded::Message(InboundMessage::new(body)),
        Err(err) => Decoded::Malformed {
            error: err.to_string(),
            raw: text,
        },
    }
}
