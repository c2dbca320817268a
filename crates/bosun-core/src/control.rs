//! Client→server control protocol for PTY sessions.
//!
//! PTY sessions carry a small JSON protocol on the inbound side of the
//! connection: `input` forwards keystrokes to the process, `resize` updates
//! the terminal geometry. Everything the server pushes back is raw output
//! with no envelope, so this codec only ever decodes.

use serde::{Deserialize, Serialize};

use crate::error::{BosunError, BosunResult};

/// Terminal geometry carried by a resize message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

/// A single inbound control message on a PTY session.
///
/// Wire shape: `{"type":"input","data":"ls\n"}` or
/// `{"type":"resize","data":{"cols":120,"rows":40}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Raw text to write to the process input.
    Input(String),
    /// New terminal window size.
    Resize(WindowSize),
}

impl ControlMessage {
    /// Decode one inbound frame.
    ///
    /// Malformed JSON or any shape outside the two variants is a protocol
    /// violation; the caller logs and drops it, since a bad message from one
    /// client must never take down the dispatch loop.
    pub fn decode(raw: &str) -> BosunResult<Self> {
        serde_json::from_str(raw).map_err(|e| BosunError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_input() {
        let msg = ControlMessage::decode(r#"{"type":"input","data":"echo hi\n"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Input("echo hi\n".into()));
    }

    #[test]
    fn decodes_resize() {
        let msg = ControlMessage::decode(r#"{"type":"resize","data":{"cols":132,"rows":43}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ControlMessage::Resize(WindowSize {
                cols: 132,
                rows: 43
            })
        );
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            ControlMessage::decode("{not json"),
            Err(BosunError::Protocol(_))
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(ControlMessage::decode(r#"{"type":"detach","data":""}"#).is_err());
    }

    #[test]
    fn rejects_wrong_data_shape() {
        // resize with a string payload is a violation, not a partial parse
        assert!(ControlMessage::decode(r#"{"type":"resize","data":"80x24"}"#).is_err());
    }
}
