//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//! Every message is a single JSON object tagged by its `type` field.

use serde::{Deserialize, Serialize};

/// One of the two match roles, assigned by arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// Discrete directional flags (switches to flag control)
    Input { up: bool, down: bool },

    /// Absolute target for the paddle center (switches to target control)
    TouchMove { desired_y: f32 },

    /// Leave target control; the paddle stops until new flags arrive
    TouchEnd,

    /// Heartbeat reply, echoes the ping timestamp
    Pong { t: u64 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    /// Sent once after admission
    Init {
        side: Side,
        width: f32,
        height: f32,
        lag_comp_ms: u64,
    },

    /// Authoritative snapshot, one per tick
    State {
        seq: u64,
        server_time: u64,
        ball: BallPos,
        left: Option<PaddleState>,
        right: Option<PaddleState>,
    },

    /// Heartbeat probe
    Ping { t: u64 },

    /// Match already has two participants; the connection is closed next
    Full,

    /// Match torn down; all connections are closed next
    End { reason: String },
}

/// Ball position on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallPos {
    pub x: f32,
    pub y: f32,
}

/// One side's paddle offset and score on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleState {
    pub y: f32,
    pub score: u32,
}

impl ServerMsg {
    pub fn paddle(&self, side: Side) -> Option<PaddleState> {
        match self {
            ServerMsg::State { left, right, .. } => match side {
                Side::Left => *left,
                Side::Right => *right,
            },
            _ => None,
        }
    }
}

/// Codec errors on the outbound path
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serialize a message once so it can be shared between recipients
pub fn encode<T: Serialize>(msg: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(msg)?)
}

/// Parse an inbound client frame.
///
/// Anything that is not one of the known shapes yields `None`; callers drop it
/// without replying.
pub fn decode_client(text: &str) -> Option<ClientMsg> {
    let msg: ClientMsg = serde_json::from_str(text).ok()?;
    match msg {
        ClientMsg::TouchMove { desired_y } if !desired_y.is_finite() => None,
        msg => Some(msg),
    }
}

/// Parse an inbound server frame on the renderer side
pub fn decode_server(text: &str) -> Option<ServerMsg> {
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_every_client_kind() {
        assert_eq!(
            decode_client(r#"{"type":"input","up":true,"down":false}"#),
            Some(ClientMsg::Input {
                up: true,
                down: false
            })
        );
        assert_eq!(
            decode_client(r#"{"type":"touchMove","desiredY":120}"#),
            Some(ClientMsg::TouchMove { desired_y: 120.0 })
        );
        assert_eq!(
            decode_client(r#"{"type":"touchEnd"}"#),
            Some(ClientMsg::TouchEnd)
        );
        assert_eq!(
            decode_client(r#"{"type":"pong","t":42}"#),
            Some(ClientMsg::Pong { t: 42 })
        );
    }

    #[test]
    fn malformed_or_unknown_frames_are_ignored() {
        assert_eq!(decode_client("not json"), None);
        assert_eq!(decode_client(r#"{"type":"teleport","y":3}"#), None);
        assert_eq!(decode_client(r#"{"type":"input","up":"yes"}"#), None);
        assert_eq!(decode_client(r#"{"up":true,"down":false}"#), None);
        assert_eq!(decode_client(r#"[1,2,3]"#), None);
    }

    #[test]
    fn extra_fields_are_tolerated() {
        assert_eq!(
            decode_client(r#"{"type":"pong","t":7,"client":"web"}"#),
            Some(ClientMsg::Pong { t: 7 })
        );
    }

    #[test]
    fn state_uses_camel_case_and_null_for_empty_sides() {
        let msg = ServerMsg::State {
            seq: 3,
            server_time: 1000,
            ball: BallPos { x: 1.0, y: 2.0 },
            left: Some(PaddleState { y: 10.0, score: 2 }),
            right: None,
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "state",
                "seq": 3,
                "serverTime": 1000,
                "ball": {"x": 1.0, "y": 2.0},
                "left": {"y": 10.0, "score": 2},
                "right": null
            })
        );
    }

    #[test]
    fn init_full_and_end_shapes() {
        let init = encode(&ServerMsg::Init {
            side: Side::Right,
            width: 800.0,
            height: 500.0,
            lag_comp_ms: 100,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&init).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["side"], "right");
        assert_eq!(value["lagCompMs"], 100);

        assert_eq!(encode(&ServerMsg::Full).unwrap(), r#"{"type":"full"}"#);
        assert_eq!(
            encode(&ServerMsg::End {
                reason: "player_left".to_string()
            })
            .unwrap(),
            r#"{"type":"end","reason":"player_left"}"#
        );
    }
}
