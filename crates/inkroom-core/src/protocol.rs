//! JSON wire protocol shared by clients and the room server.
//!
//! Every frame is a JSON object with a `type` field:
//! ```json
//! { "type": "joinRoom", "roomId": "abc" }
//! { "type": "msg", "roomID": "abc", "shape": { "name": "rect", ... } }
//! { "type": "cursorMove", "roomId": "abc", "x": 10.5, "y": -3 }
//! ```
//! Server frames carrying a shape (`msg`, `move`) embed it as a JSON string
//! in `message`.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::shapes::{Shape, ShapeId};

/// Room identifier. Rooms are addressed by their durable id.
pub type RoomId = String;

/// Authenticated user identity.
pub type UserId = String;

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Shape has no id")]
    MissingShapeId,
}

/// Frames sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "joinRoom")]
    JoinRoom {
        #[serde(rename = "roomId", deserialize_with = "room_id")]
        room_id: RoomId,
    },
    #[serde(rename = "leaveRoom")]
    LeaveRoom {
        #[serde(rename = "roomId", deserialize_with = "room_id")]
        room_id: RoomId,
    },
    /// Create a shape.
    #[serde(rename = "msg")]
    Create {
        #[serde(rename = "roomID", alias = "roomId", deserialize_with = "room_id")]
        room_id: RoomId,
        shape: Shape,
    },
    /// Replace the geometry of an existing shape.
    #[serde(rename = "move")]
    Update {
        #[serde(rename = "roomID", alias = "roomId", deserialize_with = "room_id")]
        room_id: RoomId,
        shape: Shape,
    },
    #[serde(rename = "cursorMove")]
    CursorMove {
        #[serde(rename = "roomId", deserialize_with = "room_id")]
        room_id: RoomId,
        x: f64,
        y: f64,
    },
}

impl ClientMessage {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The room this frame addresses.
    pub fn room_id(&self) -> &str {
        match self {
            ClientMessage::JoinRoom { room_id }
            | ClientMessage::LeaveRoom { room_id }
            | ClientMessage::Create { room_id, .. }
            | ClientMessage::Update { room_id, .. }
            | ClientMessage::CursorMove { room_id, .. } => room_id,
        }
    }
}

/// One entry of a roster broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "userId")]
    pub user_id: UserId,
}

/// Why the server dropped a create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    RoomNotFound,
    PersistenceFailure,
}

/// A persisted shape row: the latest state of one shape id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub id: ShapeId,
    #[serde(rename = "roomId")]
    pub room_id: RoomId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// The shape serialized as JSON.
    pub message: String,
}

impl ShapeRecord {
    /// Build a row from a shape. Shapes without an id cannot be stored.
    pub fn from_shape(room_id: &str, user_id: &str, shape: &Shape) -> Result<Self, ProtocolError> {
        let id = shape.id().ok_or(ProtocolError::MissingShapeId)?;
        Ok(Self {
            id: id.to_string(),
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            message: serde_json::to_string(shape)?,
        })
    }

    /// Decode the stored payload.
    pub fn shape(&self) -> Result<Shape, ProtocolError> {
        Ok(serde_json::from_str(&self.message)?)
    }
}

/// Frames sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A shape was created.
    #[serde(rename = "msg")]
    Created {
        message: String,
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    /// A shape was updated.
    #[serde(rename = "move")]
    Updated {
        message: String,
        #[serde(rename = "userId")]
        user_id: UserId,
        #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    #[serde(rename = "participantsUpdate")]
    ParticipantsUpdate {
        participants: Vec<Participant>,
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    #[serde(rename = "cursorMove")]
    CursorMove {
        #[serde(rename = "userId")]
        user_id: UserId,
        x: f64,
        y: f64,
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    /// Latest shapes of a room, newest first. Sent only to the joiner.
    #[serde(rename = "replay")]
    Replay {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        shapes: Vec<ShapeRecord>,
    },
    /// A create from this session was dropped.
    #[serde(rename = "nack")]
    Nack {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "shapeId")]
        shape_id: ShapeId,
        reason: DropReason,
    },
}

impl ServerMessage {
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Accept room ids sent either as strings or as bare numbers.
fn room_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RoomId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Rect;
    use kurbo::Point;

    #[test]
    fn test_join_room_parse() {
        let msg = ClientMessage::from_json(r#"{"type":"joinRoom","roomId":"abc"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRoom { room_id: "abc".into() });
    }

    #[test]
    fn test_numeric_room_id() {
        let msg = ClientMessage::from_json(r#"{"type":"leaveRoom","roomId":42}"#).unwrap();
        assert_eq!(msg.room_id(), "42");
    }

    #[test]
    fn test_create_accepts_both_room_spellings() {
        let shape = r#"{"name":"circle","id":"c1","x":1,"y":2,"radius":3,"color":"red"}"#;
        let upper = format!(r#"{{"type":"msg","roomID":"abc","shape":{shape}}}"#);
        let lower = format!(r#"{{"type":"msg","roomId":"abc","shape":{shape}}}"#);
        let a = ClientMessage::from_json(&upper).unwrap();
        let b = ClientMessage::from_json(&lower).unwrap();
        assert_eq!(a, b);
        assert!(matches!(a, ClientMessage::Create { .. }));
    }

    #[test]
    fn test_create_serializes_room_id_upper() {
        let msg = ClientMessage::Create {
            room_id: "abc".into(),
            shape: Shape::Rect(Rect::new(Point::new(0.0, 0.0), 1.0, 1.0, "black")),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"msg""#));
        assert!(json.contains(r#""roomID":"abc""#));
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        assert!(ClientMessage::from_json(r#"{"type":"shout","roomId":"abc"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_participants_update_shape() {
        let msg = ServerMessage::ParticipantsUpdate {
            participants: vec![Participant { user_id: "u1".into() }],
            room_id: "abc".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "participantsUpdate");
        assert_eq!(value["participants"][0]["userId"], "u1");
        assert_eq!(value["roomId"], "abc");
    }

    #[test]
    fn test_plain_msg_without_room() {
        let json = r#"{"type":"msg","message":"{}","userId":"u1"}"#;
        match ServerMessage::from_json(json).unwrap() {
            ServerMessage::Created { room_id, user_id, .. } => {
                assert_eq!(room_id, None);
                assert_eq!(user_id, "u1");
            }
            other => panic!("Wrong message: {:?}", other),
        }
    }

    #[test]
    fn test_record_roundtrips_shape() {
        let shape = Shape::Rect(Rect::new(Point::new(10.0, 10.0), 50.0, 30.0, "black"));
        let record = ShapeRecord::from_shape("abc", "u1", &shape).unwrap();
        assert_eq!(Some(record.id.as_str()), shape.id());
        assert_eq!(record.shape().unwrap(), shape);
    }

    #[test]
    fn test_record_requires_id() {
        let shape = Shape::Eraser(crate::shapes::Eraser::at(Point::new(0.0, 0.0)));
        assert!(matches!(
            ShapeRecord::from_shape("abc", "u1", &shape),
            Err(ProtocolError::MissingShapeId)
        ));
    }
}
