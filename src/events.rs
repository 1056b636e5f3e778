//! Channel event contract: wire frames and the typed events they carry.
//!
//! ## Frame shape
//! Every channel message is one JSON object:
//!
//! ```json
//! { "event": "changeScreen", "roomId": "p-1", "passedData": { ... }, "questionIndex": 2 }
//! ```
//!
//! `roomId` is only present on host commands and `questionIndex` only on
//! screen pushes and answers. Inbound frames are decoded into
//! [`InboundEvent`] and validated; anything that does not match the expected
//! payload is rejected with a [`PayloadError`] instead of being cast.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::PayloadError;
use crate::model::{AnswerOption, Comment, Emoji, Question};

pub const CHANGE_SCREEN: &str = "changeScreen";
pub const START_BROADCASTING: &str = "startBroadcasting";
pub const STOP_BROADCASTING: &str = "stopBroadcasting";
pub const VIEWER_MESSAGE: &str = "viewerMessage";
pub const USER_ANSWER: &str = "userAnswer";
pub const USER_EMOJI: &str = "userEmoji";
pub const GUEST_CHAT: &str = "message";
pub const GUEST_ANSWER: &str = "answer";
pub const GUEST_EMOJI: &str = "emoji";

/// One JSON message on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub passed_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_index: Option<usize>,
}

impl Frame {
    pub fn new(event: &str, passed_data: Value) -> Self {
        Self {
            event: event.to_string(),
            room_id: None,
            passed_data,
            question_index: None,
        }
    }

    /// Decode a frame from a websocket text message.
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(text).map_err(|e| PayloadError::Malformed {
            event: "<frame>".to_string(),
            detail: e.to_string(),
        })
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound event kinds a controller can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChangeScreen,
    ViewerMessage,
    UserAnswer,
    UserEmoji,
}

impl EventKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            EventKind::ChangeScreen => CHANGE_SCREEN,
            EventKind::ViewerMessage => VIEWER_MESSAGE,
            EventKind::UserAnswer => USER_ANSWER,
            EventKind::UserEmoji => USER_EMOJI,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

/// A validated inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Host pushed a new screen to guests.
    ChangeScreen {
        question: Question,
        question_index: Option<usize>,
    },
    ViewerMessage(Comment),
    /// A guest answered; `question_index` is the screen the guest was on, if known.
    UserAnswer {
        option: AnswerOption,
        question_index: Option<usize>,
    },
    UserEmoji(Emoji),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::ChangeScreen { .. } => EventKind::ChangeScreen,
            InboundEvent::ViewerMessage(_) => EventKind::ViewerMessage,
            InboundEvent::UserAnswer { .. } => EventKind::UserAnswer,
            InboundEvent::UserEmoji(_) => EventKind::UserEmoji,
        }
    }

    /// Validate a frame against the payload its event name promises.
    pub fn from_frame(frame: Frame) -> Result<Self, PayloadError> {
        let Frame {
            event,
            passed_data,
            question_index,
            ..
        } = frame;

        match event.as_str() {
            CHANGE_SCREEN => {
                let question = decode::<Question>(&event, passed_data)?;
                Ok(InboundEvent::ChangeScreen {
                    question,
                    question_index,
                })
            }
            VIEWER_MESSAGE => Ok(InboundEvent::ViewerMessage(decode(&event, passed_data)?)),
            USER_ANSWER => {
                let option = decode::<AnswerOption>(&event, passed_data)?;
                Ok(InboundEvent::UserAnswer {
                    option,
                    question_index,
                })
            }
            USER_EMOJI => match passed_data {
                Value::String(token) => Ok(InboundEvent::UserEmoji(token.parse()?)),
                other => Err(PayloadError::Malformed {
                    event,
                    detail: format!("expected an emoji token string, got {other}"),
                }),
            },
            _ => Err(PayloadError::UnknownEvent(event)),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &str, data: Value) -> Result<T, PayloadError> {
    serde_json::from_value(data).map_err(|e| PayloadError::Malformed {
        event: event.to_string(),
        detail: e.to_string(),
    })
}

/// Commands a host sends to its room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    ChangeScreen {
        room_id: String,
        question: Question,
        question_index: usize,
    },
    StartBroadcasting { room_id: String },
    StopBroadcasting { room_id: String },
}

impl OutboundCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundCommand::ChangeScreen { .. } => CHANGE_SCREEN,
            OutboundCommand::StartBroadcasting { .. } => START_BROADCASTING,
            OutboundCommand::StopBroadcasting { .. } => STOP_BROADCASTING,
        }
    }

    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        let mut frame = Frame::new(self.event_name(), Value::Object(Default::default()));
        match self {
            OutboundCommand::ChangeScreen {
                room_id,
                question,
                question_index,
            } => {
                frame.room_id = Some(room_id.clone());
                frame.passed_data = serde_json::to_value(question)?;
                frame.question_index = Some(*question_index);
            }
            OutboundCommand::StartBroadcasting { room_id }
            | OutboundCommand::StopBroadcasting { room_id } => {
                frame.room_id = Some(room_id.clone());
            }
        }
        Ok(frame)
    }
}

/// Messages a guest sends upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestMessage {
    /// Raw chat text, sent as typed.
    Chat(String),
    Answer {
        option: AnswerOption,
        question_index: Option<usize>,
    },
    Emoji(Emoji),
}

impl GuestMessage {
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        Ok(match self {
            GuestMessage::Chat(text) => Frame::new(GUEST_CHAT, Value::String(text.clone())),
            GuestMessage::Answer {
                option,
                question_index,
            } => {
                let mut frame = Frame::new(GUEST_ANSWER, serde_json::to_value(option)?);
                frame.question_index = *question_index;
                frame
            }
            GuestMessage::Emoji(emoji) => {
                Frame::new(GUEST_EMOJI, Value::String(emoji.as_str().to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question() -> Question {
        Question {
            content: "2 + 2?".to_string(),
            options: vec![
                AnswerOption { text: "4".to_string(), is_correct: true },
                AnswerOption { text: "5".to_string(), is_correct: false },
            ],
        }
    }

    #[test]
    fn change_screen_command_frame_shape() {
        let cmd = OutboundCommand::ChangeScreen {
            room_id: "p-1".to_string(),
            question: question(),
            question_index: 1,
        };
        let v = serde_json::to_value(cmd.to_frame().unwrap()).unwrap();
        assert_eq!(v["event"], "changeScreen");
        assert_eq!(v["roomId"], "p-1");
        assert_eq!(v["passedData"]["content"], "2 + 2?");
        assert_eq!(v["passedData"]["options"][0]["isCorrect"], true);
        assert_eq!(v["questionIndex"], 1);
    }

    #[test]
    fn broadcast_commands_carry_empty_object() {
        let start = OutboundCommand::StartBroadcasting { room_id: "r".into() }.to_frame().unwrap();
        let stop = OutboundCommand::StopBroadcasting { room_id: "r".into() }.to_frame().unwrap();
        assert_eq!(start.event, "startBroadcasting");
        assert_eq!(stop.event, "stopBroadcasting");
        assert_eq!(start.passed_data, json!({}));
        assert_eq!(stop.passed_data, json!({}));
        assert!(start.question_index.is_none());
        let text = start.to_text().unwrap();
        assert!(!text.contains("questionIndex"), "absent index must be omitted: {text}");
    }

    #[test]
    fn guest_chat_is_raw_text() {
        let frame = GuestMessage::Chat(String::new()).to_frame().unwrap();
        assert_eq!(frame.event, "message");
        assert_eq!(frame.passed_data, json!(""));
        assert!(frame.room_id.is_none());
    }

    #[test]
    fn guest_emoji_frame_is_token_string() {
        let frame = GuestMessage::Emoji(Emoji::Dislike).to_frame().unwrap();
        assert_eq!(frame.event, "emoji");
        assert_eq!(frame.passed_data, json!("dislike"));
    }

    #[test]
    fn inbound_change_screen_decodes_question() {
        let frame = Frame::parse(
            r#"{"event":"changeScreen","passedData":{"content":"2 + 2?","options":[
                {"text":"4","isCorrect":true},{"text":"5","isCorrect":false}]},"questionIndex":3}"#,
        )
        .unwrap();
        let event = InboundEvent::from_frame(frame).unwrap();
        assert_eq!(
            event,
            InboundEvent::ChangeScreen { question: question(), question_index: Some(3) }
        );
        assert_eq!(event.kind(), EventKind::ChangeScreen);
    }

    #[test]
    fn inbound_change_screen_rejects_non_question_payload() {
        let frame = Frame::new(CHANGE_SCREEN, json!({"title": "not a question"}));
        let err = InboundEvent::from_frame(frame).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed { ref event, .. } if event == "changeScreen"));
    }

    #[test]
    fn inbound_change_screen_rejects_missing_payload() {
        let frame = Frame::parse(r#"{"event":"changeScreen"}"#).unwrap();
        assert!(InboundEvent::from_frame(frame).is_err());
    }

    #[test]
    fn inbound_viewer_message_decodes_comment() {
        let frame = Frame::new(
            VIEWER_MESSAGE,
            json!({"userName": "amy", "text": "wow", "questionId": 2}),
        );
        match InboundEvent::from_frame(frame).unwrap() {
            InboundEvent::ViewerMessage(c) => {
                assert_eq!(c.user_name, "amy");
                assert_eq!(c.question_id, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn inbound_answer_keeps_question_index() {
        let mut frame = Frame::new(USER_ANSWER, json!({"text": "4", "isCorrect": true}));
        frame.question_index = Some(0);
        match InboundEvent::from_frame(frame).unwrap() {
            InboundEvent::UserAnswer { option, question_index } => {
                assert!(option.is_correct);
                assert_eq!(question_index, Some(0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn inbound_emoji_validates_token() {
        let ok = InboundEvent::from_frame(Frame::new(USER_EMOJI, json!("heart"))).unwrap();
        assert_eq!(ok, InboundEvent::UserEmoji(Emoji::Heart));

        let unknown = InboundEvent::from_frame(Frame::new(USER_EMOJI, json!("party")));
        assert_eq!(unknown, Err(PayloadError::UnknownEmoji("party".to_string())));

        let wrong_type = InboundEvent::from_frame(Frame::new(USER_EMOJI, json!(7)));
        assert!(matches!(wrong_type, Err(PayloadError::Malformed { .. })));
    }

    #[test]
    fn unknown_event_is_rejected() {
        let err = InboundEvent::from_frame(Frame::new("kick", json!({}))).unwrap_err();
        assert_eq!(err, PayloadError::UnknownEvent("kick".to_string()));
    }

    #[test]
    fn frame_parse_rejects_garbage() {
        assert!(Frame::parse("not json").is_err());
        assert!(Frame::parse(r#"{"passedData":{}}"#).is_err());
    }

    #[test]
    fn event_kind_names_match_constants() {
        assert_eq!(EventKind::ChangeScreen.to_string(), CHANGE_SCREEN);
        assert_eq!(EventKind::ViewerMessage.to_string(), VIEWER_MESSAGE);
        assert_eq!(EventKind::UserAnswer.to_string(), USER_ANSWER);
        assert_eq!(EventKind::UserEmoji.to_string(), USER_EMOJI);
    }
}
