//! Session data model shared by the host, guest and stats sides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PayloadError;

/// Text shown on a guest screen before the first question arrives.
pub const STAND_BY_TEXT: &str = "Please, stand by...";

/// One selectable answer of a [`Question`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub text: String,
    pub is_correct: bool,
}

/// A question with its ordered answer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub content: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// The screen a guest sees before the host has pushed anything.
    pub fn stand_by() -> Self {
        Self {
            content: STAND_BY_TEXT.to_string(),
            options: Vec::new(),
        }
    }
}

/// A quiz/poll definition as served by `/api/project-data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            project_name: "Missing".to_string(),
            project_id: None,
            questions: Vec::new(),
        }
    }
}

/// A viewer comment as received by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user_name: String,
    pub text: String,
    #[serde(default)]
    pub question_id: u64,
}

/// A line in the guest's local chat feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub author: String,
    pub content: String,
}

impl ChatEntry {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }
}

/// Emoji reaction tokens accepted on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emoji {
    Heart,
    Like,
    Dislike,
}

impl Emoji {
    pub const ALL: [Emoji; 3] = [Emoji::Heart, Emoji::Like, Emoji::Dislike];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emoji::Heart => "heart",
            Emoji::Like => "like",
            Emoji::Dislike => "dislike",
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Emoji {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart" => Ok(Emoji::Heart),
            "like" => Ok(Emoji::Like),
            "dislike" => Ok(Emoji::Dislike),
            other => Err(PayloadError::UnknownEmoji(other.to_string())),
        }
    }
}
