//! Host session controller.
//!
//! ## Responsibility
//! Own the project's question sequence, the current position in it and the
//! broadcast flag; fan the current question out to guests; aggregate the
//! comments, answers and reactions guests send back.
//!
//! ## Guarantees
//! - The index is always inside `[0, questions.len() - 1]` once a non-empty
//!   project is loaded.
//! - An index change pushes the new question and clears the answer
//!   accumulator inside the same `&mut self` call, so no inbound event handled
//!   by the owning task can observe one without the other.
//! - Comments and answers are append-only between index changes.
//!
//! ## NOT Responsible For
//! - Fetching or scheduling; see [`runtime`] for the task that drives this.

pub mod runtime;

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::{ApiError, SessionError};
use crate::events::{InboundEvent, OutboundCommand};
use crate::model::{AnswerOption, Comment, Emoji, Project, Question};

pub use runtime::{HostCommand, HostHandle, HostSession};

/// Bot greeting shown before any guest comments arrive.
pub const SEED_COMMENT_TEXT: &str = "請大家盡量留言和回答問題";

fn seed_comments() -> Vec<Comment> {
    vec![Comment {
        user_name: "Bot".to_string(),
        text: SEED_COMMENT_TEXT.to_string(),
        question_id: 11,
    }]
}

/// Wrap-around navigation over `len` questions.
///
/// Forward past the last index wraps to 0. Backward wraps to the last index
/// whenever the decremented value is `<= 0`, so stepping back from index 1
/// also lands on the last question.
pub fn step_index(index: usize, len: usize, forward: bool) -> Option<usize> {
    let last = len.checked_sub(1)?;
    Some(if forward {
        let next = index + 1;
        if next <= last {
            next
        } else {
            0
        }
    } else if index > 1 {
        index - 1
    } else {
        last
    })
}

/// An emoji shown for a fixed window; a new reaction restarts the window.
#[derive(Debug, Clone)]
pub struct TransientReaction {
    current: Option<(Emoji, Instant)>,
    window: Duration,
}

impl TransientReaction {
    pub fn new(window: Duration) -> Self {
        Self {
            current: None,
            window,
        }
    }

    /// Show `emoji` from `now`; returns the new deadline.
    pub fn set(&mut self, emoji: Emoji, now: Instant) -> Instant {
        let deadline = now + self.window;
        self.current = Some((emoji, deadline));
        deadline
    }

    pub fn current(&self) -> Option<Emoji> {
        self.current.map(|(emoji, _)| emoji)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.current.map(|(_, deadline)| deadline)
    }

    /// Clear the reaction if its window has elapsed at `now`.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.current {
            Some((_, deadline)) if now >= deadline => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}

/// Read-only view of host state, as published to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSnapshot {
    pub project_name: String,
    pub is_loading: bool,
    pub question_index: usize,
    pub question_count: usize,
    pub current_question: Option<Question>,
    pub is_broadcasting: bool,
    pub comments: Vec<Comment>,
    pub answer_count: usize,
    pub selected_emoji: Option<Emoji>,
}

pub struct HostController<C: Channel> {
    project_id: String,
    channel: C,
    project: Project,
    loading: bool,
    index: usize,
    broadcasting: bool,
    comments: Vec<Comment>,
    answers: Vec<AnswerOption>,
    stale_answers: u64,
    reaction: TransientReaction,
}

impl<C: Channel> HostController<C> {
    /// Create a controller for `project_id`.
    ///
    /// # Errors
    /// [`SessionError::MissingProjectId`] when the id is empty or blank. A
    /// host session cannot start without one.
    pub fn new(project_id: &str, channel: C, reaction_window: Duration) -> Result<Self, SessionError> {
        if project_id.trim().is_empty() {
            return Err(SessionError::MissingProjectId);
        }
        Ok(Self {
            project_id: project_id.to_string(),
            channel,
            project: Project::default(),
            loading: true,
            index: 0,
            broadcasting: false,
            comments: seed_comments(),
            answers: Vec::new(),
            stale_answers: 0,
            reaction: TransientReaction::new(reaction_window),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// True until the project fetch has completed, successfully or not.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn question_index(&self) -> usize {
        self.index
    }

    pub fn question_count(&self) -> usize {
        self.project.questions.len()
    }

    /// The current question; `None` while loading or when the project is empty.
    pub fn current_question(&self) -> Option<&Question> {
        if self.loading {
            return None;
        }
        self.project.questions.get(self.index)
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn answers(&self) -> &[AnswerOption] {
        &self.answers
    }

    /// Answers dropped because they were tagged for another question.
    pub fn stale_answer_count(&self) -> u64 {
        self.stale_answers
    }

    pub fn selected_emoji(&self) -> Option<Emoji> {
        self.reaction.current()
    }

    pub fn reaction_deadline(&self) -> Option<Instant> {
        self.reaction.deadline()
    }

    /// Apply the result of the project fetch.
    ///
    /// A failure is logged and leaves the empty placeholder project in place.
    pub fn apply_project(&mut self, result: Result<Project, ApiError>) -> bool {
        self.loading = false;
        match result {
            Ok(project) => {
                info!(
                    project_id = %self.project_id,
                    questions = project.questions.len(),
                    "project loaded"
                );
                self.project = project;
                self.index = 0;
                true
            }
            Err(e) => {
                warn!(error = %e, project_id = %self.project_id, "failed to get project data");
                false
            }
        }
    }

    /// Step to the next (`forward`) or previous question, wrapping at both ends.
    ///
    /// When the index actually changes, the new question is pushed to guests
    /// and the answer accumulator is cleared. Returns the resulting index.
    ///
    /// # Errors
    /// [`SessionError::NoQuestions`] while loading or when the project is empty.
    pub fn advance(&mut self, forward: bool) -> Result<usize, SessionError> {
        if self.loading {
            return Err(SessionError::NoQuestions);
        }
        let next = step_index(self.index, self.question_count(), forward)
            .ok_or(SessionError::NoQuestions)?;
        if next != self.index {
            self.index = next;
            self.push_current();
            self.answers.clear();
        }
        Ok(self.index)
    }

    /// Send `startBroadcasting`, then re-push the current question so guests
    /// that joined earlier see it immediately.
    pub fn start(&mut self) {
        self.send(OutboundCommand::StartBroadcasting {
            room_id: self.project_id.clone(),
        });
        self.broadcasting = true;
        self.push_current();
    }

    pub fn stop(&mut self) {
        self.send(OutboundCommand::StopBroadcasting {
            room_id: self.project_id.clone(),
        });
        self.broadcasting = false;
    }

    /// Show a reaction locally, as if a guest had sent it.
    pub fn react(&mut self, emoji: Emoji, now: Instant) -> Instant {
        self.reaction.set(emoji, now)
    }

    /// Clear the reaction once its window has elapsed.
    pub fn expire_reaction(&mut self, now: Instant) -> bool {
        self.reaction.expire(now)
    }

    /// Apply one inbound event.
    pub fn handle_inbound(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::ViewerMessage(comment) => self.comments.push(comment),
            InboundEvent::UserAnswer {
                option,
                question_index,
            } => match question_index {
                Some(i) if i != self.index => {
                    self.stale_answers += 1;
                    debug!(answered = i, current = self.index, "dropping stale answer");
                }
                _ => self.answers.push(option),
            },
            InboundEvent::UserEmoji(emoji) => {
                self.reaction.set(emoji, now);
            }
            InboundEvent::ChangeScreen { .. } => {
                debug!("host ignores changeScreen echo");
            }
        }
    }

    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            project_name: self.project.project_name.clone(),
            is_loading: self.loading,
            question_index: self.index,
            question_count: self.question_count(),
            current_question: self.current_question().cloned(),
            is_broadcasting: self.broadcasting,
            comments: self.comments.clone(),
            answer_count: self.answers.len(),
            selected_emoji: self.reaction.current(),
        }
    }

    fn push_current(&self) {
        let Some(question) = self.current_question() else {
            debug!(project_id = %self.project_id, "no current question to push");
            return;
        };
        self.send(OutboundCommand::ChangeScreen {
            room_id: self.project_id.clone(),
            question: question.clone(),
            question_index: self.index,
        });
    }

    fn send(&self, command: OutboundCommand) {
        if let Err(e) = self.channel.send_command(&command) {
            warn!(error = %e, event = command.event_name(), "host command not sent");
        }
    }
}
