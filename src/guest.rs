//! Guest session controller.
//!
//! A guest sees exactly the last question the host pushed (or the stand-by
//! screen), keeps its own append-only chat feed, and sends chat, answers and
//! reactions upward. Nothing a guest sends is acknowledged; local state never
//! waits on or rolls back for the channel.

use tracing::{debug, warn};

use crate::channel::{Channel, Subscription};
use crate::events::{EventKind, GuestMessage, InboundEvent};
use crate::model::{AnswerOption, ChatEntry, Emoji, Question};

/// Author recorded for the guest's own chat entries.
pub const SELF_AUTHOR: &str = "user";

fn seed_chat() -> Vec<ChatEntry> {
    vec![
        ChatEntry::new("John", "Hi"),
        ChatEntry::new("Amy", "Wow"),
        ChatEntry::new("Bot", "Greeting"),
    ]
}

/// Keys the input box reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKey {
    Char(char),
    Backspace,
    Enter,
}

pub struct GuestController<C: Channel> {
    channel: C,
    screens: Subscription,
    screen: Question,
    screen_index: Option<usize>,
    chat: Vec<ChatEntry>,
    input: String,
    revision: u64,
}

impl<C: Channel> GuestController<C> {
    /// Bind a guest to `channel` and subscribe to screen pushes.
    pub fn new(channel: C) -> Self {
        let screens = channel.subscribe(EventKind::ChangeScreen);
        Self {
            channel,
            screens,
            screen: Question::stand_by(),
            screen_index: None,
            chat: seed_chat(),
            input: String::new(),
            revision: 0,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The question currently displayed.
    pub fn screen(&self) -> &Question {
        &self.screen
    }

    /// Host-side index of the displayed question, if the push carried one.
    pub fn screen_index(&self) -> Option<usize> {
        self.screen_index
    }

    pub fn chat(&self) -> &[ChatEntry] {
        &self.chat
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Bumped on every chat mutation; a renderer redraws when it changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Entry that must be scrolled into view: always the newest.
    pub fn scroll_anchor(&self) -> Option<usize> {
        self.chat.len().checked_sub(1)
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Edit the input box; Enter submits. Returns the entry appended on submit.
    pub fn handle_key(&mut self, key: InputKey) -> Option<ChatEntry> {
        match key {
            InputKey::Char(c) => {
                self.input.push(c);
                None
            }
            InputKey::Backspace => {
                self.input.pop();
                None
            }
            InputKey::Enter => Some(self.submit()),
        }
    }

    /// Append the input to the local feed, transmit it, and clear the input.
    ///
    /// Empty input is submitted as-is. A failed send is logged; the local
    /// entry stays.
    pub fn submit(&mut self) -> ChatEntry {
        let text = std::mem::take(&mut self.input);
        let entry = ChatEntry::new(SELF_AUTHOR, text.clone());
        self.chat.push(entry.clone());
        self.revision += 1;

        if let Err(e) = self.channel.send_message(&GuestMessage::Chat(text)) {
            warn!(error = %e, "chat message not sent");
        }
        entry
    }

    /// Send an answer for the displayed question.
    pub fn submit_answer(&self, option: AnswerOption) {
        let message = GuestMessage::Answer {
            option,
            question_index: self.screen_index,
        };
        if let Err(e) = self.channel.send_message(&message) {
            warn!(error = %e, "answer not sent");
        }
    }

    pub fn send_emoji(&self, emoji: Emoji) {
        if let Err(e) = self.channel.send_message(&GuestMessage::Emoji(emoji)) {
            warn!(error = %e, emoji = %emoji, "reaction not sent");
        }
    }

    /// Apply an inbound event. Only screen pushes change guest state.
    ///
    /// Returns whether the screen changed.
    pub fn handle_inbound(&mut self, event: InboundEvent) -> bool {
        match event {
            InboundEvent::ChangeScreen {
                question,
                question_index,
            } => {
                debug!(question_index = ?question_index, "screen changed");
                self.screen = question;
                self.screen_index = question_index;
                true
            }
            other => {
                debug!(event = %other.kind(), "guest ignores event");
                false
            }
        }
    }

    /// Apply every screen push already queued on the subscription.
    pub fn drain_inbound(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.screens.try_recv() {
            if self.handle_inbound(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next screen push and apply it. `None` once the channel is gone.
    pub async fn next_screen(&mut self) -> Option<&Question> {
        let event = self.screens.recv().await?;
        self.handle_inbound(event);
        Some(&self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::events::Frame;
    use crate::model::STAND_BY_TEXT;
    use serde_json::json;

    fn guest() -> GuestController<MemoryChannel> {
        GuestController::new(MemoryChannel::new())
    }

    #[test]
    fn starts_on_stand_by_screen_with_seed_chat() {
        let g = guest();
        assert_eq!(g.screen().content, STAND_BY_TEXT);
        assert!(g.screen_index().is_none());
        assert_eq!(g.chat().len(), 3);
        assert_eq!(g.chat()[0], ChatEntry::new("John", "Hi"));
        assert_eq!(g.scroll_anchor(), Some(2));
    }

    #[test]
    fn submit_appends_sends_and_clears() {
        let mut g = guest();
        g.set_input("hello");
        let entry = g.submit();
        assert_eq!(entry, ChatEntry::new("user", "hello"));
        assert_eq!(g.chat().last(), Some(&entry));
        assert_eq!(g.input(), "");
        assert_eq!(g.revision(), 1);
        assert_eq!(g.scroll_anchor(), Some(3));

        let sent = g.channel().sent_frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, "message");
        assert_eq!(sent[0].passed_data, json!("hello"));
    }

    #[test]
    fn empty_submission_is_not_blocked() {
        let mut g = guest();
        let entry = g.submit();
        assert_eq!(entry, ChatEntry::new("user", ""));
        assert_eq!(g.channel().sent_frames()[0].passed_data, json!(""));
    }

    #[test]
    fn repeated_submission_duplicates() {
        let mut g = guest();
        for _ in 0..2 {
            g.set_input("again");
            g.submit();
        }
        let tail: Vec<_> = g.chat().iter().rev().take(2).collect();
        assert_eq!(tail[0], tail[1]);
        assert_eq!(g.channel().sent_frames().len(), 2);
    }

    #[test]
    fn failed_send_keeps_local_entry_and_clears_input() {
        let mut g = guest();
        g.channel().close();
        g.set_input("lost");
        g.submit();
        assert_eq!(g.chat().last().unwrap().content, "lost");
        assert_eq!(g.input(), "");
    }

    #[test]
    fn keys_edit_input_and_enter_submits() {
        let mut g = guest();
        assert!(g.handle_key(InputKey::Char('h')).is_none());
        g.handle_key(InputKey::Char('i'));
        g.handle_key(InputKey::Char('!'));
        g.handle_key(InputKey::Backspace);
        assert_eq!(g.input(), "hi");
        let entry = g.handle_key(InputKey::Enter).unwrap();
        assert_eq!(entry.content, "hi");
    }

    #[test]
    fn change_screen_replaces_wholesale() {
        let mut g = guest();
        let mut frame = Frame::new(
            "changeScreen",
            json!({"content": "Q1", "options": [{"text": "a", "isCorrect": false}]}),
        );
        frame.question_index = Some(1);
        g.channel().inject(frame).unwrap();
        assert_eq!(g.drain_inbound(), 1);
        assert_eq!(g.screen().content, "Q1");
        assert_eq!(g.screen().options.len(), 1);
        assert_eq!(g.screen_index(), Some(1));

        g.channel()
            .inject(Frame::new("changeScreen", json!({"content": "Q2", "options": []})))
            .unwrap();
        g.drain_inbound();
        assert_eq!(g.screen().content, "Q2");
        assert!(g.screen().options.is_empty());
        assert!(g.screen_index().is_none());
    }

    #[test]
    fn malformed_screen_push_leaves_screen_unchanged() {
        let mut g = guest();
        assert!(g
            .channel()
            .inject(Frame::new("changeScreen", json!("just text")))
            .is_err());
        assert_eq!(g.drain_inbound(), 0);
        assert_eq!(g.screen().content, STAND_BY_TEXT);
    }

    #[test]
    fn non_screen_events_are_ignored() {
        let mut g = guest();
        assert!(!g.handle_inbound(InboundEvent::UserEmoji(Emoji::Heart)));
        assert_eq!(g.screen().content, STAND_BY_TEXT);
    }

    #[test]
    fn answer_is_tagged_with_screen_index() {
        let mut g = guest();
        g.handle_inbound(InboundEvent::ChangeScreen {
            question: Question::stand_by(),
            question_index: Some(4),
        });
        g.submit_answer(AnswerOption { text: "a".into(), is_correct: true });
        let sent = g.channel().sent_frames();
        assert_eq!(sent[0].event, "answer");
        assert_eq!(sent[0].question_index, Some(4));
        assert_eq!(sent[0].passed_data["isCorrect"], true);
    }

    #[test]
    fn emoji_is_sent_as_token() {
        let g = guest();
        g.send_emoji(Emoji::Like);
        assert_eq!(g.channel().sent_frames()[0].passed_data, json!("like"));
    }

    #[test]
    fn dropping_guest_releases_subscription() {
        let channel = MemoryChannel::new();
        let g = GuestController::new(channel.clone());
        assert_eq!(channel.subscriber_count(), 1);
        drop(g);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn next_screen_waits_for_push() {
        let channel = MemoryChannel::new();
        let mut g = GuestController::new(channel.clone());
        channel
            .inject(Frame::new("changeScreen", json!({"content": "Live", "options": []})))
            .unwrap();
        let screen = g.next_screen().await.unwrap();
        assert_eq!(screen.content, "Live");
    }
}
