//! Task that drives a [`HostController`].
//!
//! One task owns the controller and multiplexes, with a single `select!`:
//! - the project fetch (polled once, until it resolves)
//! - UI commands from the [`HostHandle`]
//! - the three inbound subscriptions (`viewerMessage`, `userAnswer`, `userEmoji`)
//! - the emoji expiry deadline
//!
//! Handlers run one at a time to completion, so an index change and its
//! answer reset are never split by an inbound answer. After every handled
//! event the task publishes a fresh [`HostSnapshot`] on a `watch` channel.
//!
//! Dropping the [`HostHandle`] aborts the task; the fetch future and the
//! subscriptions are dropped with it.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::{HostController, HostSnapshot};
use crate::api::ApiClient;
use crate::channel::{Channel, Subscription};
use crate::error::{ApiError, SessionError};
use crate::events::EventKind;
use crate::model::{Emoji, Project};

/// UI actions a host can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Advance { forward: bool },
    StartBroadcasting,
    StopBroadcasting,
    React(Emoji),
}

pub struct HostSession<C: Channel + 'static> {
    controller: HostController<C>,
    fetch: BoxFuture<'static, Result<Project, ApiError>>,
    messages: Subscription,
    answers: Subscription,
    emojis: Subscription,
}

impl<C: Channel + 'static> HostSession<C> {
    /// Session whose project comes from `/api/project-data`.
    pub fn new(controller: HostController<C>, api: ApiClient) -> Self {
        let project_id = controller.project_id().to_string();
        let fetch = async move { api.fetch_project(&project_id).await }.boxed();
        Self::with_fetch(controller, fetch)
    }

    /// Session whose project comes from an arbitrary future.
    ///
    /// Subscriptions are registered here, before the task starts, so nothing
    /// sent after construction is missed.
    pub fn with_fetch(
        controller: HostController<C>,
        fetch: BoxFuture<'static, Result<Project, ApiError>>,
    ) -> Self {
        let channel = controller.channel();
        let messages = channel.subscribe(EventKind::ViewerMessage);
        let answers = channel.subscribe(EventKind::UserAnswer);
        let emojis = channel.subscribe(EventKind::UserEmoji);
        Self {
            controller,
            fetch,
            messages,
            answers,
            emojis,
        }
    }

    /// Start the session task.
    pub fn spawn(self) -> HostHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(self.controller.snapshot());
        let task = tokio::spawn(self.run(commands_rx, state_tx));
        HostHandle {
            commands: commands_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<HostCommand>,
        state: watch::Sender<HostSnapshot>,
    ) {
        let HostSession {
            mut controller,
            mut fetch,
            mut messages,
            mut answers,
            mut emojis,
        } = self;
        let mut fetched = false;
        info!(project_id = %controller.project_id(), "host session started");

        loop {
            let deadline = controller.reaction_deadline();
            tokio::select! {
                result = &mut fetch, if !fetched => {
                    fetched = true;
                    controller.apply_project(result);
                }
                command = commands.recv() => match command {
                    Some(command) => apply_command(&mut controller, command),
                    None => break,
                },
                Some(event) = messages.recv() => controller.handle_inbound(event, Instant::now()),
                Some(event) = answers.recv() => controller.handle_inbound(event, Instant::now()),
                Some(event) = emojis.recv() => controller.handle_inbound(event, Instant::now()),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    controller.expire_reaction(Instant::now());
                }
            }
            state.send_replace(controller.snapshot());
        }

        debug!(project_id = %controller.project_id(), "host session ended");
    }
}

fn apply_command<C: Channel>(controller: &mut HostController<C>, command: HostCommand) {
    match command {
        HostCommand::Advance { forward } => {
            if let Err(e) = controller.advance(forward) {
                warn!(error = %e, forward, "cannot change question");
            }
        }
        HostCommand::StartBroadcasting => controller.start(),
        HostCommand::StopBroadcasting => controller.stop(),
        HostCommand::React(emoji) => {
            controller.react(emoji, Instant::now());
        }
    }
}

/// Control handle for a running host session. Dropping it ends the session.
pub struct HostHandle {
    commands: mpsc::UnboundedSender<HostCommand>,
    state: watch::Receiver<HostSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl HostHandle {
    pub fn send(&self, command: HostCommand) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Ended)
    }

    pub fn advance(&self, forward: bool) -> Result<(), SessionError> {
        self.send(HostCommand::Advance { forward })
    }

    pub fn start(&self) -> Result<(), SessionError> {
        self.send(HostCommand::StartBroadcasting)
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        self.send(HostCommand::StopBroadcasting)
    }

    pub fn react(&self, emoji: Emoji) -> Result<(), SessionError> {
        self.send(HostCommand::React(emoji))
    }

    /// Latest published state.
    pub fn snapshot(&self) -> HostSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<HostSnapshot> {
        self.state.clone()
    }

    /// Stop the session and wait for its task to wind down.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
