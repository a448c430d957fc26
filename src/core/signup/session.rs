//! Host-side event loop for one signup session.
//!
//! [`SignupSession::run`] owns the engine and serializes every event through a
//! single task: commands from the UI arrive on an `mpsc` channel and the
//! cooldown clock is a `tokio::time::interval`. Each event runs to completion
//! before the next is selected, and a fresh [`WizardView`] is published after
//! each one. When the loop returns the interval is dropped with it, so no
//! scheduled work survives the session.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use super::engine::{SendOutcome, WizardEngine, WizardView};
use super::types::{FieldMap, WizardError};

/// Events the host UI can send to a running session.
#[derive(Debug)]
pub enum SessionCommand {
    Update(FieldMap),
    Next,
    Back,
    Skip,
    JumpTo(usize),
    SendCode,
    ResendCode,
    Submit,
    Abandon,
}

/// Reply to a navigation or commit command.
pub type CommandReply = Result<CommandOutput, WizardError>;

/// Successful result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Updated,
    /// Active step after a navigation command (1-based)
    Step(usize),
    Send(SendOutcome),
    Committed,
    Abandoned,
}

/// A command plus an optional channel for its result.
#[derive(Debug)]
pub struct Envelope {
    pub command: SessionCommand,
    pub reply: Option<oneshot::Sender<CommandReply>>,
}

impl Envelope {
    pub fn new(command: SessionCommand) -> Self {
        Self {
            command,
            reply: None,
        }
    }

    /// Build an envelope whose result is delivered on the returned receiver.
    pub fn with_reply(command: SessionCommand) -> (Self, oneshot::Receiver<CommandReply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command,
                reply: Some(tx),
            },
            rx,
        )
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Abandoned,
}

pub struct SignupSession {
    engine: WizardEngine,
    tick_interval: Duration,
}

impl SignupSession {
    pub fn new(engine: WizardEngine, tick_interval: Duration) -> Self {
        Self {
            engine,
            tick_interval,
        }
    }

    /// Run until the wizard commits, the host abandons it, or the command
    /// channel closes (treated as abandonment).
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Envelope>,
        views: watch::Sender<WizardView>,
    ) -> SessionOutcome {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately.
        ticker.tick().await;

        views.send_replace(self.engine.view());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.engine.timer().is_active() {
                        self.engine.tick();
                        views.send_replace(self.engine.view());
                    }
                }
                envelope = commands.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        tracing::debug!(session_id = %self.engine.id(), "Command channel closed");
                        self.engine.abandon();
                        return SessionOutcome::Abandoned;
                    };

                    if matches!(command, SessionCommand::Abandon) {
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(CommandOutput::Abandoned));
                        }
                        self.engine.abandon();
                        return SessionOutcome::Abandoned;
                    }

                    let result = self.apply(command);
                    let committed = matches!(result, Ok(CommandOutput::Committed));
                    views.send_replace(self.engine.view());
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                    if committed {
                        return SessionOutcome::Completed;
                    }
                }
            }
        }
    }

    fn apply(&mut self, command: SessionCommand) -> CommandReply {
        let engine = &mut self.engine;
        match command {
            SessionCommand::Update(partial) => engine.update(partial).map(|()| CommandOutput::Updated),
            SessionCommand::Next => engine.next().map(CommandOutput::Step),
            SessionCommand::Back => engine.back().map(CommandOutput::Step),
            SessionCommand::Skip => engine.skip().map(CommandOutput::Step),
            SessionCommand::JumpTo(index) => engine.jump_to(index).map(CommandOutput::Step),
            SessionCommand::SendCode => engine.send_code().map(CommandOutput::Send),
            SessionCommand::ResendCode => engine.resend_code().map(CommandOutput::Send),
            SessionCommand::Submit => engine.commit().map(|()| CommandOutput::Committed),
            SessionCommand::Abandon => Ok(CommandOutput::Abandoned),
        }
    }
}
