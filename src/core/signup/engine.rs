//! Wizard engine: step sequencing, validated transitions, and commit.
//!
//! The engine owns the [`FormState`] for one signup session. Forward moves
//! are gated by the current step's rule, backward moves never validate, and
//! the verification runtime (issued code + resend cooldown) is only reachable
//! while the verification step is active.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use super::steps::{signup_steps, StepDefinition, ValidationContext};
use super::types::{FieldError, FieldMap, FormState, StepId, ValidationFailure, WizardError};
use super::verification::{
    generate_code, CodeDelivery, DeliveryChannel, IssuedCode, VerificationTimer,
};
use crate::config::SignupConfig;
use crate::core::input_validator::{FieldIssue, InputValidator};

/// Receives the final record when the wizard commits.
#[cfg_attr(test, mockall::automock)]
pub trait RegistrationSink: Send {
    fn on_complete(&self, record: FormState);
}

/// Result of a send or resend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// A new code was issued and handed to delivery
    Sent,
    /// Cooldown still running; nothing happened
    CoolingDown { remaining_seconds: u32 },
}

/// Verification status exposed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub issued: bool,
    pub channel: Option<DeliveryChannel>,
    pub remaining_seconds: u32,
    pub active: bool,
    pub can_resend: bool,
}

/// Snapshot handed to the host for rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub session_id: String,
    /// 1-based index of the active step
    pub step_index: usize,
    pub step: StepId,
    pub label: &'static str,
    pub total_steps: usize,
    pub form: FormState,
    pub errors: Vec<FieldError>,
    pub verification: VerificationStatus,
    pub can_go_back: bool,
    pub can_skip: bool,
    pub progress_percent: u8,
    pub terminated: bool,
}

/// Runtime state owned by the verification step.
#[derive(Debug)]
struct VerificationRuntime {
    timer: VerificationTimer,
    issued: Option<IssuedCode>,
}

pub struct WizardEngine {
    id: String,
    steps: Vec<StepDefinition>,
    form: FormState,
    /// 0-based index of the active step
    current: usize,
    /// 0-based index of the furthest step reached through validated moves
    furthest: usize,
    last_errors: Vec<FieldError>,
    validator: InputValidator,
    verification: VerificationRuntime,
    delivery: Box<dyn CodeDelivery>,
    sink: Box<dyn RegistrationSink>,
    terminated: bool,
}

impl std::fmt::Debug for WizardEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardEngine")
            .field("id", &self.id)
            .field("current", &self.current)
            .field("furthest", &self.furthest)
            .field("form", &self.form)
            .field("verification", &self.verification)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

impl WizardEngine {
    /// Create a wizard over `steps`, starting on the first with an empty form.
    ///
    /// # Panics
    ///
    /// Panics if `steps` is empty. Hosts build engines through [`WizardEngine::signup`].
    pub(crate) fn new(
        steps: Vec<StepDefinition>,
        config: &SignupConfig,
        delivery: Box<dyn CodeDelivery>,
        sink: Box<dyn RegistrationSink>,
    ) -> Self {
        assert!(!steps.is_empty(), "a wizard needs at least one step");

        let id = Uuid::new_v4().to_string();
        tracing::info!(session_id = %id, steps = steps.len(), "Signup wizard started");

        Self {
            id,
            steps,
            form: FormState::new(),
            current: 0,
            furthest: 0,
            last_errors: Vec::new(),
            validator: InputValidator::with_limits(
                config.password_min_length,
                config.max_field_length,
            ),
            verification: VerificationRuntime {
                timer: VerificationTimer::with_cooldown(config.resend_cooldown_secs),
                issued: None,
            },
            delivery,
            sink,
            terminated: false,
        }
    }

    /// The standard five-step patient signup.
    pub fn signup(
        config: &SignupConfig,
        delivery: Box<dyn CodeDelivery>,
        sink: Box<dyn RegistrationSink>,
    ) -> Self {
        Self::new(signup_steps(), config, delivery, sink)
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 1-based index of the active step.
    pub fn current_index(&self) -> usize {
        self.current + 1
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// 1-based index of the furthest step reached through validated moves.
    pub fn furthest_index(&self) -> usize {
        self.furthest + 1
    }

    pub fn current_step(&self) -> &StepDefinition {
        &self.steps[self.current]
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn last_errors(&self) -> &[FieldError] {
        &self.last_errors
    }

    pub fn timer(&self) -> &VerificationTimer {
        &self.verification.timer
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn terminal(&self) -> usize {
        self.steps.len() - 1
    }

    fn ensure_live(&self) -> Result<(), WizardError> {
        if self.terminated {
            return Err(WizardError::Terminated);
        }
        Ok(())
    }

    fn context(&self, today: NaiveDate) -> ValidationContext<'_> {
        ValidationContext {
            validator: &self.validator,
            today,
            issued_code: self.verification.issued.as_ref(),
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Merge `partial` into the form. No validation; any key is accepted.
    pub fn update(&mut self, partial: FieldMap) -> Result<(), WizardError> {
        self.ensure_live()?;
        tracing::debug!(
            session_id = %self.id,
            step = %self.current_step().id,
            keys = ?partial.keys().collect::<Vec<_>>(),
            "Form updated"
        );
        self.form.merge(partial);
        Ok(())
    }

    /// Validate the active step against `today`.
    pub fn validate_current_at(&self, today: NaiveDate) -> Result<(), ValidationFailure> {
        self.current_step().validate(&self.form, &self.context(today))
    }

    pub fn validate_current(&self) -> Result<(), ValidationFailure> {
        self.validate_current_at(Self::today())
    }

    /// Advance one step if the active step validates. No-op on the last step.
    /// Returns the resulting 1-based index.
    pub fn next(&mut self) -> Result<usize, WizardError> {
        self.next_at(Self::today())
    }

    /// [`next`](Self::next) with an explicit reference date for date rules.
    pub fn next_at(&mut self, today: NaiveDate) -> Result<usize, WizardError> {
        self.ensure_live()?;
        if self.current == self.terminal() {
            return Ok(self.current_index());
        }

        let step = self.current_step();
        let blocks_forward = step.blocks_forward;
        let result = step.validate(&self.form, &self.context(today));

        match result {
            Ok(()) => {}
            Err(failure) if blocks_forward => {
                tracing::debug!(
                    session_id = %self.id,
                    step = %failure.step,
                    errors = failure.errors.len(),
                    "Step validation failed"
                );
                self.last_errors = failure.errors.clone();
                return Err(WizardError::Validation(failure));
            }
            Err(failure) => {
                self.last_errors = failure.errors;
                self.advance();
                return Ok(self.current_index());
            }
        }

        self.last_errors.clear();
        self.advance();
        Ok(self.current_index())
    }

    fn advance(&mut self) {
        let from = self.current_step().id;
        self.current += 1;
        self.furthest = self.furthest.max(self.current);
        tracing::info!(
            session_id = %self.id,
            from = %from,
            to = %self.current_step().id,
            "Advanced to next step"
        );
    }

    /// Move back one step without validating. No-op on the first step.
    pub fn back(&mut self) -> Result<usize, WizardError> {
        self.ensure_live()?;
        if self.current > 0 {
            self.current -= 1;
            self.last_errors.clear();
            tracing::debug!(session_id = %self.id, to = %self.current_step().id, "Moved back");
        }
        Ok(self.current_index())
    }

    /// Skip the active step without validating, if it is skippable.
    pub fn skip(&mut self) -> Result<usize, WizardError> {
        self.ensure_live()?;
        let step = self.current_step();
        if !step.skippable {
            return Err(WizardError::CannotSkip(step.id));
        }
        if self.current == self.terminal() {
            return Ok(self.current_index());
        }
        self.last_errors.clear();
        self.advance();
        Ok(self.current_index())
    }

    /// Jump directly to a 1-based step index no further than the furthest
    /// step reached through validated moves.
    pub fn jump_to(&mut self, step_index: usize) -> Result<usize, WizardError> {
        self.ensure_live()?;
        if step_index == 0 || step_index > self.furthest_index() {
            return Err(WizardError::InvalidStep {
                requested: step_index,
                reachable: self.furthest_index(),
                total: self.total_steps(),
            });
        }
        if step_index - 1 != self.current {
            self.current = step_index - 1;
            self.last_errors.clear();
            tracing::debug!(session_id = %self.id, to = %self.current_step().id, "Jumped to step");
        }
        Ok(self.current_index())
    }

    // ── Verification ────────────────────────────────────────────────────

    fn ensure_verification_step(&self) -> Result<(), WizardError> {
        let step = self.current_step();
        if !step.verification {
            return Err(WizardError::VerificationUnavailable(step.id));
        }
        Ok(())
    }

    /// Issue a code and start the resend cooldown.
    ///
    /// The destination is read from the form (email, or phone when
    /// `verificationMethod` is `sms`). A missing destination is reported as a
    /// validation failure on that field and nothing is sent.
    pub fn send_code(&mut self) -> Result<SendOutcome, WizardError> {
        self.ensure_live()?;
        self.ensure_verification_step()?;

        let timer = &self.verification.timer;
        if !timer.can_send() {
            tracing::debug!(
                session_id = %self.id,
                remaining = timer.remaining_seconds(),
                "Send ignored during cooldown"
            );
            return Ok(SendOutcome::CoolingDown {
                remaining_seconds: timer.remaining_seconds(),
            });
        }

        let channel = DeliveryChannel::from_form(&self.form);
        let field = channel.destination_field();
        let destination = match self.form.text(field) {
            Some(d) => d.trim().to_string(),
            None => {
                let failure = ValidationFailure {
                    step: self.current_step().id,
                    errors: vec![FieldError::new(field, FieldIssue::Missing)],
                };
                self.last_errors = failure.errors.clone();
                return Err(WizardError::Validation(failure));
            }
        };

        let code = generate_code();
        self.delivery.send_code(&destination, channel, &code);
        self.verification.issued = Some(IssuedCode::new(&code, destination, channel));
        self.verification.timer.send();
        self.last_errors.clear();

        tracing::info!(
            session_id = %self.id,
            channel = channel.as_str(),
            cooldown = self.verification.timer.remaining_seconds(),
            "Verification code issued"
        );
        Ok(SendOutcome::Sent)
    }

    /// Resend a code. Silently does nothing while the cooldown is running.
    pub fn resend_code(&mut self) -> Result<SendOutcome, WizardError> {
        self.send_code()
    }

    /// One elapsed second of the cooldown clock.
    pub fn tick(&mut self) {
        if self.terminated {
            return;
        }
        let timer = &mut self.verification.timer;
        let was_active = timer.is_active();
        timer.tick();
        if was_active && !timer.is_active() {
            tracing::debug!(session_id = %self.id, "Resend cooldown elapsed");
        }
    }

    // ── Commit ──────────────────────────────────────────────────────────

    pub fn commit(&mut self) -> Result<(), WizardError> {
        self.commit_at(Self::today())
    }

    /// Validate the terminal step, re-check every earlier step, then hand the
    /// record to the sink. On success the engine is terminated.
    pub fn commit_at(&mut self, today: NaiveDate) -> Result<(), WizardError> {
        self.ensure_live()?;
        if self.current != self.terminal() {
            return Err(WizardError::CommitNotAllowed {
                current: self.current_index(),
                terminal: self.total_steps(),
            });
        }

        let ctx = self.context(today);
        let terminal_check = self.current_step().validate(&self.form, &ctx);
        // Earlier steps may have been edited from a later one.
        let outcome = terminal_check.and_then(|()| {
            self.steps
                .iter()
                .take(self.terminal())
                .try_for_each(|step| step.validate(&self.form, &ctx))
        });

        if let Err(failure) = outcome {
            tracing::debug!(
                session_id = %self.id,
                step = %failure.step,
                "Commit rejected by validation"
            );
            self.last_errors = failure.errors.clone();
            return Err(WizardError::Validation(failure));
        }

        let record = std::mem::take(&mut self.form);
        self.terminated = true;
        self.last_errors.clear();
        self.verification.timer.stop();
        self.verification.issued = None;

        tracing::info!(session_id = %self.id, fields = record.len(), "Signup committed");
        self.sink.on_complete(record);
        Ok(())
    }

    /// Discard the session. Nothing is sent anywhere.
    pub fn abandon(self) {
        tracing::info!(
            session_id = %self.id,
            step = %self.current_step().id,
            committed = self.terminated,
            "Signup wizard abandoned"
        );
    }

    // ── Rendering ───────────────────────────────────────────────────────

    pub fn verification_status(&self) -> VerificationStatus {
        let timer = &self.verification.timer;
        let issued = self.verification.issued.as_ref();
        VerificationStatus {
            issued: issued.is_some(),
            channel: issued.map(IssuedCode::channel),
            remaining_seconds: timer.remaining_seconds(),
            active: timer.is_active(),
            can_resend: timer.can_send(),
        }
    }

    /// Share of steps already passed, 0-100.
    pub fn progress_percent(&self) -> u8 {
        let passed = if self.terminated { self.steps.len() } else { self.current };
        ((passed * 100) / self.steps.len()) as u8
    }

    /// Snapshot for the host's render callback.
    pub fn view(&self) -> WizardView {
        let step = self.current_step();
        WizardView {
            session_id: self.id.clone(),
            step_index: self.current_index(),
            step: step.id,
            label: step.label,
            total_steps: self.total_steps(),
            form: self.form.clone(),
            errors: self.last_errors.clone(),
            verification: self.verification_status(),
            can_go_back: !self.terminated && self.current > 0,
            can_skip: !self.terminated && step.skippable,
            progress_percent: self.progress_percent(),
            terminated: self.terminated,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
