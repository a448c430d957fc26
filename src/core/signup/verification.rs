//! Verification code issuance and the resend cooldown gate.
//!
//! The [`VerificationTimer`] is a pure countdown driven by an external clock:
//! the host calls [`VerificationTimer::tick`] once per elapsed second. Sending
//! a code arms the timer; resending is a silent no-op until it reaches zero.
//!
//! Codes are generated here and handed to a [`CodeDelivery`] collaborator.
//! Only a SHA-256 digest of the code is retained for comparison.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::{fields, FormState};
use crate::core::input_validator::VERIFICATION_CODE_LENGTH;

/// Default resend cooldown in seconds.
pub const DEFAULT_COOLDOWN_SECS: u32 = 60;

// ============================================================================
// Delivery
// ============================================================================

/// Out-of-band channel a code is delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Email,
    Sms,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Email => "email",
            DeliveryChannel::Sms => "sms",
        }
    }

    /// Channel requested by the form's `verificationMethod`; email unless `sms`.
    pub fn from_form(form: &FormState) -> Self {
        match form.text(fields::VERIFICATION_METHOD) {
            Some(method) if method.trim().eq_ignore_ascii_case("sms") => DeliveryChannel::Sms,
            _ => DeliveryChannel::Email,
        }
    }

    /// Form field holding the destination for this channel.
    pub fn destination_field(&self) -> &'static str {
        match self {
            DeliveryChannel::Email => fields::EMAIL,
            DeliveryChannel::Sms => fields::PHONE,
        }
    }
}

/// Delivers verification codes to the user.
///
/// How the code travels (mail relay, SMS gateway) is the implementor's
/// concern. Delivery problems are not reported back to the wizard; the user
/// recovers by resending once the cooldown has elapsed.
#[cfg_attr(test, mockall::automock)]
pub trait CodeDelivery: Send {
    fn send_code(&self, destination: &str, channel: DeliveryChannel, code: &str);
}

/// Delivery used by the local mock portal: logs the code instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDelivery;

impl CodeDelivery for LogDelivery {
    fn send_code(&self, destination: &str, channel: DeliveryChannel, code: &str) {
        tracing::info!(
            channel = channel.as_str(),
            destination = %destination,
            code = %code,
            "Mock delivery of verification code"
        );
    }
}

/// Generate a uniformly random six-digit code, zero padded.
pub fn generate_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:0width$}", value, width = VERIFICATION_CODE_LENGTH)
}

fn digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// IssuedCode
// ============================================================================

/// Record of the most recently issued code.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCode {
    digest: String,
    destination: String,
    channel: DeliveryChannel,
}

impl IssuedCode {
    pub fn new(code: &str, destination: impl Into<String>, channel: DeliveryChannel) -> Self {
        Self {
            digest: digest(code),
            destination: destination.into(),
            channel,
        }
    }

    /// Whether `entered` equals the issued code.
    pub fn matches(&self, entered: &str) -> bool {
        digest(entered) == self.digest
    }

    /// Whether the form still names the channel and contact this code went to.
    pub fn sent_to(&self, form: &FormState) -> bool {
        let channel = DeliveryChannel::from_form(form);
        channel == self.channel
            && form.text(channel.destination_field()).map(str::trim) == Some(self.destination.as_str())
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn channel(&self) -> DeliveryChannel {
        self.channel
    }
}

impl std::fmt::Debug for IssuedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCode")
            .field("destination", &self.destination)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// VerificationTimer
// ============================================================================

/// Cooldown gate for the resend action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationTimer {
    remaining_seconds: u32,
    active: bool,
    #[serde(skip)]
    cooldown_secs: u32,
}

impl VerificationTimer {
    /// Create an inert timer with the default 60 second cooldown.
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_COOLDOWN_SECS)
    }

    pub fn with_cooldown(cooldown_secs: u32) -> Self {
        Self {
            remaining_seconds: 0,
            active: false,
            cooldown_secs,
        }
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cooldown_secs(&self) -> u32 {
        self.cooldown_secs
    }

    /// A send is permitted before the first arm and after the countdown ends.
    pub fn can_send(&self) -> bool {
        self.remaining_seconds == 0
    }

    /// Arm the cooldown. Returns `false` and changes nothing while cooling down.
    pub fn send(&mut self) -> bool {
        if !self.can_send() {
            return false;
        }
        self.remaining_seconds = self.cooldown_secs;
        self.active = self.cooldown_secs > 0;
        true
    }

    /// Same gate as [`send`](Self::send); a resend during cooldown is silently ignored.
    pub fn resend(&mut self) -> bool {
        self.send()
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) {
        if !self.active {
            return;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.active = false;
        }
    }

    /// Return to the inert state.
    pub fn stop(&mut self) {
        self.remaining_seconds = 0;
        self.active = false;
    }
}

impl Default for VerificationTimer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
