//! Signup Wizard State Machine
//!
//! Drives a patient through account creation in five ordered steps:
//! 1. Account - Email, password, terms consent
//! 2. Personal Info - Name, date of birth, phone
//! 3. Insurance - Provider and policy number
//! 4. Medical History - Allergies, medications, conditions (skippable)
//! 5. Verification - Six-digit code sent by email or SMS
//!
//! # Design Principles
//!
//! - **Validated forward moves**: `next` only advances past a step whose rule passes
//! - **Free backward moves**: `back` never validates, data is preserved
//! - **Explicit clock**: the resend cooldown is advanced by `tick`, driven by the host
//! - **Session scoped**: nothing is persisted; the record is handed off on commit

mod engine;
mod session;
mod steps;
mod types;
mod verification;

pub use engine::*;
pub use session::*;
pub use steps::*;
pub use types::*;
pub use verification::*;
