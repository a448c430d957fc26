//! Input Validator Module
//!
//! Field-level validation rules for signup form input. Every check is total:
//! it returns `Ok(())` or the [`FieldIssue`] describing why the value was
//! rejected, and never panics on arbitrary input.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Matches `local@domain.tld` with no whitespace and a dotted domain.
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("Invalid email regex")
});

/// Number of digits in a verification code.
pub const VERIFICATION_CODE_LENGTH: usize = 6;

/// Date format accepted for dates of birth.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Error Types
// ============================================================================

/// Reason a single field failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldIssue {
    #[error("is required")]
    Missing,

    #[error("is not a valid email address")]
    InvalidEmail,

    #[error("must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("must contain at least one letter")]
    PasswordNeedsLetter,

    #[error("must contain at least one digit")]
    PasswordNeedsDigit,

    #[error("does not match the password")]
    PasswordMismatch,

    #[error("must be accepted")]
    ConsentRequired,

    #[error("is not a valid date (expected YYYY-MM-DD)")]
    InvalidDate,

    #[error("must be in the past")]
    DateNotInPast,

    #[error("exceeds maximum length of {max} characters")]
    TooLong { max: usize },

    #[error("contains null bytes")]
    NullByte,

    #[error("must be exactly 6 digits")]
    InvalidCodeFormat,

    #[error("no verification code has been sent")]
    CodeNotIssued,

    #[error("does not match the code that was sent")]
    CodeMismatch,

    #[error("was sent to a contact that has since changed")]
    DestinationChanged,
}

pub type Result<T> = std::result::Result<T, FieldIssue>;

// ============================================================================
// Input Validator
// ============================================================================

/// Configurable field validator shared by all signup steps.
#[derive(Debug, Clone)]
pub struct InputValidator {
    /// Minimum password length
    password_min_length: usize,
    /// Maximum allowed length of a free-text field
    max_field_length: usize,
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            password_min_length: 8,
            max_field_length: 256,
        }
    }

    pub fn with_limits(password_min_length: usize, max_field_length: usize) -> Self {
        Self {
            password_min_length,
            max_field_length,
        }
    }

    pub fn password_min_length(&self) -> usize {
        self.password_min_length
    }

    /// Validate a required free-text field.
    pub fn validate_required_text(&self, input: Option<&str>) -> Result<()> {
        let value = match input {
            Some(v) if !v.trim().is_empty() => v,
            _ => return Err(FieldIssue::Missing),
        };

        if value.contains('\0') {
            return Err(FieldIssue::NullByte);
        }

        if value.chars().count() > self.max_field_length {
            return Err(FieldIssue::TooLong {
                max: self.max_field_length,
            });
        }

        Ok(())
    }

    /// Validate an optional free-text field; absent values pass.
    pub fn validate_optional_text(&self, input: Option<&str>) -> Result<()> {
        match input {
            Some(v) if !v.trim().is_empty() => self.validate_required_text(Some(v)),
            _ => Ok(()),
        }
    }

    /// Validate the shape of an email address.
    pub fn validate_email(&self, input: Option<&str>) -> Result<()> {
        self.validate_required_text(input)?;
        let email = input.map(str::trim).unwrap_or_default();
        if !EMAIL_PATTERN.is_match(email) {
            return Err(FieldIssue::InvalidEmail);
        }
        Ok(())
    }

    /// Validate password strength: minimum length, at least one letter and one digit.
    ///
    /// Passwords are not trimmed; surrounding whitespace counts toward length.
    pub fn validate_password(&self, input: Option<&str>) -> Result<()> {
        let password = match input {
            Some(p) if !p.is_empty() => p,
            _ => return Err(FieldIssue::Missing),
        };

        if password.contains('\0') {
            return Err(FieldIssue::NullByte);
        }

        if password.chars().count() < self.password_min_length {
            return Err(FieldIssue::PasswordTooShort {
                min: self.password_min_length,
            });
        }

        if !password.chars().any(|c| c.is_alphabetic()) {
            return Err(FieldIssue::PasswordNeedsLetter);
        }

        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(FieldIssue::PasswordNeedsDigit);
        }

        Ok(())
    }

    /// Validate that a `YYYY-MM-DD` date parses and lies strictly before `today`.
    pub fn validate_past_date(&self, input: Option<&str>, today: NaiveDate) -> Result<()> {
        self.validate_required_text(input)?;
        let raw = input.map(str::trim).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| FieldIssue::InvalidDate)?;
        if date >= today {
            return Err(FieldIssue::DateNotInPast);
        }
        Ok(())
    }

    /// Validate that a verification code is exactly six ASCII digits.
    pub fn validate_code_format(&self, input: Option<&str>) -> Result<()> {
        let code = match input {
            Some(c) if !c.trim().is_empty() => c.trim(),
            _ => return Err(FieldIssue::Missing),
        };

        if code.len() != VERIFICATION_CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FieldIssue::InvalidCodeFormat);
        }

        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
