//! Signup Wizard Domain Types
//!
//! Defines the core domain types for the patient signup wizard:
//! - [`FormState`]: Accumulating record shared by every step
//! - [`FieldValue`]: A single form value (text, checkbox, or list)
//! - [`StepId`]: The five signup steps in order
//! - [`WizardError`]: Error types for wizard operations
//! - [`PatientRegistration`]: Typed view of a completed record
//!
//! # Architecture
//!
//! The host UI sends partial updates keyed by field name. The [`FormState`]
//! stores them in one flat map so later steps can read earlier values (the
//! verification step reads the email and phone captured during
//! personal-info). Step ownership of keys lives in the step definitions, not
//! in the map itself.
//!
//! # Serialization
//!
//! All types implement `Serialize`/`Deserialize` so the host can exchange
//! them as JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::core::input_validator::FieldIssue;

// ============================================================================
// Field Keys
// ============================================================================

/// Field keys as sent by the host forms.
pub mod fields {
    // Account step
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirmPassword";
    pub const ACCEPT_TERMS: &str = "acceptTerms";

    // Personal info step
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const DATE_OF_BIRTH: &str = "dateOfBirth";
    pub const PHONE: &str = "phone";
    pub const GENDER: &str = "gender";
    pub const ADDRESS: &str = "address";

    // Insurance step
    pub const INSURANCE_PROVIDER: &str = "insuranceProvider";
    pub const POLICY_NUMBER: &str = "policyNumber";
    pub const GROUP_NUMBER: &str = "groupNumber";

    // Medical history step
    pub const ALLERGIES: &str = "allergies";
    pub const MEDICATIONS: &str = "medications";
    pub const CONDITIONS: &str = "conditions";

    // Verification step
    pub const VERIFICATION_METHOD: &str = "verificationMethod";
    pub const VERIFICATION_CODE: &str = "verificationCode";
}

// ============================================================================
// FormState - Accumulated Record
// ============================================================================

/// A single form value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    List(Vec<String>),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Partial update sent by the host.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Build a [`FieldMap`] from `(key, value)` pairs.
pub fn field_map<K, V, I>(pairs: I) -> FieldMap
where
    K: Into<String>,
    V: Into<FieldValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// The accumulated signup record.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormState {
    values: FieldMap,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow merge: every key in `partial` overwrites the stored value,
    /// keys not present in `partial` are left untouched.
    pub fn merge(&mut self, partial: FieldMap) {
        self.values.extend(partial);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Text value for `key`, or `None` when missing, blank, or not text.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(FieldValue::as_text)
            .filter(|s| !s.trim().is_empty())
    }

    /// Raw text value for `key`, untrimmed and possibly empty.
    pub fn raw_text(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(FieldValue::as_text)
    }

    /// Checkbox value for `key`; missing counts as unchecked.
    ///
    /// The host may submit checkboxes as the strings `"true"`/`"false"`.
    pub fn flag(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(FieldValue::Flag(b)) => *b,
            Some(FieldValue::Text(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// List value for `key`; missing counts as empty.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(FieldValue::List(items)) => items.clone(),
            Some(FieldValue::Text(s)) if !s.trim().is_empty() => s
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Values are never printed: the record holds passwords and health data.
impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormState")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// StepId
// ============================================================================

/// The signup steps, in wizard order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Account,
    PersonalInfo,
    Insurance,
    MedicalHistory,
    Verification,
}

impl StepId {
    pub const ALL: [StepId; 5] = [
        StepId::Account,
        StepId::PersonalInfo,
        StepId::Insurance,
        StepId::MedicalHistory,
        StepId::Verification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Account => "account",
            StepId::PersonalInfo => "personal_info",
            StepId::Insurance => "insurance",
            StepId::MedicalHistory => "medical_history",
            StepId::Verification => "verification",
        }
    }

    /// Human-readable label shown in the step indicator.
    pub fn label(&self) -> &'static str {
        match self {
            StepId::Account => "Account",
            StepId::PersonalInfo => "Personal Info",
            StepId::Insurance => "Insurance",
            StepId::MedicalHistory => "Medical History",
            StepId::Verification => "Verification",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StepId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        StepId::ALL
            .into_iter()
            .find(|step| step.as_str() == value)
            .ok_or_else(|| format!("unknown signup step: {value}"))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub issue: FieldIssue,
}

impl FieldError {
    pub fn new(field: impl Into<String>, issue: FieldIssue) -> Self {
        Self {
            field: field.into(),
            issue,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.issue)
    }
}

/// Every field error reported by one step's rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub step: StepId,
    pub errors: Vec<FieldError>,
}

impl ValidationFailure {
    /// Whether `field` is among the rejected fields.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Issue reported for `field`, if any.
    pub fn issue_for(&self, field: &str) -> Option<&FieldIssue> {
        self.errors.iter().find(|e| e.field == field).map(|e| &e.issue)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "step {} is invalid: {}", self.step, details.join("; "))
    }
}

impl std::error::Error for ValidationFailure {}

/// Errors that can occur during wizard operations.
///
/// None of these are fatal: the engine state is unchanged after any error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Invalid step {requested}: reachable steps are 1..={reachable} of {total}")]
    InvalidStep {
        requested: usize,
        reachable: usize,
        total: usize,
    },

    #[error("Cannot skip non-skippable step: {0}")]
    CannotSkip(StepId),

    #[error("Commit is only allowed on step {terminal} (currently on step {current})")]
    CommitNotAllowed { current: usize, terminal: usize },

    #[error("Verification is not available on step: {0}")]
    VerificationUnavailable(StepId),

    #[error("Wizard session has already been committed")]
    Terminated,
}

impl WizardError {
    /// The validation failure, when this is a validation error.
    pub fn validation(&self) -> Option<&ValidationFailure> {
        match self {
            WizardError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

// ============================================================================
// PatientRegistration - Typed Final Record
// ============================================================================

/// Typed view of a committed signup record, handed to the registration process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRegistration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub phone: String,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub insurance_provider: String,
    pub policy_number: String,
    pub group_number: Option<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub conditions: Vec<String>,
    pub accepted_terms: bool,
}

impl PatientRegistration {
    /// Extract the registration from a record. The password is deliberately
    /// left out; credential handling belongs to the account service.
    pub fn from_form(form: &FormState) -> Self {
        let text = |key: &str| form.text(key).map(|s| s.trim().to_string()).unwrap_or_default();
        let optional = |key: &str| form.text(key).map(|s| s.trim().to_string());

        Self {
            email: text(fields::EMAIL),
            first_name: text(fields::FIRST_NAME),
            last_name: text(fields::LAST_NAME),
            date_of_birth: text(fields::DATE_OF_BIRTH),
            phone: text(fields::PHONE),
            gender: optional(fields::GENDER),
            address: optional(fields::ADDRESS),
            insurance_provider: text(fields::INSURANCE_PROVIDER),
            policy_number: text(fields::POLICY_NUMBER),
            group_number: optional(fields::GROUP_NUMBER),
            allergies: form.list(fields::ALLERGIES),
            medications: form.list(fields::MEDICATIONS),
            conditions: form.list(fields::CONDITIONS),
            accepted_terms: form.flag(fields::ACCEPT_TERMS),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ============================================================================
// Tests
// ============================================================================
