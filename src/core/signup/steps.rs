//! Step definitions for the signup wizard.
//!
//! A [`StepDefinition`] is static data: the fields a step owns, the rule that
//! gates forward navigation, and whether the step may be skipped. Rules are
//! plain functions over the [`FormState`] and a [`ValidationContext`]; they are
//! total and report every rejected field rather than stopping at the first.

use chrono::NaiveDate;

use super::types::{fields, FieldError, FormState, StepId, ValidationFailure};
use super::verification::IssuedCode;
use crate::core::input_validator::{FieldIssue, InputValidator};

/// Everything a rule may look at besides the form itself.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub validator: &'a InputValidator,
    pub today: NaiveDate,
    /// Most recently issued verification code, if any
    pub issued_code: Option<&'a IssuedCode>,
}

/// Validation predicate for one step.
pub type StepRule = fn(&FormState, &ValidationContext<'_>) -> Vec<FieldError>;

/// Declarative description of one wizard step.
#[derive(Clone)]
pub struct StepDefinition {
    pub id: StepId,
    /// 1-based position in the wizard
    pub ordinal: usize,
    pub label: &'static str,
    pub owned_fields: &'static [&'static str],
    pub rule: StepRule,
    /// Forward navigation waits for the rule to pass
    pub blocks_forward: bool,
    pub skippable: bool,
    /// The step hosts the verification code runtime
    pub verification: bool,
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("ordinal", &self.ordinal)
            .field("owned_fields", &self.owned_fields)
            .field("blocks_forward", &self.blocks_forward)
            .field("skippable", &self.skippable)
            .field("verification", &self.verification)
            .finish_non_exhaustive()
    }
}

impl StepDefinition {
    /// Evaluate the step's rule.
    pub fn validate(
        &self,
        form: &FormState,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), ValidationFailure> {
        let errors = (self.rule)(form, ctx);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure {
                step: self.id,
                errors,
            })
        }
    }

    pub fn owns(&self, field: &str) -> bool {
        self.owned_fields.contains(&field)
    }
}

/// The five signup steps in order.
pub fn signup_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition {
            id: StepId::Account,
            ordinal: 1,
            label: StepId::Account.label(),
            owned_fields: &[
                fields::EMAIL,
                fields::PASSWORD,
                fields::CONFIRM_PASSWORD,
                fields::ACCEPT_TERMS,
            ],
            rule: account_rule,
            blocks_forward: true,
            skippable: false,
            verification: false,
        },
        StepDefinition {
            id: StepId::PersonalInfo,
            ordinal: 2,
            label: StepId::PersonalInfo.label(),
            owned_fields: &[
                fields::FIRST_NAME,
                fields::LAST_NAME,
                fields::DATE_OF_BIRTH,
                fields::PHONE,
                fields::GENDER,
                fields::ADDRESS,
            ],
            rule: personal_info_rule,
            blocks_forward: true,
            skippable: false,
            verification: false,
        },
        StepDefinition {
            id: StepId::Insurance,
            ordinal: 3,
            label: StepId::Insurance.label(),
            owned_fields: &[
                fields::INSURANCE_PROVIDER,
                fields::POLICY_NUMBER,
                fields::GROUP_NUMBER,
            ],
            rule: insurance_rule,
            blocks_forward: true,
            skippable: false,
            verification: false,
        },
        StepDefinition {
            id: StepId::MedicalHistory,
            ordinal: 4,
            label: StepId::MedicalHistory.label(),
            owned_fields: &[fields::ALLERGIES, fields::MEDICATIONS, fields::CONDITIONS],
            rule: medical_history_rule,
            blocks_forward: true,
            skippable: true,
            verification: false,
        },
        StepDefinition {
            id: StepId::Verification,
            ordinal: 5,
            label: StepId::Verification.label(),
            owned_fields: &[fields::VERIFICATION_METHOD, fields::VERIFICATION_CODE],
            rule: verification_rule,
            blocks_forward: true,
            skippable: false,
            verification: true,
        },
    ]
}

fn check(errors: &mut Vec<FieldError>, field: &str, result: Result<(), FieldIssue>) {
    if let Err(issue) = result {
        errors.push(FieldError::new(field, issue));
    }
}

// ============================================================================
// Rules
// ============================================================================

pub fn account_rule(form: &FormState, ctx: &ValidationContext<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    check(&mut errors, fields::EMAIL, ctx.validator.validate_email(form.text(fields::EMAIL)));

    let password = form.raw_text(fields::PASSWORD);
    check(&mut errors, fields::PASSWORD, ctx.validator.validate_password(password));

    match form.raw_text(fields::CONFIRM_PASSWORD) {
        None | Some("") => errors.push(FieldError::new(fields::CONFIRM_PASSWORD, FieldIssue::Missing)),
        Some(confirm) if Some(confirm) != password => {
            errors.push(FieldError::new(fields::CONFIRM_PASSWORD, FieldIssue::PasswordMismatch))
        }
        Some(_) => {}
    }

    if !form.flag(fields::ACCEPT_TERMS) {
        errors.push(FieldError::new(fields::ACCEPT_TERMS, FieldIssue::ConsentRequired));
    }

    errors
}

pub fn personal_info_rule(form: &FormState, ctx: &ValidationContext<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let v = ctx.validator;

    for field in [fields::FIRST_NAME, fields::LAST_NAME, fields::PHONE] {
        check(&mut errors, field, v.validate_required_text(form.raw_text(field)));
    }
    check(
        &mut errors,
        fields::DATE_OF_BIRTH,
        v.validate_past_date(form.raw_text(fields::DATE_OF_BIRTH), ctx.today),
    );
    for field in [fields::GENDER, fields::ADDRESS] {
        check(&mut errors, field, v.validate_optional_text(form.raw_text(field)));
    }

    errors
}

pub fn insurance_rule(form: &FormState, ctx: &ValidationContext<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let v = ctx.validator;

    for field in [fields::INSURANCE_PROVIDER, fields::POLICY_NUMBER] {
        check(&mut errors, field, v.validate_required_text(form.raw_text(field)));
    }
    check(
        &mut errors,
        fields::GROUP_NUMBER,
        v.validate_optional_text(form.raw_text(fields::GROUP_NUMBER)),
    );

    errors
}

/// Pure data collection; empty lists are fine.
pub fn medical_history_rule(_form: &FormState, _ctx: &ValidationContext<'_>) -> Vec<FieldError> {
    Vec::new()
}

pub fn verification_rule(form: &FormState, ctx: &ValidationContext<'_>) -> Vec<FieldError> {
    let entered = form.raw_text(fields::VERIFICATION_CODE);
    if let Err(issue) = ctx.validator.validate_code_format(entered) {
        return vec![FieldError::new(fields::VERIFICATION_CODE, issue)];
    }

    let issue = match ctx.issued_code {
        None => Some(FieldIssue::CodeNotIssued),
        Some(issued) if !issued.sent_to(form) => Some(FieldIssue::DestinationChanged),
        Some(issued) if !issued.matches(entered.unwrap_or_default()) => Some(FieldIssue::CodeMismatch),
        Some(_) => None,
    };

    issue
        .map(|issue| vec![FieldError::new(fields::VERIFICATION_CODE, issue)])
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================
