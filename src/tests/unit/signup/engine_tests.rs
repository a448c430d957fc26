//! Signup Wizard Engine Unit Tests
//!
//! Tests for the wizard engine including:
//! - Forward navigation gated by step validation
//! - Unconditional backward navigation
//! - Jumping to previously reached steps
//! - Verification code send / resend gating
//! - Commit rules and termination

use chrono::NaiveDate;

use crate::config::SignupConfig;
use crate::core::signup::{
    field_map, fields, FieldIssue, FieldValue, PatientRegistration, SendOutcome, StepId,
    WizardEngine, WizardError,
};
use crate::tests::common::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn enter_code(engine: &mut WizardEngine, code: &str) {
    engine
        .update(field_map([(fields::VERIFICATION_CODE, code)]))
        .unwrap();
}

fn at_verification_with_code_sent() -> (WizardEngine, SentCodes, Completed) {
    let (mut engine, sent, completed) = recording_engine();
    advance_to_verification(&mut engine);
    assert_eq!(engine.send_code(), Ok(SendOutcome::Sent));
    (engine, sent, completed)
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_valid_account_advances_to_step_two() {
    let (mut engine, _, _) = recording_engine();

    engine.update(valid_account()).unwrap();
    assert_eq!(engine.next(), Ok(2));
    assert_eq!(engine.current_step().id, StepId::PersonalInfo);
    assert!(engine.last_errors().is_empty());
}

#[test]
fn test_short_password_keeps_step_one() {
    let (mut engine, _, _) = recording_engine();

    engine.update(valid_account()).unwrap();
    engine
        .update(field_map([
            (fields::PASSWORD, "short"),
            (fields::CONFIRM_PASSWORD, "short"),
        ]))
        .unwrap();

    let err = engine.next().unwrap_err();
    assert_eq!(engine.current_index(), 1);

    let failure = err.validation().expect("expected a validation error");
    assert_eq!(failure.step, StepId::Account);
    assert_eq!(
        failure.issue_for(fields::PASSWORD),
        Some(&FieldIssue::PasswordTooShort { min: 8 })
    );
    assert!(!failure.has_field(fields::CONFIRM_PASSWORD));
}

#[test]
fn test_mismatched_confirmation_and_missing_consent() {
    let (mut engine, _, _) = recording_engine();

    engine.update(valid_account()).unwrap();
    engine
        .update(field_map([
            (fields::CONFIRM_PASSWORD, FieldValue::from("abc12399")),
            (fields::ACCEPT_TERMS, false.into()),
        ]))
        .unwrap();

    let failure = engine.next().unwrap_err().validation().cloned().unwrap();
    assert_eq!(
        failure.issue_for(fields::CONFIRM_PASSWORD),
        Some(&FieldIssue::PasswordMismatch)
    );
    assert_eq!(
        failure.issue_for(fields::ACCEPT_TERMS),
        Some(&FieldIssue::ConsentRequired)
    );
    assert_eq!(engine.current_index(), 1);
}

#[test]
fn test_date_of_birth_must_be_past() {
    let (mut engine, _, _) = recording_engine();
    engine.update(valid_account()).unwrap();
    engine.next().unwrap();

    engine.update(valid_personal_info()).unwrap();
    engine
        .update(field_map([(fields::DATE_OF_BIRTH, "2024-06-01")]))
        .unwrap();

    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let failure = engine.next_at(today).unwrap_err().validation().cloned().unwrap();
    assert_eq!(
        failure.issue_for(fields::DATE_OF_BIRTH),
        Some(&FieldIssue::DateNotInPast)
    );

    let tomorrow = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
    assert_eq!(engine.next_at(tomorrow), Ok(3));
}

#[test]
fn test_back_preserves_data_and_never_validates() {
    let (mut engine, _, _) = recording_engine();
    engine.update(valid_account()).unwrap();
    engine.next().unwrap();

    // Step 2 is empty and invalid, back still works
    assert_eq!(engine.back(), Ok(1));
    assert_eq!(engine.back(), Ok(1));
    assert_eq!(engine.form().text(fields::EMAIL), Some("a@b.com"));

    // Re-advancing re-validates the account step
    assert_eq!(engine.next(), Ok(2));
}

#[test]
fn test_medical_history_passes_empty_and_is_skippable() {
    let (mut engine, _, _) = recording_engine();
    for partial in [valid_account(), valid_personal_info(), valid_insurance()] {
        engine.update(partial).unwrap();
        engine.next().unwrap();
    }
    assert_eq!(engine.current_step().id, StepId::MedicalHistory);
    assert!(engine.view().can_skip);

    assert_eq!(engine.skip(), Ok(5));
    assert_eq!(engine.furthest_index(), 5);
    assert_eq!(engine.back(), Ok(4));
    assert_eq!(engine.back(), Ok(3));
    assert_eq!(engine.jump_to(5), Ok(5));
    assert_eq!(engine.back(), Ok(4));
    assert_eq!(engine.next(), Ok(5));
}

#[test]
fn test_next_on_last_step_is_noop() {
    let (mut engine, _, _) = recording_engine();
    advance_to_verification(&mut engine);

    // Verification has no code yet, but next on the last step does nothing
    assert_eq!(engine.next(), Ok(5));
    assert!(engine.last_errors().is_empty());
}

#[test]
fn test_jump_to_previously_reached_steps() {
    let (mut engine, _, _) = recording_engine();
    engine.update(valid_account()).unwrap();
    engine.next().unwrap();
    engine.update(valid_personal_info()).unwrap();
    engine.next().unwrap();
    assert_eq!(engine.furthest_index(), 3);

    assert_eq!(engine.jump_to(1), Ok(1));
    assert_eq!(engine.jump_to(3), Ok(3));
    assert_eq!(
        engine.jump_to(4),
        Err(WizardError::InvalidStep {
            requested: 4,
            reachable: 3,
            total: 5
        })
    );
    assert_eq!(
        engine.jump_to(9),
        Err(WizardError::InvalidStep {
            requested: 9,
            reachable: 3,
            total: 5
        })
    );
    assert_eq!(engine.current_index(), 3);
}

#[test]
fn test_progress_and_view() {
    let (mut engine, _, _) = recording_engine();
    engine.update(valid_account()).unwrap();
    engine.next().unwrap();

    let view = engine.view();
    assert_eq!(view.step_index, 2);
    assert_eq!(view.step, StepId::PersonalInfo);
    assert_eq!(view.label, "Personal Info");
    assert_eq!(view.total_steps, 5);
    assert_eq!(view.progress_percent, 20);
    assert!(view.can_go_back);
    assert!(!view.can_skip);
    assert_eq!(view.session_id, engine.id());
}

// ============================================================================
// Verification
// ============================================================================

#[test]
fn test_send_delivers_to_email_by_default() {
    let (engine, sent, _) = at_verification_with_code_sent();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (destination, channel, code) = &sent[0];
    assert_eq!(destination, "a@b.com");
    assert_eq!(channel, "email");
    assert_eq!(code.len(), 6);

    let status = engine.verification_status();
    assert!(status.issued);
    assert!(status.active);
    assert_eq!(status.remaining_seconds, 60);
    assert!(!status.can_resend);
}

#[test]
fn test_send_by_sms_uses_phone() {
    let (mut engine, sent, _) = recording_engine();
    advance_to_verification(&mut engine);
    engine
        .update(field_map([(fields::VERIFICATION_METHOD, "sms")]))
        .unwrap();

    assert_eq!(engine.send_code(), Ok(SendOutcome::Sent));
    let sent = sent.lock().unwrap();
    assert_eq!(sent[0].0, "555-0100");
    assert_eq!(sent[0].1, "sms");
}

#[test]
fn test_send_without_destination_reports_field() {
    let (mut engine, sent, _) = recording_engine();
    advance_to_verification(&mut engine);
    engine
        .update(field_map([(fields::VERIFICATION_METHOD, "sms"), (fields::PHONE, "")]))
        .unwrap();

    let failure = engine.send_code().unwrap_err().validation().cloned().unwrap();
    assert_eq!(failure.issue_for(fields::PHONE), Some(&FieldIssue::Missing));
    assert!(sent.lock().unwrap().is_empty());
    assert!(!engine.timer().is_active());
}

#[test]
fn test_immediate_resend_is_silent_noop() {
    let (mut engine, sent, _) = at_verification_with_code_sent();

    assert_eq!(
        engine.resend_code(),
        Ok(SendOutcome::CoolingDown {
            remaining_seconds: 60
        })
    );
    assert_eq!(sent.lock().unwrap().len(), 1);
    assert_eq!(engine.timer().remaining_seconds(), 60);
}

#[test]
fn test_resend_after_cooldown() {
    let (mut engine, sent, _) = at_verification_with_code_sent();

    for _ in 0..60 {
        engine.tick();
    }
    assert_eq!(engine.timer().remaining_seconds(), 0);
    assert!(!engine.timer().is_active());

    assert_eq!(engine.resend_code(), Ok(SendOutcome::Sent));
    assert_eq!(sent.lock().unwrap().len(), 2);
    assert_eq!(engine.timer().remaining_seconds(), 60);
}

#[test]
fn test_resend_replaces_issued_code() {
    let (mut engine, sent, _) = recording_engine_with(&SignupConfig {
        resend_cooldown_secs: 1,
        ..SignupConfig::default()
    });
    advance_to_verification(&mut engine);

    engine.send_code().unwrap();
    let first = last_code(&sent);
    engine.tick();
    engine.resend_code().unwrap();
    let second = last_code(&sent);

    enter_code(&mut engine, &second);
    assert!(engine.validate_current().is_ok());

    if first != second {
        enter_code(&mut engine, &first);
        let failure = engine.validate_current().unwrap_err();
        assert_eq!(failure.issue_for(fields::VERIFICATION_CODE), Some(&FieldIssue::CodeMismatch));
    }
}

#[test]
fn test_code_rejected_before_send() {
    let (mut engine, _, _) = recording_engine();
    advance_to_verification(&mut engine);
    enter_code(&mut engine, "123456");

    let failure = engine.validate_current().unwrap_err();
    assert_eq!(
        failure.issue_for(fields::VERIFICATION_CODE),
        Some(&FieldIssue::CodeNotIssued)
    );
}

#[test]
fn test_timer_keeps_running_off_the_verification_step() {
    let (mut engine, _, _) = at_verification_with_code_sent();
    engine.back().unwrap();
    engine.tick();
    assert_eq!(engine.timer().remaining_seconds(), 59);
    assert_eq!(
        engine.send_code(),
        Err(WizardError::VerificationUnavailable(StepId::MedicalHistory))
    );
}

// ============================================================================
// Commit
// ============================================================================

#[test]
fn test_commit_hands_record_to_sink() {
    let (mut engine, sent, completed) = at_verification_with_code_sent();
    let code = last_code(&sent);
    enter_code(&mut engine, &code);

    assert_eq!(engine.commit(), Ok(()));
    assert!(engine.is_terminated());
    assert!(engine.form().is_empty());
    assert!(!engine.timer().is_active());

    let completed = completed.lock().unwrap();
    assert_eq!(completed.len(), 1);
    let registration = PatientRegistration::from_form(&completed[0]);
    assert_eq!(registration.email, "a@b.com");
    assert_eq!(registration.full_name(), "Jane Doe");
    assert_eq!(registration.conditions, vec!["asthma", "hypertension"]);
    assert_eq!(registration.group_number, None);
}

#[test]
fn test_commit_with_wrong_code_fails_without_mutation() {
    let (mut engine, sent, completed) = at_verification_with_code_sent();
    let code = last_code(&sent);
    let wrong = if code == "000000" { "111111" } else { "000000" };
    enter_code(&mut engine, wrong);
    let before = engine.form().clone();

    let failure = engine.commit().unwrap_err().validation().cloned().unwrap();
    assert_eq!(failure.step, StepId::Verification);
    assert_eq!(engine.form(), &before);
    assert!(!engine.is_terminated());
    assert!(completed.lock().unwrap().is_empty());
}

#[test]
fn test_commit_rejects_contact_changed_after_send() {
    let (mut engine, sent, completed) = recording_engine_with(&SignupConfig {
        resend_cooldown_secs: 1,
        ..SignupConfig::default()
    });
    advance_to_verification(&mut engine);
    engine.send_code().unwrap();
    let code = last_code(&sent);

    engine
        .update(field_map([(fields::EMAIL, "other@example.com")]))
        .unwrap();
    enter_code(&mut engine, &code);

    let failure = engine.commit().unwrap_err().validation().cloned().unwrap();
    assert_eq!(
        failure.issue_for(fields::VERIFICATION_CODE),
        Some(&FieldIssue::DestinationChanged)
    );
    assert!(!engine.is_terminated());
    assert!(completed.lock().unwrap().is_empty());

    // A fresh code sent to the new address completes the signup
    engine.tick();
    assert_eq!(engine.resend_code(), Ok(SendOutcome::Sent));
    assert_eq!(sent.lock().unwrap().last().unwrap().0, "other@example.com");
    let code = last_code(&sent);
    enter_code(&mut engine, &code);

    assert_eq!(engine.commit(), Ok(()));
    let completed = completed.lock().unwrap();
    assert_eq!(PatientRegistration::from_form(&completed[0]).email, "other@example.com");
}

#[test]
fn test_switching_channel_after_send_invalidates_code() {
    let (mut engine, sent, _) = at_verification_with_code_sent();
    let code = last_code(&sent);
    engine
        .update(field_map([(fields::VERIFICATION_METHOD, "sms")]))
        .unwrap();
    enter_code(&mut engine, &code);

    let failure = engine.validate_current().unwrap_err();
    assert_eq!(
        failure.issue_for(fields::VERIFICATION_CODE),
        Some(&FieldIssue::DestinationChanged)
    );
}

#[test]
fn test_commit_before_terminal_step_fails() {
    let (mut engine, _, completed) = recording_engine();
    engine.update(valid_account()).unwrap();
    engine.next().unwrap();
    let before = engine.form().clone();

    assert_eq!(
        engine.commit(),
        Err(WizardError::CommitNotAllowed {
            current: 2,
            terminal: 5
        })
    );
    assert_eq!(engine.form(), &before);
    assert!(completed.lock().unwrap().is_empty());
}

#[test]
fn test_commit_revalidates_earlier_steps() {
    let (mut engine, sent, completed) = at_verification_with_code_sent();
    let code = last_code(&sent);
    enter_code(&mut engine, &code);

    // An earlier step's field edited from the last step
    engine
        .update(field_map([(fields::EMAIL, "broken")]))
        .unwrap();

    let failure = engine.commit().unwrap_err().validation().cloned().unwrap();
    assert_eq!(failure.step, StepId::Account);
    assert_eq!(failure.issue_for(fields::EMAIL), Some(&FieldIssue::InvalidEmail));
    assert!(completed.lock().unwrap().is_empty());
}

#[test]
fn test_operations_after_commit_are_rejected() {
    let (mut engine, sent, completed) = at_verification_with_code_sent();
    let code = last_code(&sent);
    enter_code(&mut engine, &code);
    engine.commit().unwrap();

    assert_eq!(engine.update(valid_account()), Err(WizardError::Terminated));
    assert_eq!(engine.next(), Err(WizardError::Terminated));
    assert_eq!(engine.back(), Err(WizardError::Terminated));
    assert_eq!(engine.jump_to(1), Err(WizardError::Terminated));
    assert_eq!(engine.send_code(), Err(WizardError::Terminated));
    assert_eq!(engine.commit(), Err(WizardError::Terminated));
    assert_eq!(completed.lock().unwrap().len(), 1);

    let view = engine.view();
    assert!(view.terminated);
    assert_eq!(view.progress_percent, 100);
    assert!(!view.can_go_back);
}

#[test]
fn test_abandon_sends_nothing() {
    let (mut engine, sent, completed) = recording_engine();
    engine.update(valid_account()).unwrap();
    engine.next().unwrap();
    engine.abandon();

    assert!(sent.lock().unwrap().is_empty());
    assert!(completed.lock().unwrap().is_empty());
}
