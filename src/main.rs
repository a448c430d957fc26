use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use portal_signup::cli::parse_command;
use portal_signup::config::AppConfig;
use portal_signup::core::signup::{
    CommandOutput, Envelope, FormState, LogDelivery, PatientRegistration, RegistrationSink,
    SignupSession, WizardEngine, WizardView,
};

/// Prints the committed registration as JSON on stdout.
struct StdoutSink;

impl RegistrationSink for StdoutSink {
    fn on_complete(&self, record: FormState) {
        let registration = PatientRegistration::from_form(&record);
        match serde_json::to_string_pretty(&registration) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "Failed to serialize registration"),
        }
        tracing::info!(patient = %registration.full_name(), "Registration handed off");
    }
}

fn print_view(view: &WizardView) {
    match serde_json::to_string(view) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Failed to serialize wizard view"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();
    let _log_guard = portal_signup::core::logging::init(&config.logging);
    tracing::info!("{} v{} starting", portal_signup::NAME, portal_signup::VERSION);

    let engine = WizardEngine::signup(&config.signup, Box::new(LogDelivery), Box::new(StdoutSink));
    let (view_tx, mut view_rx) = watch::channel(engine.view());
    let (command_tx, command_rx) = mpsc::channel::<Envelope>(16);

    let session = SignupSession::new(engine, config.signup.tick_interval());
    let session_task = tokio::spawn(session.run(command_rx, view_tx));

    print_view(&view_rx.borrow_and_update());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        let (envelope, reply) = Envelope::with_reply(command);
        if command_tx.send(envelope).await.is_err() {
            break;
        }

        match reply.await {
            Ok(Ok(CommandOutput::Committed)) | Ok(Ok(CommandOutput::Abandoned)) => break,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => eprintln!("error: {e}"),
            Err(_) => break,
        }

        if view_rx.has_changed().unwrap_or(false) {
            print_view(&view_rx.borrow_and_update());
        }
    }

    drop(command_tx);
    let outcome = session_task.await.context("Signup session task failed")?;
    tracing::info!(?outcome, "Signup session finished");

    Ok(())
}
