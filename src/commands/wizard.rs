use crate::api::{self, Gateway, Mode};
use crate::args::{StatementArgs, TagMappingArgs, WizardArgs};
use crate::commands::Out;
use crate::error::ErrorType;
use crate::model::{ProcessingStatus, SessionId, StatementSource, TagMappingSource, UploadFile};
use crate::wizard::Wizard;
use crate::{Config, Error, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// What a completed run of the wizard produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct WizardSummary {
    pub session_id: SessionId,
    pub username: String,
    pub enable_ai: bool,
    pub transactions: usize,
}

/// Runs the onboarding wizard non-interactively: creates a session for the username, uploads the
/// statement and the tag mapping, records the AI choice, then waits for the backend to finish
/// processing.
///
/// The backend is polled every `processing_poll_interval` from the config, at most
/// `processing_max_polls` times.
///
/// # Errors
/// - `DuplicateUsername` if the username is taken.
/// - `Validation` if an upload is rejected locally or by the backend.
/// - `Io` if an upload file cannot be read.
/// - `Transport` if the backend cannot be reached or processing does not finish in time.
pub async fn wizard(config: &Config, mode: Mode, args: &WizardArgs) -> Result<Out<WizardSummary>> {
    let gateway = api::gateway(config, mode).await?;
    run(
        gateway,
        args,
        config.processing_poll_interval(),
        config.processing_max_polls(),
    )
    .await
}

async fn run(
    gateway: Box<dyn Gateway + Send>,
    args: &WizardArgs,
    poll_interval: Duration,
    max_polls: u32,
) -> Result<Out<WizardSummary>> {
    let mut wizard = Wizard::new(gateway);
    let session_id = wizard.create_session(args.username()).await?;

    wizard
        .submit_statement(statement_source(args.statement()).await?)
        .await?;
    log_notice(&wizard);

    match tag_mapping_source(args.tag_mapping()).await? {
        Some(source) => {
            wizard.submit_tag_mapping(source).await?;
            log_notice(&wizard);
        }
        None => {
            info!("Skipping the tag mapping");
            wizard.skip_tag_mapping()?;
        }
    }

    wizard.set_enable_ai(args.enable_ai()).await?;

    let mut status = wizard.advance_from_config().await?;
    let mut polls = 1;
    while status == ProcessingStatus::Pending {
        if polls >= max_polls.max(1) {
            return Err(Error::new(
                ErrorType::Transport,
                format!(
                    "Processing of session {session_id} did not complete after {polls} polls, \
                    try again later with 'ninja transactions --session-id {session_id}'"
                ),
            ));
        }
        debug!("Processing is pending, waiting {poll_interval:?}");
        tokio::time::sleep(poll_interval).await;
        status = wizard.poll_processing().await?;
        polls += 1;
    }
    log_notice(&wizard);

    let username = args.username().trim().to_string();
    let enable_ai = wizard.session().is_some_and(|s| s.enable_ai());
    let mut editor = wizard.into_editor();
    editor.load_transactions().await?;
    let count = editor.transactions().len();

    let message = format!(
        "Session {session_id} is ready with {count} transaction{}. \
        Set NINJA_SESSION_ID={session_id} to review them with 'ninja transactions'",
        if count == 1 { "" } else { "s" }
    );
    Ok(Out::new(
        message,
        WizardSummary {
            session_id,
            username,
            enable_ai,
            transactions: count,
        },
    ))
}

async fn statement_source(args: &StatementArgs) -> Result<StatementSource> {
    Ok(match args.path() {
        Some(path) => StatementSource::File(UploadFile::load(path).await?),
        None => StatementSource::Sample,
    })
}

/// `None` means the step is skipped.
async fn tag_mapping_source(args: &TagMappingArgs) -> Result<Option<TagMappingSource>> {
    if args.is_skip() {
        return Ok(None);
    }
    Ok(Some(match args.path() {
        Some(path) => TagMappingSource::File(UploadFile::load(path).await?),
        None => TagMappingSource::Sample,
    }))
}

fn log_notice(wizard: &Wizard) {
    if let Some(notice) = wizard.progress().last_notice() {
        info!("{notice}");
    }
}
