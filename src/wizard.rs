//! The onboarding wizard: a linear sequence of steps that creates a session, uploads a statement
//! and an optional tag mapping, sets options and waits for the backend to finish processing.
//!
//! Every step action makes at most one gateway call. Whatever the outcome, it is recorded in
//! `WizardProgress` so that a presentation layer can render the state without inspecting results,
//! and it is also returned to the caller.

use crate::api::Gateway;
use crate::editor::Editor;
use crate::error::ErrorType;
use crate::model::{ProcessingStatus, Session, SessionId, StatementSource, TagMappingSource};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const PROCESSING_COMPLETE: &str = "Processing complete!";

/// The steps of the wizard, in order.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    UploadStatement,
    UploadTagMapping,
    ConfigureOptions,
    Processing,
    Complete,
}

serde_plain::derive_display_from_serialize!(WizardStep);
serde_plain::derive_fromstr_from_deserialize!(WizardStep);

impl WizardStep {
    /// The zero-based position of the step.
    pub fn index(self) -> u8 {
        match self {
            WizardStep::UploadStatement => 0,
            WizardStep::UploadTagMapping => 1,
            WizardStep::ConfigureOptions => 2,
            WizardStep::Processing => 3,
            WizardStep::Complete => 4,
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            WizardStep::UploadStatement => Some(WizardStep::UploadTagMapping),
            WizardStep::UploadTagMapping => Some(WizardStep::ConfigureOptions),
            WizardStep::ConfigureOptions => Some(WizardStep::Processing),
            WizardStep::Processing => Some(WizardStep::Complete),
            WizardStep::Complete => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            WizardStep::UploadStatement => None,
            WizardStep::UploadTagMapping => Some(WizardStep::UploadStatement),
            WizardStep::ConfigureOptions => Some(WizardStep::UploadTagMapping),
            WizardStep::Processing => Some(WizardStep::ConfigureOptions),
            WizardStep::Complete => Some(WizardStep::Processing),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::UploadStatement => "Upload Statement",
            WizardStep::UploadTagMapping => "Upload Tag Mapping",
            WizardStep::ConfigureOptions => "Configure Options",
            WizardStep::Processing => "Processing",
            WizardStep::Complete => "Complete",
        }
    }
}

/// What the presentation layer renders.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WizardProgress {
    step: WizardStep,
    is_busy: bool,
    last_error: Option<String>,
    last_notice: Option<String>,
}

impl WizardProgress {
    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// True while a step action is waiting on the gateway.
    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_notice(&self) -> Option<&str> {
        self.last_notice.as_deref()
    }
}

/// The result of `Wizard::go_back`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Navigation {
    /// The wizard moved back to this step.
    Step(WizardStep),
    /// The wizard was left from its first step and the session was dropped.
    Exited,
}

/// The wizard context. It starts without a session; `create_session` establishes one and
/// `go_back` from the first step tears it down.
pub struct Wizard {
    gateway: Box<dyn Gateway + Send>,
    session: Option<Session>,
    progress: WizardProgress,
}

impl Wizard {
    pub fn new(gateway: Box<dyn Gateway + Send>) -> Self {
        Self {
            gateway,
            session: None,
            progress: WizardProgress::default(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn progress(&self) -> &WizardProgress {
        &self.progress
    }

    pub fn step(&self) -> WizardStep {
        self.progress.step
    }

    /// Creates a new session for `username` after checking that the name is free. On success the
    /// wizard starts over at the first step.
    pub async fn create_session(&mut self, username: &str) -> Result<SessionId> {
        let username = username.trim();
        if username.is_empty() {
            return Err(self.fail(Error::new(ErrorType::Validation, "A username is required")));
        }

        self.progress.is_busy = true;
        let result = self.create_session_inner(username).await;
        match result {
            Ok(session_id) => {
                info!("Created session {session_id} for '{username}'");
                self.session = Some(Session::new(session_id.clone(), username));
                self.progress = WizardProgress::default();
                Ok(session_id)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn create_session_inner(&mut self, username: &str) -> Result<SessionId> {
        if self.gateway.username_exists(username).await? {
            return Err(Error::new(
                ErrorType::DuplicateUsername,
                format!("The username '{username}' is already taken"),
            ));
        }
        self.gateway.create_session(username).await
    }

    /// Uploads the statement, or loads the sample statement. Only valid on the first step.
    pub async fn submit_statement(&mut self, source: StatementSource) -> Result<()> {
        let session_id = self.require(WizardStep::UploadStatement)?;
        if let Err(e) = source.validate() {
            return Err(self.fail(e));
        }
        let enable_ai = self.session.as_ref().is_some_and(Session::enable_ai);

        self.progress.is_busy = true;
        debug!("Submitting statement {source:?} for session {session_id}");
        let result = self
            .gateway
            .upload_statement(&session_id, &source, enable_ai)
            .await;
        self.complete_step(result, source.success_notice())
    }

    /// Uploads the tag mapping, or loads the sample mapping. Only valid on the second step.
    pub async fn submit_tag_mapping(&mut self, source: TagMappingSource) -> Result<()> {
        let session_id = self.require(WizardStep::UploadTagMapping)?;
        if let Err(e) = source.validate() {
            return Err(self.fail(e));
        }

        self.progress.is_busy = true;
        debug!("Submitting tag mapping {source:?} for session {session_id}");
        let result = self.gateway.upload_tag_mapping(&session_id, &source).await;
        self.complete_step(result, source.success_notice())
    }

    /// Moves past the tag mapping step without contacting the backend. The notice from the
    /// previous step is kept.
    pub fn skip_tag_mapping(&mut self) -> Result<()> {
        self.require(WizardStep::UploadTagMapping)?;
        self.progress.last_error = None;
        self.advance();
        Ok(())
    }

    /// Sets the AI flag right away and tells the backend on a best-effort basis. A failed
    /// notification is logged and does not revert the flag.
    pub async fn set_enable_ai(&mut self, enabled: bool) -> Result<()> {
        let session_id = self.require(WizardStep::ConfigureOptions)?;
        if let Some(session) = self.session.as_mut() {
            session.set_enable_ai(enabled);
        }
        if let Err(e) = self.gateway.set_enable_ai(&session_id, enabled).await {
            warn!("Unable to notify the backend that AI is {enabled}: {e}");
        }
        Ok(())
    }

    /// Leaves the options step and asks the backend to process the uploads. The move to the
    /// processing step happens regardless of the backend's answer, which is returned.
    pub async fn advance_from_config(&mut self) -> Result<ProcessingStatus> {
        self.require(WizardStep::ConfigureOptions)?;
        self.progress.last_error = None;
        self.progress.last_notice = None;
        self.advance();
        self.poll_processing().await
    }

    /// Asks the backend whether processing has finished. `Completed` moves the wizard to the last
    /// step; `Pending` and failures leave it where it is.
    pub async fn poll_processing(&mut self) -> Result<ProcessingStatus> {
        let session_id = self.require(WizardStep::Processing)?;

        self.progress.is_busy = true;
        let result = self.gateway.trigger_processing(&session_id).await;
        match result {
            Ok(ProcessingStatus::Completed) => {
                self.complete_step(Ok(()), PROCESSING_COMPLETE)?;
                Ok(ProcessingStatus::Completed)
            }
            Ok(ProcessingStatus::Pending) => {
                debug!("Processing of session {session_id} is still pending");
                self.progress.is_busy = false;
                Ok(ProcessingStatus::Pending)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Moves back one step. From the first step this leaves the wizard and drops the session.
    pub fn go_back(&mut self) -> Result<Navigation> {
        self.progress.is_busy = false;
        if let Some(previous) = self.progress.step.previous() {
            self.clear_messages();
            self.progress.step = previous;
            info!("Moved back to step {} ({})", previous.index(), previous.title());
            return Ok(Navigation::Step(previous));
        }
        match self.session.take() {
            Some(session) => {
                info!("Leaving the wizard, dropping session {}", session.session_id());
                self.progress = WizardProgress::default();
                Ok(Navigation::Exited)
            }
            None => Err(self.fail(Error::new(
                ErrorType::InvalidState,
                "There is nothing to go back to",
            ))),
        }
    }

    /// Hands the session over to the transaction editor. Without a session the editor reports
    /// `MissingSession` for everything that needs one.
    pub fn into_editor(self) -> Editor {
        Editor::new(self.gateway, self.session.map(|s| s.session_id().clone()))
    }

    /// Checks that there is a session and that the wizard is on `step`.
    fn require(&mut self, step: WizardStep) -> Result<SessionId> {
        let Some(session_id) = self.session.as_ref().map(|s| s.session_id().clone()) else {
            return Err(self.fail(Error::new(
                ErrorType::MissingSession,
                "There is no active session, create one first",
            )));
        };
        if self.progress.step != step {
            let current = self.progress.step;
            return Err(self.fail(Error::new(
                ErrorType::InvalidState,
                format!(
                    "This action belongs to step {} ({}) but the wizard is on step {} ({})",
                    step.index(),
                    step.title(),
                    current.index(),
                    current.title()
                ),
            )));
        }
        Ok(session_id)
    }

    /// Records the outcome of a gateway-backed step action and advances on success.
    fn complete_step(&mut self, result: Result<()>, notice: &str) -> Result<()> {
        match result {
            Ok(()) => {
                self.progress.is_busy = false;
                self.progress.last_error = None;
                self.progress.last_notice = Some(notice.to_string());
                self.advance();
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.progress.step.next() {
            self.progress.step = next;
            info!("Advanced to step {} ({})", next.index(), next.title());
        }
    }

    fn clear_messages(&mut self) {
        self.progress.last_error = None;
        self.progress.last_notice = None;
    }

    /// Records `e` as the last error and gives it back.
    fn fail(&mut self, e: Error) -> Error {
        debug!("Wizard action failed on step {}: {e}", self.progress.step);
        self.progress.is_busy = false;
        self.progress.last_error = Some(e.to_string());
        self.progress.last_notice = None;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Action, TestGateway};
    use crate::model::UploadFile;
    use crate::test::TestEnv;

    async fn wizard_at_step(env: &TestEnv, step: WizardStep) -> Wizard {
        let mut wizard = env.wizard();
        wizard.create_session("earthwalker42").await.unwrap();
        while wizard.step() < step {
            match wizard.step() {
                WizardStep::UploadStatement => {
                    wizard.submit_statement(StatementSource::Sample).await.unwrap()
                }
                WizardStep::UploadTagMapping => wizard.skip_tag_mapping().unwrap(),
                WizardStep::ConfigureOptions => {
                    wizard.advance_from_config().await.unwrap();
                }
                WizardStep::Processing => {
                    wizard.poll_processing().await.unwrap();
                }
                WizardStep::Complete => break,
            }
        }
        wizard
    }

    #[test]
    fn test_step_order() {
        let mut step = WizardStep::default();
        let mut seen = vec![step.index()];
        while let Some(next) = step.next() {
            assert_eq!(next.previous(), Some(step));
            step = next;
            seen.push(step.index());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(WizardStep::ConfigureOptions.to_string(), "configure_options");
    }

    #[tokio::test]
    async fn test_happy_path_with_samples() {
        let env = TestEnv::new().await;
        let mut wizard = env.wizard();

        let session_id = wizard.create_session("earthwalker42").await.unwrap();
        assert_eq!(wizard.step(), WizardStep::UploadStatement);
        assert_eq!(wizard.session().unwrap().username(), "earthwalker42");

        wizard.submit_statement(StatementSource::Sample).await.unwrap();
        assert_eq!(wizard.step().index(), 1);
        assert_eq!(
            wizard.progress().last_notice(),
            Some("Sample data loaded successfully!")
        );

        wizard
            .submit_tag_mapping(TagMappingSource::Sample)
            .await
            .unwrap();
        assert_eq!(wizard.step().index(), 2);
        assert_eq!(
            wizard.progress().last_notice(),
            Some("Sample tag mapping loaded!")
        );

        wizard.set_enable_ai(true).await.unwrap();
        assert!(wizard.session().unwrap().enable_ai());
        assert_eq!(wizard.step().index(), 2);
        assert_eq!(env.gateway().enable_ai(&session_id).await, Some(true));

        let status = wizard.advance_from_config().await.unwrap();
        assert_eq!(status, ProcessingStatus::Completed);
        assert_eq!(wizard.step().index(), 4);
        assert_eq!(wizard.progress().last_notice(), Some("Processing complete!"));
        assert!(wizard.progress().last_error().is_none());
        assert!(!wizard.progress().is_busy());
    }

    #[tokio::test]
    async fn test_processing_waits_for_confirmation() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::ConfigureOptions).await;
        env.gateway().set_pending_polls(2).await;

        assert_eq!(
            wizard.advance_from_config().await.unwrap(),
            ProcessingStatus::Pending
        );
        assert_eq!(wizard.step(), WizardStep::Processing);
        assert_eq!(
            wizard.poll_processing().await.unwrap(),
            ProcessingStatus::Pending
        );
        assert_eq!(wizard.step(), WizardStep::Processing);

        env.gateway()
            .fail_next(Action::TriggerProcessing, ErrorType::Transport)
            .await;
        let err = wizard.poll_processing().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Transport);
        assert_eq!(wizard.step(), WizardStep::Processing);
        assert!(wizard.progress().last_error().is_some());

        assert_eq!(
            wizard.poll_processing().await.unwrap(),
            ProcessingStatus::Completed
        );
        assert_eq!(wizard.step(), WizardStep::Complete);
        assert!(wizard.progress().last_error().is_none());
        assert_eq!(env.gateway().call_count(Action::TriggerProcessing).await, 4);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let env = TestEnv::new().await;
        env.gateway().insert_session("earthwalker42", Vec::new()).await;
        let mut wizard = env.wizard();
        let err = wizard.create_session("  earthwalker42 ").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::DuplicateUsername);
        assert!(wizard.session().is_none());
        assert!(wizard.progress().last_error().unwrap().contains("already taken"));
        assert_eq!(env.gateway().call_count(Action::CreateSession).await, 0);
    }

    #[tokio::test]
    async fn test_blank_username() {
        let env = TestEnv::new().await;
        let mut wizard = env.wizard();
        let err = wizard.create_session("   ").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert!(env.gateway().calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_session_short_circuits() {
        let env = TestEnv::new().await;
        let mut wizard = env.wizard();
        let err = wizard
            .submit_statement(StatementSource::Sample)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MissingSession);
        assert_eq!(
            wizard.progress().last_error(),
            Some("There is no active session, create one first")
        );
        let err = wizard
            .submit_tag_mapping(TagMappingSource::Sample)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MissingSession);
        let err = wizard.skip_tag_mapping().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MissingSession);
        let err = wizard.set_enable_ai(true).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MissingSession);
        let err = wizard.advance_from_config().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MissingSession);
        let err = wizard.poll_processing().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MissingSession);
        assert!(env.gateway().calls().await.is_empty());
        assert_eq!(wizard.step(), WizardStep::UploadStatement);
    }

    #[tokio::test]
    async fn test_wrong_step_is_rejected() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::ConfigureOptions).await;
        let err = wizard
            .submit_statement(StatementSource::Sample)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidState);
        assert_eq!(wizard.step(), WizardStep::ConfigureOptions);
        assert!(wizard.skip_tag_mapping().is_err());
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_step() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::UploadStatement).await;
        env.gateway()
            .fail_next(Action::UploadStatement, ErrorType::Transport)
            .await;
        let err = wizard
            .submit_statement(StatementSource::Sample)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Transport);
        assert_eq!(wizard.step(), WizardStep::UploadStatement);
        assert!(wizard.progress().last_notice().is_none());
        assert!(!wizard.progress().is_busy());

        // No automatic retry, the user tries again.
        wizard.submit_statement(StatementSource::Sample).await.unwrap();
        assert_eq!(wizard.step(), WizardStep::UploadTagMapping);
        assert!(wizard.progress().last_error().is_none());
        assert_eq!(env.gateway().call_count(Action::UploadStatement).await, 2);
    }

    #[tokio::test]
    async fn test_invalid_file_never_reaches_gateway() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::UploadStatement).await;
        let file = UploadFile::new("statement.pdf", b"%PDF".to_vec());
        let err = wizard
            .submit_statement(StatementSource::File(file))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
        assert_eq!(env.gateway().call_count(Action::UploadStatement).await, 0);
    }

    #[tokio::test]
    async fn test_file_upload_notice() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::UploadStatement).await;
        let file = UploadFile::new(
            "jan.csv",
            b"Date,Narration,Product,Amount,Tag,Mode\n2024-01-02,UPI-SWIGGY,Swiggy,-349,,UPI\n"
                .to_vec(),
        );
        wizard
            .submit_statement(StatementSource::File(file))
            .await
            .unwrap();
        assert_eq!(
            wizard.progress().last_notice(),
            Some("File uploaded successfully!")
        );
    }

    #[tokio::test]
    async fn test_skip_keeps_notice() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::UploadTagMapping).await;
        let calls = env.gateway().calls().await.len();
        wizard.skip_tag_mapping().unwrap();
        assert_eq!(wizard.step(), WizardStep::ConfigureOptions);
        assert_eq!(
            wizard.progress().last_notice(),
            Some("Sample data loaded successfully!")
        );
        assert_eq!(env.gateway().calls().await.len(), calls);
    }

    #[tokio::test]
    async fn test_ai_notification_is_best_effort() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::ConfigureOptions).await;
        env.gateway()
            .fail_next(Action::SetEnableAi, ErrorType::Transport)
            .await;
        wizard.set_enable_ai(true).await.unwrap();
        assert!(wizard.session().unwrap().enable_ai());
        assert!(wizard.progress().last_error().is_none());
        assert_eq!(wizard.step(), WizardStep::ConfigureOptions);
    }

    #[tokio::test]
    async fn test_go_back_and_exit() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::ConfigureOptions).await;
        assert_eq!(
            wizard.go_back().unwrap(),
            Navigation::Step(WizardStep::UploadTagMapping)
        );
        assert!(wizard.progress().last_notice().is_none());
        assert_eq!(
            wizard.go_back().unwrap(),
            Navigation::Step(WizardStep::UploadStatement)
        );
        assert_eq!(wizard.go_back().unwrap(), Navigation::Exited);
        assert!(wizard.session().is_none());
        let err = wizard.go_back().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidState);
    }

    #[tokio::test]
    async fn test_new_session_resets_progress() {
        let env = TestEnv::new().await;
        let mut wizard = wizard_at_step(&env, WizardStep::ConfigureOptions).await;
        wizard.create_session("someone-else").await.unwrap();
        assert_eq!(wizard.step(), WizardStep::UploadStatement);
        assert!(wizard.progress().last_notice().is_none());
        assert_eq!(wizard.session().unwrap().username(), "someone-else");
    }

    #[tokio::test]
    async fn test_into_editor_keeps_session() {
        let env = TestEnv::new().await;
        let wizard = wizard_at_step(&env, WizardStep::Complete).await;
        let session_id = wizard.session().unwrap().session_id().clone();
        let mut editor = wizard.into_editor();
        editor.load_transactions().await.unwrap();
        assert_eq!(
            editor.transactions().len(),
            env.gateway().transactions(&session_id).await.len()
        );
    }

    #[tokio::test]
    async fn test_into_editor_without_session() {
        let mut editor = Wizard::new(Box::new(TestGateway::new())).into_editor();
        let err = editor.load_transactions().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::MissingSession);
    }
}
