//! Implements the `Gateway` trait with an in-memory backend for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without an expense backend. In that mode the backend state is kept in a JSON
//! file inside `$NINJA_HOME` so that it survives between invocations of the CLI.

use crate::api::Gateway;
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{
    parse_date, Amount, ProcessingStatus, ProductUpdate, SessionId, StatementSource,
    TagMappingSource, TagUpdate, Transaction, TransactionId,
};
use crate::{utils, Error, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

/// The name of the file that holds the test backend's state in `Mode::Test`.
pub(crate) const TEST_GATEWAY_JSON: &str = "test_gateway.json";

/// The gateway operations, used for call recording and fault injection.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateSession,
    UsernameExists,
    UploadStatement,
    UploadTagMapping,
    SetEnableAi,
    TriggerProcessing,
    ListTransactions,
    UpdateTag,
    UpdateProduct,
}

serde_plain::derive_display_from_serialize!(Action);
serde_plain::derive_fromstr_from_deserialize!(Action);

/// An implementation of the `Gateway` trait that does not use the network. Clones share the same
/// backend so a test can keep a handle while the wizard or editor owns a boxed copy.
#[derive(Debug, Clone, Default)]
pub struct TestGateway {
    state: Arc<Mutex<TestBackend>>,
    store: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct TestBackend {
    sessions: BTreeMap<SessionId, TestSession>,
    /// How many more processing triggers answer `pending` before one answers `completed`.
    #[serde(default)]
    pending_polls: u32,
    #[serde(skip)]
    calls: Vec<Action>,
    #[serde(skip)]
    faults: VecDeque<(Action, ErrorType)>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct TestSession {
    username: String,
    enable_ai: bool,
    /// Lower-cased product to tag.
    tag_mapping: BTreeMap<String, String>,
    transactions: Vec<Transaction>,
}

impl TestGateway {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the backend persisted at `path`, or an empty one if the file does not exist yet.
    /// Every successful call writes the state back to `path`.
    pub async fn persistent(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let backend = if path.is_file() {
            utils::deserialize::<TestBackend>(&path)
                .await
                .context("Unable to load the test gateway state")
                .pub_result(ErrorType::Io)?
        } else {
            TestBackend::default()
        };
        Ok(Self {
            state: Arc::new(Mutex::new(backend)),
            store: Some(path),
        })
    }

    /// Makes the next call of `action` fail with `error_type`. Faults queue up in order.
    pub async fn fail_next(&self, action: Action, error_type: ErrorType) {
        self.state
            .lock()
            .await
            .faults
            .push_back((action, error_type));
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<Action> {
        self.state.lock().await.calls.clone()
    }

    pub async fn call_count(&self, action: Action) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|&&a| a == action)
            .count()
    }

    /// The next `n` processing triggers answer `pending`.
    pub async fn set_pending_polls(&self, n: u32) {
        self.state.lock().await.pending_polls = n;
    }

    /// Seeds a session that already has processed `transactions`, bypassing the wizard.
    pub async fn insert_session(
        &self,
        username: &str,
        transactions: Vec<Transaction>,
    ) -> SessionId {
        let session_id = new_session_id();
        let session = TestSession {
            username: username.to_string(),
            transactions,
            ..TestSession::default()
        };
        self.state
            .lock()
            .await
            .sessions
            .insert(session_id.clone(), session);
        session_id
    }

    /// The backend's current transactions for `session_id`.
    pub async fn transactions(&self, session_id: &SessionId) -> Vec<Transaction> {
        self.state
            .lock()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.transactions.clone())
            .unwrap_or_default()
    }

    /// The AI flag the backend has recorded for `session_id`.
    pub async fn enable_ai(&self, session_id: &SessionId) -> Option<bool> {
        self.state
            .lock()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.enable_ai)
    }

    /// Records the call, runs `f` against the backend and persists the result.
    async fn call<T, F>(&self, action: Action, f: F) -> Result<T>
    where
        F: FnOnce(&mut TestBackend) -> Result<T>,
    {
        let mut backend = self.state.lock().await;
        trace!("TestGateway {action}");
        backend.calls.push(action);
        if let Some(pos) = backend.faults.iter().position(|(a, _)| *a == action) {
            if let Some((_, error_type)) = backend.faults.remove(pos) {
                debug!("Injecting a {error_type} failure into {action}");
                return Err(Error::new(error_type, format!("Injected failure of {action}")));
            }
        }
        let value = f(&mut *backend)?;
        if let Some(path) = &self.store {
            save(path, &*backend).await.pub_result(ErrorType::Io)?;
        }
        Ok(value)
    }
}

async fn save(path: &Path, backend: &TestBackend) -> Res<()> {
    let data = serde_json::to_string_pretty(backend).context("Unable to serialize test state")?;
    utils::write(path, data).await
}

fn new_session_id() -> SessionId {
    SessionId::new(Uuid::new_v4().simple().to_string())
}

impl TestBackend {
    fn session_mut(&mut self, session_id: &SessionId) -> Result<&mut TestSession> {
        self.sessions.get_mut(session_id).ok_or_else(|| {
            Error::new(
                ErrorType::Validation,
                format!("Invalid session '{session_id}'"),
            )
        })
    }

    fn username_exists(&self, username: &str) -> bool {
        self.sessions.values().any(|s| s.username == username)
    }
}

impl TestSession {
    fn transaction_mut(&mut self, id: &TransactionId) -> Result<&mut Transaction> {
        self.transactions
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or_else(|| {
                Error::new(
                    ErrorType::Validation,
                    format!("Transaction '{id}' not found"),
                )
            })
    }

    /// Fills in empty tags from the tag mapping.
    fn apply_tag_mapping(&mut self) {
        for transaction in self.transactions.iter_mut() {
            if !transaction.tag.is_empty() {
                continue;
            }
            if let Some(tag) = self.tag_mapping.get(&transaction.product.to_lowercase()) {
                transaction.tag = tag.clone();
            }
        }
    }
}

#[async_trait::async_trait]
impl Gateway for TestGateway {
    async fn create_session(&mut self, username: &str) -> Result<SessionId> {
        let username = username.trim().to_string();
        self.call(Action::CreateSession, move |backend| {
            if username.is_empty() {
                return Err(Error::new(ErrorType::Validation, "Username is required"));
            }
            if backend.username_exists(&username) {
                return Err(Error::new(
                    ErrorType::DuplicateUsername,
                    format!("Username '{username}' already exists"),
                ));
            }
            let session_id = new_session_id();
            backend.sessions.insert(
                session_id.clone(),
                TestSession {
                    username,
                    ..TestSession::default()
                },
            );
            Ok(session_id)
        })
        .await
    }

    async fn username_exists(&mut self, username: &str) -> Result<bool> {
        let username = username.trim().to_string();
        self.call(Action::UsernameExists, move |backend| {
            Ok(backend.username_exists(&username))
        })
        .await
    }

    async fn upload_statement(
        &mut self,
        session_id: &SessionId,
        source: &StatementSource,
        enable_ai: bool,
    ) -> Result<()> {
        let transactions = match source {
            StatementSource::File(file) => parse_statement(file.contents()),
            StatementSource::Sample => parse_statement(SAMPLE_STATEMENT.as_bytes()),
        };
        self.call(Action::UploadStatement, move |backend| {
            let session = backend.session_mut(session_id)?;
            session.transactions = transactions
                .context("Unable to read the statement")
                .pub_result(ErrorType::Validation)?;
            session.enable_ai = enable_ai;
            Ok(())
        })
        .await
    }

    async fn upload_tag_mapping(
        &mut self,
        session_id: &SessionId,
        source: &TagMappingSource,
    ) -> Result<()> {
        let mapping = match source {
            TagMappingSource::File(file) => parse_tag_mapping(file.contents()),
            TagMappingSource::Sample => parse_tag_mapping(SAMPLE_TAG_MAPPING.as_bytes()),
        };
        self.call(Action::UploadTagMapping, move |backend| {
            let session = backend.session_mut(session_id)?;
            session.tag_mapping = mapping
                .context("Unable to read the tag mapping")
                .pub_result(ErrorType::Validation)?;
            Ok(())
        })
        .await
    }

    async fn set_enable_ai(&mut self, session_id: &SessionId, enabled: bool) -> Result<()> {
        self.call(Action::SetEnableAi, |backend| {
            backend.session_mut(session_id)?.enable_ai = enabled;
            Ok(())
        })
        .await
    }

    async fn trigger_processing(&mut self, session_id: &SessionId) -> Result<ProcessingStatus> {
        self.call(Action::TriggerProcessing, |backend| {
            backend.session_mut(session_id)?;
            if backend.pending_polls > 0 {
                backend.pending_polls -= 1;
                return Ok(ProcessingStatus::Pending);
            }
            let session = backend.session_mut(session_id)?;
            if session.transactions.is_empty() {
                return Err(Error::new(
                    ErrorType::Validation,
                    "No statement has been uploaded for this session",
                ));
            }
            session.apply_tag_mapping();
            Ok(ProcessingStatus::Completed)
        })
        .await
    }

    async fn list_transactions(&mut self, session_id: &SessionId) -> Result<Vec<Transaction>> {
        self.call(Action::ListTransactions, |backend| {
            Ok(backend.session_mut(session_id)?.transactions.clone())
        })
        .await
    }

    async fn update_tag(&mut self, session_id: &SessionId, update: &TagUpdate) -> Result<()> {
        self.call(Action::UpdateTag, |backend| {
            let session = backend.session_mut(session_id)?;
            session.transaction_mut(&update.transaction_id)?.tag = update.new_tag.clone();
            if update.apply_to_all {
                session
                    .transactions
                    .iter_mut()
                    .filter(|t| t.product == update.product)
                    .for_each(|t| t.tag = update.new_tag.clone());
            }
            Ok(())
        })
        .await
    }

    async fn update_product(
        &mut self,
        session_id: &SessionId,
        update: &ProductUpdate,
    ) -> Result<()> {
        self.call(Action::UpdateProduct, |backend| {
            let session = backend.session_mut(session_id)?;
            session.transaction_mut(&update.transaction_id)?.product =
                update.new_product.clone();
            if update.replace_all {
                session
                    .transactions
                    .iter_mut()
                    .filter(|t| t.product == update.old_product)
                    .for_each(|t| t.product = update.new_product.clone());
            }
            Ok(())
        })
        .await
    }
}

// Date,Narration,Product,Amount,Tag,Mode
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatementRow {
    date: String,
    narration: String,
    product: String,
    amount: String,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    mode: String,
}

/// Reads a statement CSV. Transaction ids are the 1-based row numbers.
fn parse_statement(data: &[u8]) -> Res<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(data));
    let mut transactions = Vec::new();
    for (i, result) in rdr.deserialize::<StatementRow>().enumerate() {
        let row_number = i + 1;
        let row = result.with_context(|| format!("Bad statement row {row_number}"))?;
        let Some(date) = parse_date(&row.date) else {
            bail!("Bad date '{}' in statement row {row_number}", row.date);
        };
        let amount = Amount::from_str(&row.amount)
            .with_context(|| format!("Bad amount '{}' in statement row {row_number}", row.amount))?;
        transactions.push(Transaction::new(
            TransactionId::new(row_number.to_string()),
            date,
            row.narration,
            row.product,
            amount,
            row.tag,
            row.mode,
        ));
    }
    if transactions.is_empty() {
        bail!("The statement has no transactions");
    }
    Ok(transactions)
}

/// Reads a product,tag CSV into a map keyed by lower-cased product.
fn parse_tag_mapping(data: &[u8]) -> Res<BTreeMap<String, String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(data));
    let headers = rdr.headers().context("Missing header row")?.clone();
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (Some(product_ix), Some(tag_ix)) = (position("product"), position("tag")) else {
        bail!("The tag mapping must have 'product' and 'tag' columns");
    };
    let mut mapping = BTreeMap::new();
    for result in rdr.records() {
        let record = result?;
        let product = record.get(product_ix).unwrap_or_default();
        let tag = record.get(tag_ix).unwrap_or_default();
        if !product.is_empty() && !tag.is_empty() {
            mapping.insert(product.to_lowercase(), tag.to_string());
        }
    }
    Ok(mapping)
}

/// Seed statement data.
const SAMPLE_STATEMENT: &str = r##"Date,Narration,Product,Amount,Tag,Mode
2024-01-02,UPI-SWIGGY-swiggy@icici-Order 58231,Swiggy,-349.00,,UPI
2024-01-03,NEFT-SALARY-ACME TECHNOLOGIES PVT LTD,Acme Technologies,"85,000.00",Income,NEFT
2024-01-05,UPI-AMAZON PRIME-amazonprime@apl,Amazon Prime,-179.00,,UPI
2024-01-07,POS 4521XXXXXXXX1234 BIG BAZAAR,Big Bazaar,"-2,145.60",,Debit Card
2024-01-09,UPI-UBER INDIA-uber@axisbank,Uber,-236.00,,UPI
2024-01-12,ACH D-HDFC MF SIP,HDFC Mutual Fund,"-5,000.00",,ACH
2024-01-15,UPI-ZOMATO-zomato@hdfcbank,Zomato,-512.00,,UPI
2024-01-18,POS 4521XXXXXXXX1234 SHELL PETROL,Shell,"-1,800.00",,Debit Card
2024-01-21,UPI-NETFLIX-netflix@hdfcbank,Netflix,-649.00,,UPI
2024-01-24,UPI-BESCOM-bescom@sbi,BESCOM,"-1,230.00",,UPI
2024-02-05,UPI-AMAZON PRIME-amazonprime@apl,Amazon Prime,-179.00,,UPI
2024-02-06,ATM WDL-SBI ATM MG ROAD,Cash Withdrawal,"-3,000.00",,ATM
"##;

/// Seed tag mapping data.
const SAMPLE_TAG_MAPPING: &str = r##"product,tag
Swiggy,Food
Zomato,Food
Amazon Prime,Subscription
Netflix,Subscription
Big Bazaar,Groceries
Uber,Transport
Shell,Fuel
BESCOM,Utilities
HDFC Mutual Fund,Investment
Cash Withdrawal,Cash
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UploadFile;
    use tempfile::TempDir;

    #[test]
    fn test_sample_statement_parses() {
        let transactions = parse_statement(SAMPLE_STATEMENT.as_bytes()).unwrap();
        assert_eq!(transactions.len(), 12);
        assert_eq!(transactions[0].id().as_str(), "1");
        assert_eq!(transactions[1].amount().plain(), "85000");
        let prime = transactions
            .iter()
            .filter(|t| t.product() == "Amazon Prime")
            .count();
        assert_eq!(prime, 2);
    }

    #[test]
    fn test_statement_with_wrong_columns() {
        assert!(parse_statement(b"when,what\n2024-01-01,x\n").is_err());
        assert!(parse_statement(b"Date,Narration,Product,Amount\n").is_err());
    }

    #[test]
    fn test_tag_mapping_is_case_insensitive() {
        let mapping = parse_tag_mapping(b"Tag,Product\nFood,SWIGGY\n").unwrap();
        assert_eq!(mapping.get("swiggy").map(String::as_str), Some("Food"));
        assert!(parse_tag_mapping(b"merchant,category\n").is_err());
    }

    #[tokio::test]
    async fn test_processing_applies_tag_mapping() {
        let mut gateway = TestGateway::new();
        let session_id = gateway.create_session("earthwalker42").await.unwrap();
        gateway
            .upload_statement(&session_id, &StatementSource::Sample, false)
            .await
            .unwrap();
        gateway
            .upload_tag_mapping(&session_id, &TagMappingSource::Sample)
            .await
            .unwrap();
        gateway.set_pending_polls(1).await;
        assert_eq!(
            gateway.trigger_processing(&session_id).await.unwrap(),
            ProcessingStatus::Pending
        );
        assert_eq!(
            gateway.trigger_processing(&session_id).await.unwrap(),
            ProcessingStatus::Completed
        );
        let transactions = gateway.list_transactions(&session_id).await.unwrap();
        assert!(transactions
            .iter()
            .filter(|t| t.product() == "Amazon Prime")
            .all(|t| t.tag() == "Subscription"));
        // Tags from the statement win over the mapping.
        assert_eq!(transactions[1].tag(), "Income");
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let mut gateway = TestGateway::new();
        gateway.create_session("earthwalker42").await.unwrap();
        assert!(gateway.username_exists("earthwalker42").await.unwrap());
        let err = gateway.create_session(" earthwalker42 ").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::DuplicateUsername);
    }

    #[tokio::test]
    async fn test_fault_injection_and_calls() {
        let mut gateway = TestGateway::new();
        gateway
            .fail_next(Action::UsernameExists, ErrorType::Transport)
            .await;
        let err = gateway.username_exists("x").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Transport);
        assert!(!gateway.username_exists("x").await.unwrap());
        assert_eq!(gateway.call_count(Action::UsernameExists).await, 2);
        assert_eq!(
            gateway.calls().await,
            vec![Action::UsernameExists, Action::UsernameExists]
        );
    }

    #[tokio::test]
    async fn test_bad_upload_is_validation() {
        let mut gateway = TestGateway::new();
        let session_id = gateway.create_session("someone").await.unwrap();
        let file = UploadFile::new("bad.csv", b"a,b\n1,2\n".to_vec());
        let err = gateway
            .upload_statement(&session_id, &StatementSource::File(file), false)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);

        let err = gateway
            .list_transactions(&SessionId::new("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Validation);
    }

    #[tokio::test]
    async fn test_persistent_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TEST_GATEWAY_JSON);
        let mut first = TestGateway::persistent(&path).await.unwrap();
        let session_id = first.create_session("earthwalker42").await.unwrap();
        first
            .upload_statement(&session_id, &StatementSource::Sample, true)
            .await
            .unwrap();

        let mut second = TestGateway::persistent(&path).await.unwrap();
        assert_eq!(second.list_transactions(&session_id).await.unwrap().len(), 12);
        assert_eq!(second.enable_ai(&session_id).await, Some(true));
        assert!(second.username_exists("earthwalker42").await.unwrap());
    }
}
