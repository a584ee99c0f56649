//! The boundary to the expense backend. Everything the wizard and the editor need from the server
//! goes through the `Gateway` trait so that an in-memory implementation can stand in for it.

mod http_gateway;
mod test_gateway;
mod wire;

use crate::model::{
    ProcessingStatus, ProductUpdate, SessionId, StatementSource, TagMappingSource, TagUpdate,
    Transaction,
};
use crate::{Config, Result};
use serde::{Deserialize, Serialize};

pub use test_gateway::{Action, TestGateway};

use http_gateway::HttpGateway;
use test_gateway::TEST_GATEWAY_JSON;

/// The environment variable that switches the app to `Mode::Test`.
pub const TEST_MODE_ENV: &str = "EXPENSE_NINJA_IN_TEST_MODE";

/// The operations offered by the expense backend.
///
/// Every method except the two username operations requires the `SessionId` issued by
/// `create_session`. Implementations classify failures as `Validation`, `DuplicateUsername` or
/// `Transport`.
#[async_trait::async_trait]
pub trait Gateway {
    /// Creates a session for `username` and returns its id.
    async fn create_session(&mut self, username: &str) -> Result<SessionId>;

    /// Returns `true` if `username` is already taken.
    async fn username_exists(&mut self, username: &str) -> Result<bool>;

    /// Uploads a bank statement, or asks the backend to load its sample statement.
    async fn upload_statement(
        &mut self,
        session_id: &SessionId,
        source: &StatementSource,
        enable_ai: bool,
    ) -> Result<()>;

    /// Uploads a product-to-tag mapping, or asks the backend to load its sample mapping.
    async fn upload_tag_mapping(
        &mut self,
        session_id: &SessionId,
        source: &TagMappingSource,
    ) -> Result<()>;

    /// Tells the backend whether AI categorization should be used.
    async fn set_enable_ai(&mut self, session_id: &SessionId, enabled: bool) -> Result<()>;

    /// Asks the backend to process the uploaded data and reports whether it is done.
    async fn trigger_processing(&mut self, session_id: &SessionId) -> Result<ProcessingStatus>;

    /// Fetches every transaction of the session, in the backend's order.
    async fn list_transactions(&mut self, session_id: &SessionId) -> Result<Vec<Transaction>>;

    async fn update_tag(&mut self, session_id: &SessionId, update: &TagUpdate) -> Result<()>;

    async fn update_product(&mut self, session_id: &SessionId, update: &ProductUpdate)
        -> Result<()>;
}

/// Whether the app talks to a real backend or to the in-memory `TestGateway`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Http,
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Test` when `EXPENSE_NINJA_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::Http`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Http,
        }
    }
}

/// Creates the gateway for `mode`. In `Mode::Test` the in-memory backend is persisted inside
/// `$NINJA_HOME`.
pub async fn gateway(config: &Config, mode: Mode) -> Result<Box<dyn Gateway + Send>> {
    match mode {
        Mode::Http => Ok(Box::new(HttpGateway::new(config)?)),
        Mode::Test => {
            let path = config.root().join(TEST_GATEWAY_JSON);
            Ok(Box::new(TestGateway::persistent(path).await?))
        }
    }
}
