//! Types that represent the core data model, such as `Transaction` and `Session`.
mod amount;
mod session;
mod transaction;
mod upload;

pub use amount::{Amount, AmountError};
pub use session::{ProcessingStatus, Session, SessionId};
pub use transaction::{Transaction, TransactionColumn, TransactionId};
pub use upload::{
    StatementSource, TagMappingSource, UploadFile, MAX_STATEMENT_BYTES, MAX_TAG_MAPPING_BYTES,
};

pub(crate) use transaction::parse_date;

/// A request to change the tag of a transaction. When `apply_to_all` is set, the backend applies
/// the tag to every transaction in the session that shares `product`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TagUpdate {
    pub transaction_id: TransactionId,
    pub new_tag: String,
    pub apply_to_all: bool,
    /// The product of the edited row, used by the backend to find the rows to cascade to.
    pub product: String,
}

/// A request to rename the product of a transaction. When `replace_all` is set, the backend
/// renames every transaction in the session whose product equals `old_product`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProductUpdate {
    pub transaction_id: TransactionId,
    pub old_product: String,
    pub new_product: String,
    pub replace_all: bool,
    /// The tag of the edited row, sent along as context.
    pub tag: String,
}
