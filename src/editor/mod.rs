//! The transaction editor: the queryable, editable working set of one session.
//!
//! The working set is always a snapshot confirmed by the backend. Edits are never applied locally;
//! every successful write is followed by a full reload before the edit closes.

mod edit;
mod query;

pub use edit::{
    CascadeScope, DiscardedEdit, EditState, EditTarget, PendingCascade, SaveOutcome, StagedEdit,
};
pub use query::{query, Query, Sort, SortDirection};

use crate::api::Gateway;
use crate::error::ErrorType;
use crate::model::{
    ProductUpdate, SessionId, TagUpdate, Transaction, TransactionColumn, TransactionId,
};
use crate::{Error, Result};
use tracing::{debug, info, warn};

pub struct Editor {
    gateway: Box<dyn Gateway + Send>,
    session_id: Option<SessionId>,
    transactions: Vec<Transaction>,
    query: Query,
    edit: EditState,
    error: Option<String>,
}

impl Editor {
    /// Creates an editor for `session_id` with an empty working set. Call `load_transactions` to
    /// fill it.
    pub fn new(gateway: Box<dyn Gateway + Send>, session_id: Option<SessionId>) -> Self {
        Self {
            gateway,
            session_id,
            transactions: Vec::new(),
            query: Query::default(),
            edit: EditState::Idle,
            error: None,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// The last loaded working set, in the backend's order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The working set as filtered and sorted by the current query.
    pub fn view(&self) -> Vec<&Transaction> {
        query(&self.transactions, &self.query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    /// The message of the last failure, cleared by the next success.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.query.set_search(term);
    }

    pub fn set_filter(&mut self, column: TransactionColumn, value: impl Into<String>) {
        self.query.set_filter(column, value);
    }

    pub fn clear_filter(&mut self, column: TransactionColumn) {
        self.query.clear_filter(column);
    }

    pub fn toggle_sort(&mut self, column: TransactionColumn) {
        self.query.toggle_sort(column);
    }

    pub fn set_sort(&mut self, sort: Sort) {
        self.query.set_sort(sort);
    }

    pub fn clear_sort(&mut self) {
        self.query.clear_sort();
    }

    /// Replaces the working set with the backend's current transactions. On failure the previous
    /// working set is kept.
    pub async fn load_transactions(&mut self) -> Result<()> {
        let session_id = self.require_session()?;
        match self.gateway.list_transactions(&session_id).await {
            Ok(transactions) => {
                debug!(
                    "Loaded {} transactions for session {session_id}",
                    transactions.len()
                );
                self.transactions = transactions;
                self.error = None;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Opens `transaction_id` for editing. An edit that is open on another row is discarded and
    /// returned. A product rename that awaits its scope decision is never discarded this way.
    pub fn begin_edit(&mut self, transaction_id: &TransactionId) -> Result<Option<DiscardedEdit>> {
        self.require_session()?;
        self.find(transaction_id)?;
        let discarded = match &self.edit {
            EditState::Idle => None,
            EditState::Editing {
                transaction_id: open,
                ..
            } if open == transaction_id => return Ok(None),
            EditState::Editing {
                transaction_id: open,
                staged,
            } => Some(DiscardedEdit {
                transaction_id: open.clone(),
                staged: staged.clone(),
            }),
            EditState::AwaitingScope(pending) => {
                let message = format!(
                    "The rename of '{}' to '{}' on transaction {} is waiting for a scope, \
                    resolve or cancel it first",
                    pending.old_product, pending.new_product, pending.transaction_id
                );
                return Err(self.fail(Error::new(ErrorType::ConflictDiscarded, message)));
            }
        };
        if let Some(discarded) = &discarded {
            warn!(
                "Discarding the open edit of transaction {} ({:?})",
                discarded.transaction_id, discarded.staged
            );
        }
        self.edit = EditState::Editing {
            transaction_id: transaction_id.clone(),
            staged: None,
        };
        Ok(discarded)
    }

    /// Stages `value` for `target` on the row under edit. The first field touched locks the edit
    /// to that field.
    pub fn stage_field_edit(&mut self, target: EditTarget, value: impl Into<String>) -> Result<()> {
        let locked = match &self.edit {
            EditState::Editing { staged, .. } => staged.as_ref().map(StagedEdit::target),
            _ => {
                return Err(self.fail(Error::new(
                    ErrorType::InvalidState,
                    "No transaction is open for editing",
                )))
            }
        };
        if let Some(locked) = locked.filter(|locked| *locked != target) {
            let message = format!(
                "The {locked} of this transaction is being edited, its {target} is read-only until \
                the edit is saved or cancelled"
            );
            return Err(self.fail(Error::new(ErrorType::InvalidState, message)));
        }
        if let EditState::Editing { staged, .. } = &mut self.edit {
            *staged = Some(StagedEdit::new(target, value));
        }
        Ok(())
    }

    /// Writes a new tag for `transaction_id`, and for every transaction with the same product when
    /// `apply_to_all` is set, then reloads. On a failed write the edit stays open.
    pub async fn commit_tag_edit(
        &mut self,
        transaction_id: &TransactionId,
        new_tag: &str,
        apply_to_all: bool,
    ) -> Result<()> {
        let session_id = self.require_session()?;
        self.require_editing(transaction_id, EditTarget::Tag)?;
        let update = TagUpdate {
            transaction_id: transaction_id.clone(),
            new_tag: new_tag.to_string(),
            apply_to_all,
            product: self.find(transaction_id)?.product().to_string(),
        };

        if let Err(e) = self.gateway.update_tag(&session_id, &update).await {
            return Err(self.fail(e));
        }
        info!(
            "Tagged transaction {transaction_id} as '{new_tag}'{}",
            if apply_to_all {
                format!(" along with every '{}' transaction", update.product)
            } else {
                String::new()
            }
        );
        self.edit = EditState::Idle;
        self.load_transactions().await
    }

    /// Stages a product rename. Nothing is written until `resolve_cascade` is called with a scope.
    pub fn commit_product_edit(
        &mut self,
        transaction_id: &TransactionId,
        new_product: &str,
    ) -> Result<PendingCascade> {
        self.require_session()?;
        self.require_editing(transaction_id, EditTarget::Product)?;
        let transaction = self.find(transaction_id)?;
        let pending = PendingCascade {
            transaction_id: transaction_id.clone(),
            old_product: transaction.product().to_string(),
            new_product: new_product.to_string(),
            tag: transaction.tag().to_string(),
        };
        debug!("Awaiting a scope for {pending:?}");
        self.edit = EditState::AwaitingScope(pending.clone());
        Ok(pending)
    }

    /// Writes the pending product rename with `scope`, then reloads. On a failed write the rename
    /// stays pending so that the scope can be chosen again.
    pub async fn resolve_cascade(&mut self, scope: CascadeScope) -> Result<()> {
        let session_id = self.require_session()?;
        let update = match &self.edit {
            EditState::AwaitingScope(pending) => ProductUpdate {
                transaction_id: pending.transaction_id.clone(),
                old_product: pending.old_product.clone(),
                new_product: pending.new_product.clone(),
                replace_all: scope == CascadeScope::All,
                tag: pending.tag.clone(),
            },
            _ => {
                return Err(self.fail(Error::new(
                    ErrorType::InvalidState,
                    "There is no product rename waiting for a scope",
                )))
            }
        };

        if let Err(e) = self.gateway.update_product(&session_id, &update).await {
            return Err(self.fail(e));
        }
        info!(
            "Renamed product '{}' to '{}' ({scope})",
            update.old_product, update.new_product
        );
        self.edit = EditState::Idle;
        self.load_transactions().await
    }

    /// Commits whatever is staged on the row under edit. A tag is written for that row only; a
    /// product rename moves on to the scope decision.
    pub async fn save(&mut self) -> Result<SaveOutcome> {
        self.require_session()?;
        let (transaction_id, staged) = match &self.edit {
            EditState::Editing {
                transaction_id,
                staged: Some(staged),
            } => (transaction_id.clone(), staged.clone()),
            EditState::AwaitingScope(_) => {
                return Err(self.fail(Error::new(
                    ErrorType::InvalidState,
                    "Choose whether the rename applies to one transaction or all of them",
                )))
            }
            _ => {
                return Err(self.fail(Error::new(
                    ErrorType::InvalidState,
                    "There is nothing to save",
                )))
            }
        };
        match staged {
            StagedEdit::Tag(tag) => {
                self.commit_tag_edit(&transaction_id, &tag, false).await?;
                Ok(SaveOutcome::Committed)
            }
            StagedEdit::Product(product) => {
                let pending = self.commit_product_edit(&transaction_id, &product)?;
                Ok(SaveOutcome::AwaitingScope(pending))
            }
        }
    }

    /// Drops the open edit, including a pending rename, without contacting the backend.
    pub fn cancel_edit(&mut self) {
        if !self.edit.is_idle() {
            debug!("Cancelled the edit {:?}", self.edit);
        }
        self.edit = EditState::Idle;
    }

    fn require_session(&mut self) -> Result<SessionId> {
        match &self.session_id {
            Some(session_id) => Ok(session_id.clone()),
            None => Err(self.fail(Error::new(
                ErrorType::MissingSession,
                "There is no session, open the editor from a session",
            ))),
        }
    }

    /// Checks that `transaction_id` is the row under edit and that `target` is editable on it.
    fn require_editing(&mut self, transaction_id: &TransactionId, target: EditTarget) -> Result<()> {
        let message = match &self.edit {
            EditState::Editing {
                transaction_id: open,
                staged,
            } if open == transaction_id => match staged {
                Some(staged) if staged.target() != target => format!(
                    "The {} of transaction {transaction_id} is being edited, not its {target}",
                    staged.target()
                ),
                _ => return Ok(()),
            },
            EditState::AwaitingScope(_) => {
                "A product rename is waiting for a scope decision".to_string()
            }
            _ => format!("Transaction {transaction_id} is not open for editing"),
        };
        Err(self.fail(Error::new(ErrorType::InvalidState, message)))
    }

    fn find(&mut self, transaction_id: &TransactionId) -> Result<&Transaction> {
        match self
            .transactions
            .iter()
            .position(|t| t.id() == transaction_id)
        {
            Some(ix) => Ok(&self.transactions[ix]),
            None => Err(self.fail(Error::new(
                ErrorType::InvalidState,
                format!("Transaction {transaction_id} is not in the working set"),
            ))),
        }
    }

    /// Records `e` in the error slot and gives it back.
    fn fail(&mut self, e: Error) -> Error {
        debug!("Editor operation failed: {e}");
        self.error = Some(e.to_string());
        e
    }
}
