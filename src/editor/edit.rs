use crate::model::TransactionId;
use serde::{Deserialize, Serialize};

/// The two user-editable fields of a transaction.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditTarget {
    Product,
    Tag,
}

serde_plain::derive_display_from_serialize!(EditTarget);
serde_plain::derive_fromstr_from_deserialize!(EditTarget);

/// A value typed into one field of the row under edit. Once a field has been touched, the other
/// one is read-only until the edit is saved or cancelled.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedEdit {
    Product(String),
    Tag(String),
}

impl StagedEdit {
    pub fn new(target: EditTarget, value: impl Into<String>) -> Self {
        match target {
            EditTarget::Product => StagedEdit::Product(value.into()),
            EditTarget::Tag => StagedEdit::Tag(value.into()),
        }
    }

    pub fn target(&self) -> EditTarget {
        match self {
            StagedEdit::Product(_) => EditTarget::Product,
            StagedEdit::Tag(_) => EditTarget::Tag,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            StagedEdit::Product(value) | StagedEdit::Tag(value) => value,
        }
    }
}

/// A product rename waiting for the user to say whether it applies to one row or to every row
/// with the same product.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PendingCascade {
    pub transaction_id: TransactionId,
    pub old_product: String,
    pub new_product: String,
    /// The tag of the row, sent along as context.
    pub tag: String,
}

/// How far a product rename reaches.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeScope {
    /// Only the edited transaction.
    One,
    /// Every transaction whose product equals the old product.
    All,
}

serde_plain::derive_display_from_serialize!(CascadeScope);
serde_plain::derive_fromstr_from_deserialize!(CascadeScope);

/// The edit lifecycle of the working set. At most one row is under edit at a time.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    #[default]
    Idle,
    Editing {
        transaction_id: TransactionId,
        staged: Option<StagedEdit>,
    },
    AwaitingScope(PendingCascade),
}

impl EditState {
    /// The row under edit, if any.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match self {
            EditState::Idle => None,
            EditState::Editing { transaction_id, .. } => Some(transaction_id),
            EditState::AwaitingScope(pending) => Some(&pending.transaction_id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, EditState::Idle)
    }

    /// The field the open edit is locked to.
    pub fn locked_target(&self) -> Option<EditTarget> {
        match self {
            EditState::Idle => None,
            EditState::Editing { staged, .. } => staged.as_ref().map(StagedEdit::target),
            EditState::AwaitingScope(_) => Some(EditTarget::Product),
        }
    }
}

/// An open edit that was thrown away because another row was opened for editing.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DiscardedEdit {
    pub transaction_id: TransactionId,
    pub staged: Option<StagedEdit>,
}

/// What `Editor::save` did.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SaveOutcome {
    /// The change was written and the working set reloaded.
    Committed,
    /// A product rename needs a scope decision, see `Editor::resolve_cascade`.
    AwaitingScope(PendingCascade),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_edit_target() {
        let staged = StagedEdit::new(EditTarget::Tag, "Food");
        assert_eq!(staged.target(), EditTarget::Tag);
        assert_eq!(staged.value(), "Food");
    }

    #[test]
    fn test_locked_target() {
        let editing = EditState::Editing {
            transaction_id: TransactionId::new("1"),
            staged: None,
        };
        assert_eq!(editing.locked_target(), None);
        assert_eq!(editing.transaction_id().map(|id| id.as_str()), Some("1"));

        let awaiting = EditState::AwaitingScope(PendingCascade {
            transaction_id: TransactionId::new("2"),
            old_product: "Amazon Prime".to_string(),
            new_product: "Streaming".to_string(),
            tag: String::new(),
        });
        assert_eq!(awaiting.locked_target(), Some(EditTarget::Product));
        assert!(EditState::default().is_idle());
    }

    #[test]
    fn test_scope_names() {
        assert_eq!("all".parse::<CascadeScope>().unwrap(), CascadeScope::All);
        assert_eq!(CascadeScope::One.to_string(), "one");
    }
}
