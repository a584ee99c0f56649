//! Transaction list and edit command handlers.

use crate::api::{self, Gateway, Mode};
use crate::args::{SessionArgs, TransactionsArgs, UpdateProductArgs, UpdateTagArgs};
use crate::commands::Out;
use crate::editor::{CascadeScope, Editor, Sort, SortDirection};
use crate::error::ErrorType;
use crate::model::{Transaction, TransactionColumn, TransactionId};
use crate::{Config, Error, Result};

/// Lists the transactions of a session as a table, narrowed by the search term and column
/// filters and ordered by the sort column, if given.
///
/// # Returns
///
/// On success, returns an `Out` containing:
/// - A table of the matching transactions, or a note that none matched.
/// - The matching `Transaction` objects in display order.
///
/// # Errors
///
/// - `MissingSession` if no session id was given.
/// - `Transport` or `Validation` if the backend cannot list the session's transactions.
pub async fn transactions(
    config: &Config,
    mode: Mode,
    args: &TransactionsArgs,
) -> Result<Out<Vec<Transaction>>> {
    let editor = open_editor(api::gateway(config, mode).await?, args.session()).await?;
    list(editor, args)
}

/// Sets the tag of one transaction, or of every transaction sharing its product.
///
/// # Errors
///
/// - `MissingSession` if no session id was given.
/// - `InvalidState` if the transaction is not in the session.
/// - `Transport` or `Validation` if the backend rejects the change.
pub async fn update_tag(
    config: &Config,
    mode: Mode,
    args: &UpdateTagArgs,
) -> Result<Out<Vec<Transaction>>> {
    let editor = open_editor(api::gateway(config, mode).await?, args.session()).await?;
    tag(editor, args).await
}

/// Renames the product of one transaction, or of every transaction that has the same product.
///
/// # Errors
///
/// - `MissingSession` if no session id was given.
/// - `InvalidState` if the transaction is not in the session.
/// - `Transport` or `Validation` if the backend rejects the change.
pub async fn update_product(
    config: &Config,
    mode: Mode,
    args: &UpdateProductArgs,
) -> Result<Out<Vec<Transaction>>> {
    let editor = open_editor(api::gateway(config, mode).await?, args.session()).await?;
    rename(editor, args).await
}

async fn open_editor(gateway: Box<dyn Gateway + Send>, session: &SessionArgs) -> Result<Editor> {
    let Some(session_id) = session.session_id() else {
        return Err(Error::new(
            ErrorType::MissingSession,
            "A session id is required, pass --session-id or set NINJA_SESSION_ID",
        ));
    };
    let mut editor = Editor::new(gateway, Some(session_id.clone()));
    editor.load_transactions().await?;
    Ok(editor)
}

fn list(mut editor: Editor, args: &TransactionsArgs) -> Result<Out<Vec<Transaction>>> {
    if let Some(search) = args.search() {
        editor.set_search(search);
    }
    for filter in args.filters() {
        editor.set_filter(filter.column(), filter.value());
    }
    if let Some(column) = args.sort() {
        let direction = if args.desc() {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        editor.set_sort(Sort::new(column, direction));
    }

    let view: Vec<Transaction> = editor.view().into_iter().cloned().collect();
    let total = editor.transactions().len();
    if view.is_empty() {
        return Ok(Out::new(
            format!("No transactions match, the session has {total}"),
            view,
        ));
    }
    let message = format!(
        "Showing {} of {total} transactions\n\n{}",
        view.len(),
        render_table(&view)
    );
    Ok(Out::new(message, view))
}

async fn tag(mut editor: Editor, args: &UpdateTagArgs) -> Result<Out<Vec<Transaction>>> {
    editor.begin_edit(args.id())?;
    let affected = affected_ids(&editor, args.id(), args.apply_to_all());
    editor
        .commit_tag_edit(args.id(), args.tag(), args.apply_to_all())
        .await?;
    let changed = rows(&editor, &affected);
    let message = if args.apply_to_all() {
        format!(
            "Tagged {} transaction{} as '{}'",
            changed.len(),
            if changed.len() == 1 { "" } else { "s" },
            args.tag()
        )
    } else {
        format!("Tagged transaction {} as '{}'", args.id(), args.tag())
    };
    Ok(Out::new(message, changed))
}

async fn rename(mut editor: Editor, args: &UpdateProductArgs) -> Result<Out<Vec<Transaction>>> {
    editor.begin_edit(args.id())?;
    let affected = affected_ids(&editor, args.id(), args.scope() == CascadeScope::All);
    let pending = editor.commit_product_edit(args.id(), args.product())?;
    editor.resolve_cascade(args.scope()).await?;
    let renamed = rows(&editor, &affected);
    let message = match args.scope() {
        CascadeScope::One => format!(
            "Renamed '{}' to '{}' on transaction {}",
            pending.old_product,
            pending.new_product,
            args.id()
        ),
        CascadeScope::All => format!(
            "Renamed '{}' to '{}' on {} transaction{}",
            pending.old_product,
            pending.new_product,
            renamed.len(),
            if renamed.len() == 1 { "" } else { "s" }
        ),
    };
    Ok(Out::new(message, renamed))
}

/// The ids an edit of `id` reaches, taken from the working set before the write. With `cascade`
/// that is every row sharing the product of `id`.
fn affected_ids(editor: &Editor, id: &TransactionId, cascade: bool) -> Vec<TransactionId> {
    if !cascade {
        return vec![id.clone()];
    }
    let product = editor
        .transactions()
        .iter()
        .find(|t| t.id() == id)
        .map(|t| t.product().to_string());
    editor
        .transactions()
        .iter()
        .filter(|t| product.as_deref() == Some(t.product()))
        .map(|t| t.id().clone())
        .collect()
}

/// The reloaded rows with the given ids, in working set order.
fn rows(editor: &Editor, ids: &[TransactionId]) -> Vec<Transaction> {
    editor
        .transactions()
        .iter()
        .filter(|t| ids.contains(t.id()))
        .cloned()
        .collect()
}

/// Renders a markdown table of `transactions`.
fn render_table(transactions: &[Transaction]) -> String {
    let mut table = String::new();
    let header: Vec<String> = TransactionColumn::ALL.iter().map(|c| c.to_string()).collect();
    table.push_str(&format!("| {} |\n", header.join(" | ")));
    table.push_str(&format!("|{}\n", "---|".repeat(header.len())));
    for transaction in transactions {
        let cells: Vec<String> = TransactionColumn::ALL
            .iter()
            .map(|c| transaction.column_text(*c).replace('|', "\\|"))
            .collect();
        table.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    table
}
