//! Search, column filters and sorting over the transaction working set.

use crate::model::{Transaction, TransactionColumn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

serde_plain::derive_display_from_serialize!(SortDirection);
serde_plain::derive_fromstr_from_deserialize!(SortDirection);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Sort {
    pub column: TransactionColumn,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(column: TransactionColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    pub fn ascending(column: TransactionColumn) -> Self {
        Self::new(column, SortDirection::Ascending)
    }

    pub fn descending(column: TransactionColumn) -> Self {
        Self::new(column, SortDirection::Descending)
    }
}

/// The search term, column filters and sort that make up the current view. Empty strings are
/// inactive.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Query {
    search: String,
    filters: BTreeMap<TransactionColumn, String>,
    sort: Option<Sort>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filters(&self) -> &BTreeMap<TransactionColumn, String> {
        &self.filters
    }

    pub fn sort(&self) -> Option<Sort> {
        self.sort
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    /// Sets the filter of `column`. An empty `value` removes it.
    pub fn set_filter(&mut self, column: TransactionColumn, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.filters.remove(&column);
        } else {
            self.filters.insert(column, value);
        }
    }

    pub fn clear_filter(&mut self, column: TransactionColumn) {
        self.filters.remove(&column);
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn set_sort(&mut self, sort: Sort) {
        self.sort = Some(sort);
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    /// What clicking a column header does: an ascending sort on `column` becomes descending,
    /// anything else becomes ascending on `column`.
    pub fn toggle_sort(&mut self, column: TransactionColumn) {
        let direction = match self.sort {
            Some(Sort {
                column: current,
                direction: SortDirection::Ascending,
            }) if current == column => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        self.sort = Some(Sort::new(column, direction));
    }
}

/// Returns the transactions that match `query`, in display order. The input is never reordered.
///
/// A transaction matches when the search term is found in any column and every active filter is
/// found in its column. Both are case-insensitive substring matches. The sort is stable, so rows
/// that compare equal keep their order from `transactions`, in either direction.
pub fn query<'a>(transactions: &'a [Transaction], query: &Query) -> Vec<&'a Transaction> {
    let search = query.search.to_lowercase();
    let filters: Vec<(TransactionColumn, String)> = query
        .filters
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(column, value)| (*column, value.to_lowercase()))
        .collect();

    let mut view: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| search.is_empty() || matches_any_column(t, &search))
        .filter(|t| {
            filters
                .iter()
                .all(|(column, value)| contains(t, *column, value))
        })
        .collect();

    if let Some(sort) = query.sort {
        view.sort_by(|a, b| {
            let ordering = a.compare_by(b, sort.column);
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    view
}

fn matches_any_column(transaction: &Transaction, needle: &str) -> bool {
    TransactionColumn::ALL
        .iter()
        .any(|column| contains(transaction, *column, needle))
}

/// `needle` must already be lower case.
fn contains(transaction: &Transaction, column: TransactionColumn, needle: &str) -> bool {
    transaction
        .column_text(column)
        .to_lowercase()
        .contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{three_transactions, transaction};

    fn ids(view: &[&Transaction]) -> Vec<String> {
        view.iter().map(|t| t.id().to_string()).collect()
    }

    fn ledger() -> Vec<Transaction> {
        vec![
            transaction("1", "2024-01-05", "Amazon Prime", "-179", "Subscription"),
            transaction("2", "2024-01-02", "Swiggy", "-349", "Food"),
            transaction("3", "2024-01-05", "Zomato", "-512", "Food"),
            transaction("4", "2024-01-03", "Acme Technologies", "85000", "Income"),
            transaction("5", "2024-01-02", "Netflix", "-649", "Subscription"),
        ]
    }

    #[test]
    fn test_no_query_keeps_order() {
        let transactions = ledger();
        let view = query(&transactions, &Query::new());
        assert_eq!(ids(&view), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn test_search_any_column_case_insensitive() {
        let transactions = ledger();
        let mut q = Query::new();
        q.set_search("FOOD");
        assert_eq!(ids(&query(&transactions, &q)), vec!["2", "3"]);

        // Dates and amounts are searchable by their plain text.
        q.set_search("2024-01-02");
        assert_eq!(ids(&query(&transactions, &q)), vec!["2", "5"]);
        q.set_search("850");
        assert_eq!(ids(&query(&transactions, &q)), vec!["4"]);
    }

    #[test]
    fn test_filters_and_search_combine() {
        let transactions = ledger();
        let mut q = Query::new();
        q.set_filter(TransactionColumn::Tag, "subscription");
        assert_eq!(ids(&query(&transactions, &q)), vec!["1", "5"]);
        q.set_search("net");
        assert_eq!(ids(&query(&transactions, &q)), vec!["5"]);
        q.set_filter(TransactionColumn::Product, "amazon");
        assert!(query(&transactions, &q).is_empty());
    }

    #[test]
    fn test_empty_filter_is_inactive() {
        let transactions = ledger();
        let mut q = Query::new();
        q.set_filter(TransactionColumn::Tag, "food");
        q.set_filter(TransactionColumn::Tag, "");
        assert!(q.filters().is_empty());
        assert_eq!(query(&transactions, &q).len(), 5);
    }

    #[test]
    fn test_sort_is_stable_in_both_directions() {
        let transactions = ledger();
        let mut q = Query::new();
        q.set_sort(Sort::ascending(TransactionColumn::Date));
        assert_eq!(ids(&query(&transactions, &q)), vec!["2", "5", "4", "1", "3"]);
        q.set_sort(Sort::descending(TransactionColumn::Date));
        assert_eq!(ids(&query(&transactions, &q)), vec!["1", "3", "4", "2", "5"]);
        q.set_sort(Sort::ascending(TransactionColumn::Tag));
        assert_eq!(ids(&query(&transactions, &q)), vec!["2", "3", "4", "1", "5"]);
    }

    #[test]
    fn test_amount_sorts_numerically() {
        let transactions = ledger();
        let mut q = Query::new();
        q.set_sort(Sort::ascending(TransactionColumn::Amount));
        assert_eq!(ids(&query(&transactions, &q)), vec!["5", "3", "2", "1", "4"]);
    }

    #[test]
    fn test_id_sorts_numerically() {
        let transactions = vec![
            transaction("2", "2024-01-02", "Swiggy", "-349", "Food"),
            transaction("10", "2024-01-03", "Zomato", "-512", "Food"),
            transaction("1", "2024-01-01", "Netflix", "-649", "Subscription"),
        ];
        let mut q = Query::new();
        q.set_sort(Sort::ascending(TransactionColumn::Id));
        assert_eq!(ids(&query(&transactions, &q)), vec!["1", "2", "10"]);
        q.set_sort(Sort::descending(TransactionColumn::Id));
        assert_eq!(ids(&query(&transactions, &q)), vec!["10", "2", "1"]);
    }

    #[test]
    fn test_query_is_idempotent() {
        let transactions = three_transactions();
        let mut q = Query::new();
        q.set_search("e");
        q.set_filter(TransactionColumn::Product, "prime");
        q.set_sort(Sort::descending(TransactionColumn::Amount));
        let first: Vec<Transaction> = query(&transactions, &q).into_iter().cloned().collect();
        let second = query(&first, &q);
        assert_eq!(ids(&query(&transactions, &q)), ids(&second));
        assert_eq!(ids(&query(&transactions, &q)), ids(&query(&transactions, &q)));
    }

    #[test]
    fn test_toggle_sort() {
        let mut q = Query::new();
        q.toggle_sort(TransactionColumn::Amount);
        assert_eq!(q.sort(), Some(Sort::ascending(TransactionColumn::Amount)));
        q.toggle_sort(TransactionColumn::Amount);
        assert_eq!(q.sort(), Some(Sort::descending(TransactionColumn::Amount)));
        q.toggle_sort(TransactionColumn::Amount);
        assert_eq!(q.sort(), Some(Sort::ascending(TransactionColumn::Amount)));
        q.toggle_sort(TransactionColumn::Date);
        assert_eq!(q.sort(), Some(Sort::ascending(TransactionColumn::Date)));
        q.clear_sort();
        assert_eq!(q.sort(), None);
    }
}
