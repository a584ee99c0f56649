use crate::model::Amount;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const ISO_DATE: &str = "%Y-%m-%d";

/// Identifies a transaction within a session. The backend sends integers but the client treats
/// the value as opaque.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric order when both ids are integers, text order otherwise.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<i64>(), other.0.parse::<i64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl FromStr for TransactionId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl<'de> Deserialize<'de> for TransactionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(Self(s)),
            serde_json::Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected a transaction id, found {other}"
            ))),
        }
    }
}

/// A single transaction as returned by the backend's list endpoint.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub(crate) id: TransactionId,
    #[serde(with = "transaction_date")]
    pub(crate) date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) narration: String,
    /// The merchant or counter-party, user editable.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) product: String,
    pub(crate) amount: Amount,
    /// The spending category, user editable.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) tag: String,
    /// The payment channel, e.g. UPI or Debit Card.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) mode: String,
}

impl Transaction {
    pub fn new(
        id: impl Into<TransactionId>,
        date: NaiveDate,
        narration: impl Into<String>,
        product: impl Into<String>,
        amount: Amount,
        tag: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            narration: narration.into(),
            product: product.into(),
            amount,
            tag: tag.into(),
            mode: mode.into(),
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn narration(&self) -> &str {
        &self.narration
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// The text of `column` as it is matched by searches and column filters.
    pub fn column_text(&self, column: TransactionColumn) -> String {
        match column {
            TransactionColumn::Id => self.id.to_string(),
            TransactionColumn::Date => self.date.format(ISO_DATE).to_string(),
            TransactionColumn::Narration => self.narration.clone(),
            TransactionColumn::Product => self.product.clone(),
            TransactionColumn::Amount => self.amount.plain(),
            TransactionColumn::Tag => self.tag.clone(),
            TransactionColumn::Mode => self.mode.clone(),
        }
    }

    /// Compares two transactions by the natural type of `column`: chronological for dates,
    /// numeric for amounts and integer ids, lexical for text.
    pub fn compare_by(&self, other: &Self, column: TransactionColumn) -> Ordering {
        match column {
            TransactionColumn::Id => self.id.natural_cmp(&other.id),
            TransactionColumn::Date => self.date.cmp(&other.date),
            TransactionColumn::Narration => self.narration.cmp(&other.narration),
            TransactionColumn::Product => self.product.cmp(&other.product),
            TransactionColumn::Amount => self.amount.cmp(&other.amount),
            TransactionColumn::Tag => self.tag.cmp(&other.tag),
            TransactionColumn::Mode => self.mode.cmp(&other.mode),
        }
    }
}

/// The columns of the transaction grid.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionColumn {
    Id,
    Date,
    Narration,
    Product,
    Amount,
    Tag,
    Mode,
}

serde_plain::derive_display_from_serialize!(TransactionColumn);
serde_plain::derive_fromstr_from_deserialize!(TransactionColumn);

impl TransactionColumn {
    pub const ALL: [TransactionColumn; 7] = [
        TransactionColumn::Id,
        TransactionColumn::Date,
        TransactionColumn::Narration,
        TransactionColumn::Product,
        TransactionColumn::Amount,
        TransactionColumn::Tag,
        TransactionColumn::Mode,
    ];
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dates are written as `YYYY-MM-DD`. When reading, RFC 2822 timestamps such as
/// `Mon, 15 Jan 2024 00:00:00 GMT` are also accepted since that is how some backends serialize
/// date columns.
mod transaction_date {
    use super::ISO_DATE;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(ISO_DATE).to_string())
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognized transaction date '{s}'"))
        })
    }
}

/// Parses the date formats the backend is known to send.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, ISO_DATE) {
        return Some(date);
    }
    if let Ok(date_time) = DateTime::parse_from_rfc2822(s) {
        return Some(date_time.date_naive());
    }
    // ISO timestamps such as 2024-01-15T00:00:00
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, ISO_DATE).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, ISO_DATE).unwrap()
    }

    #[test]
    fn test_deserialize_backend_row() {
        let json = r#"{
            "id": 17,
            "date": "Mon, 15 Jan 2024 00:00:00 GMT",
            "narration": "UPI-AMAZON PRIME-amazonprime@apl",
            "product": "Amazon Prime",
            "amount": 179.0,
            "tag": null,
            "mode": "UPI"
        }"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.id().as_str(), "17");
        assert_eq!(t.date(), d("2024-01-15"));
        assert_eq!(t.product(), "Amazon Prime");
        assert_eq!(t.tag(), "");
        assert_eq!(t.amount().plain(), "179");
    }

    #[test]
    fn test_deserialize_iso_date_and_string_id() {
        let json = r#"{"id": "a1", "date": "2024-03-02", "narration": "x", "product": "p",
            "amount": "12.50", "tag": "t", "mode": "POS"}"#;
        let t: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.id().as_str(), "a1");
        assert_eq!(t.date(), d("2024-03-02"));
        let back = serde_json::to_value(&t).unwrap();
        assert_eq!(back["date"], "2024-03-02");
        assert_eq!(back["id"], "a1");
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let json = r#"{"id": 1, "date": "yesterday", "narration": "", "product": "",
            "amount": 1, "tag": "", "mode": ""}"#;
        assert!(serde_json::from_str::<Transaction>(json).is_err());
    }

    #[test]
    fn test_parse_date_iso_timestamp() {
        assert_eq!(parse_date("2024-06-30T10:00:00"), Some(d("2024-06-30")));
        assert_eq!(parse_date("30/06/24"), None);
    }

    #[test]
    fn test_column_names() {
        assert_eq!(TransactionColumn::from_str("tag").unwrap(), TransactionColumn::Tag);
        assert_eq!(TransactionColumn::Narration.to_string(), "narration");
        assert!(TransactionColumn::from_str("Tags").is_err());
    }

    #[test]
    fn test_compare_by_natural_type() {
        let a = Transaction::new(
            "1",
            d("2024-01-09"),
            "",
            "b",
            Amount::from_str("9").unwrap(),
            "",
            "",
        );
        let b = Transaction::new(
            "2",
            d("2024-01-10"),
            "",
            "a",
            Amount::from_str("10").unwrap(),
            "",
            "",
        );
        assert_eq!(a.compare_by(&b, TransactionColumn::Date), Ordering::Less);
        assert_eq!(a.compare_by(&b, TransactionColumn::Amount), Ordering::Less);
        assert_eq!(a.compare_by(&b, TransactionColumn::Product), Ordering::Greater);
        assert_eq!(a.column_text(TransactionColumn::Date), "2024-01-09");
    }

    #[test]
    fn test_id_natural_cmp() {
        let id = |s: &str| TransactionId::new(s);
        assert_eq!(id("2").natural_cmp(&id("10")), Ordering::Less);
        assert_eq!(id("10").natural_cmp(&id("10")), Ordering::Equal);
        assert_eq!(id("b").natural_cmp(&id("a")), Ordering::Greater);
        assert_eq!(id("10").natural_cmp(&id("a")), Ordering::Less);
    }
}
