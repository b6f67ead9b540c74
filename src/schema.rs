use crate::normalize::parse_amount;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A cell value as produced by spreadsheet and remote collaborators.
///
/// Amounts arrive either as JSON numbers or as strings ("1,234.50", ""), and
/// occasionally as `null`. The variant order matters for untagged decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(untagged)]
pub enum RawValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Numeric view of the value; anything unparseable counts as zero.
    pub fn as_amount(&self) -> f64 {
        match self {
            RawValue::Empty => 0.0,
            RawValue::Number(n) if n.is_finite() => *n,
            RawValue::Number(_) => 0.0,
            RawValue::Text(s) => parse_amount(s),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Number(_) => false,
            RawValue::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Empty => Ok(()),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

/// The `Type` column. Only `Manual` carries meaning for the engine; any other
/// label is kept verbatim so rows round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionKind {
    Manual,
    Other(String),
}

impl From<String> for TransactionKind {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("manual") {
            TransactionKind::Manual
        } else {
            TransactionKind::Other(value)
        }
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Manual => "Manual".to_string(),
            TransactionKind::Other(label) => label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitRole {
    /// The original transaction, suppressed from the working ledger.
    Source,
    /// A partition of the source amount.
    Child,
    /// The split was undone; the source is restored.
    Reverted,
}

impl SplitRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SOURCE" => Some(SplitRole::Source),
            "CHILD" => Some(SplitRole::Child),
            "REVERTED" => Some(SplitRole::Reverted),
            _ => None,
        }
    }
}

// Unknown or blank "Split Type" cells mean "not part of a split".
fn lenient_split_role<'de, D>(deserializer: D) -> std::result::Result<Option<SplitRole>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(SplitRole::parse))
}

// Group ids are sometimes typed as numbers in the sheet.
fn lenient_group_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawValue::deserialize(deserializer)?;
    let id = raw.to_string();
    let id = id.trim();
    Ok(if id.is_empty() { None } else { Some(id.to_string()) })
}

/// A working-ledger row, with the column names used by the ledger sheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Transaction {
    #[serde(rename = "Date")]
    pub date: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Document")]
    pub document: String,

    #[serde(rename = "Trip/Event", skip_serializing_if = "Option::is_none")]
    pub trip_event: Option<String>,

    #[serde(rename = "Category", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(rename = "Income")]
    pub income: RawValue,

    #[serde(rename = "Expense")]
    pub expense: RawValue,

    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub kind: Option<TransactionKind>,

    #[serde(
        rename = "Split Group ID",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_group_id"
    )]
    #[schemars(with = "Option<String>")]
    pub split_group_id: Option<String>,

    #[serde(
        rename = "Split Type",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_split_role"
    )]
    #[schemars(with = "Option<SplitRole>")]
    pub split_role: Option<SplitRole>,
}

impl Transaction {
    pub fn income_amount(&self) -> f64 {
        self.income.as_amount()
    }

    pub fn expense_amount(&self) -> f64 {
        self.expense.as_amount()
    }

    /// Income minus expense for this record.
    pub fn net(&self) -> f64 {
        self.income_amount() - self.expense_amount()
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.kind, Some(TransactionKind::Manual))
    }

    pub fn is_split_child(&self) -> bool {
        self.split_role == Some(SplitRole::Child)
    }

    /// Trip tag, treating blank strings as missing.
    pub fn trip(&self) -> Option<&str> {
        non_blank(self.trip_event.as_deref())
    }

    /// Category tag, treating blank strings as missing.
    pub fn category_tag(&self) -> Option<&str> {
        non_blank(self.category.as_deref())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Transaction)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A bank-statement row as produced by the spreadsheet importer, before it is
/// brought into the ledger's canonical shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportedRow {
    pub date: String,
    pub description: String,
    pub document: String,
    pub cash_in: RawValue,
    pub cash_out: RawValue,
}
