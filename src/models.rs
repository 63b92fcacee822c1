use serde::{Deserialize, Serialize};

/// Which of the two uploaded extracts a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Labels naming the two source systems in output column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLabels {
    pub left: String,
    pub right: String,
}

impl Default for SourceLabels {
    fn default() -> Self {
        Self {
            left: "463".to_string(),
            right: "322".to_string(),
        }
    }
}

/// A file as handed over by the user: its name (for format dispatch and
/// error messages) and raw contents.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Header row plus text cells, as read from a CSV or the first worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub file: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based line in the source file.
    pub line: usize,
    pub cells: Vec<String>,
}

/// One employee row from an extract, after column extraction and amount
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// 1-based line in the source file (header is row 1).
    pub row: usize,
    pub employee: String,
    pub name: String,
    pub amount: Option<f64>,
    pub deduction: String,
    pub vendor_name: String,
    pub vote: String,
    pub ministry: String,
}

#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub file: String,
    pub records: Vec<SourceRecord>,
}

impl SourceTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// The fields one side contributes to a matched row.
#[derive(Debug, Clone, PartialEq)]
pub struct SideDetail {
    pub deduction: String,
    pub vendor_name: String,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRecord {
    pub employee: String,
    pub name: String,
    pub final_amount: Option<f64>,
    pub left: SideDetail,
    pub right: SideDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedRecord {
    pub source: Side,
    pub employee: String,
    pub name: String,
    pub amount: Option<f64>,
    pub vote: String,
    pub ministry: String,
    pub deduction: String,
    pub vendor_name: String,
}

/// A single output cell. Amounts stay numeric so spreadsheets get number cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Amount(Option<f64>),
}

impl Field {
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Amount(Some(v)) => format!("{v:.2}"),
            Self::Amount(None) => String::new(),
        }
    }
}

/// A result row that can be written to any of the export formats.
pub trait Record {
    fn headers(labels: &SourceLabels) -> Vec<String>;
    fn fields(&self) -> Vec<Field>;
}

impl Record for MatchedRecord {
    fn headers(labels: &SourceLabels) -> Vec<String> {
        let (l, r) = (&labels.left, &labels.right);
        vec![
            "EMPLOYEE".to_string(),
            "NAME".to_string(),
            "FINAL AMOUNT".to_string(),
            format!("DEDUCTION CODE {l}"),
            format!("VENDOR NAME ({l})"),
            format!("Amount ({l})"),
            format!("DEDUCTION CODE {r}"),
            format!("VENDOR NAME ({r})"),
            format!("Amount ({r})"),
        ]
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::Text(self.employee.clone()),
            Field::Text(self.name.clone()),
            Field::Amount(self.final_amount),
            Field::Text(self.left.deduction.clone()),
            Field::Text(self.left.vendor_name.clone()),
            Field::Amount(self.left.amount),
            Field::Text(self.right.deduction.clone()),
            Field::Text(self.right.vendor_name.clone()),
            Field::Amount(self.right.amount),
        ]
    }
}

impl Record for UnmatchedRecord {
    fn headers(_labels: &SourceLabels) -> Vec<String> {
        ["EMPLOYEE", "NAME", "AMOUNT", "VOTE", "MINISTRY", "DEDUCTION", "VENDOR NAME"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::Text(self.employee.clone()),
            Field::Text(self.name.clone()),
            Field::Amount(self.amount),
            Field::Text(self.vote.clone()),
            Field::Text(self.ministry.clone()),
            Field::Text(self.deduction.clone()),
            Field::Text(self.vendor_name.clone()),
        ]
    }
}
