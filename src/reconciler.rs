use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ReconError, Result};
use crate::loader::{load_pair, normalize_key};
use crate::models::{
    MatchedRecord, Side, SideDetail, SourceRecord, SourceTable, UnmatchedRecord, Upload,
};

/// What to do when one extract lists the same employee more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse to reconcile.
    #[default]
    Reject,
    /// Keep the first row for the employee and ignore the rest.
    First,
    /// Collapse the rows into one, summing their amounts.
    Sum,
    /// Pair every duplicate row with every counterpart row.
    Cross,
}

impl DuplicatePolicy {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::First => "first",
            Self::Sum => "sum",
            Self::Cross => "cross",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "first" => Ok(Self::First),
            "sum" => Ok(Self::Sum),
            "cross" => Ok(Self::Cross),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected reject, first, sum or cross)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub duplicates: DuplicatePolicy,
    pub case_insensitive_keys: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            duplicates: DuplicatePolicy::Reject,
            case_insensitive_keys: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub left_records: usize,
    pub right_records: usize,
    pub left_keys: usize,
    pub right_keys: usize,
    pub matched_keys: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub duplicates_collapsed: usize,
    /// Matched rows whose FINAL AMOUNT is missing because a side had no amount.
    pub missing_amounts: usize,
}

impl Summary {
    pub fn distinct_keys(&self) -> usize {
        self.matched_keys + self.left_only + self.right_only
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub matched: Vec<MatchedRecord>,
    pub unmatched: Vec<UnmatchedRecord>,
    pub summary: Summary,
}

struct KeyGroup {
    key: String,
    records: Vec<SourceRecord>,
}

/// Records of one extract grouped by normalized employee key, in first-seen
/// order, with the duplicate policy already applied.
struct KeyedTable {
    groups: Vec<KeyGroup>,
    index: HashMap<String, usize>,
    collapsed: usize,
}

impl KeyedTable {
    fn build(table: &SourceTable, options: &ReconcileOptions) -> Result<Self> {
        let mut groups: Vec<KeyGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in &table.records {
            let key = normalize_key(&record.employee, options.case_insensitive_keys);
            match index.get(&key) {
                Some(&i) => groups[i].records.push(record.clone()),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(KeyGroup {
                        key,
                        records: vec![record.clone()],
                    });
                }
            }
        }

        let mut collapsed = 0usize;
        for group in groups.iter_mut().filter(|g| g.records.len() > 1) {
            let count = group.records.len();
            let rows: Vec<usize> = group.records.iter().map(|r| r.row).collect();
            debug!(file = %table.file, key = %group.key, ?rows, policy = %options.duplicates, "duplicate employee");
            match options.duplicates {
                DuplicatePolicy::Reject => {
                    return Err(ReconError::DuplicateKey {
                        file: table.file.clone(),
                        key: group.records[0].employee.clone(),
                        count,
                    });
                }
                DuplicatePolicy::First => {
                    group.records.truncate(1);
                    collapsed += count - 1;
                }
                DuplicatePolicy::Sum => {
                    let total: Option<f64> = group.records.iter().map(|r| r.amount).sum();
                    group.records.truncate(1);
                    group.records[0].amount = total;
                    collapsed += count - 1;
                }
                DuplicatePolicy::Cross => {}
            }
        }

        Ok(Self {
            groups,
            index,
            collapsed,
        })
    }

    fn get(&self, key: &str) -> Option<&KeyGroup> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }
}

fn detail(record: &SourceRecord) -> SideDetail {
    SideDetail {
        deduction: record.deduction.clone(),
        vendor_name: record.vendor_name.clone(),
        amount: record.amount,
    }
}

fn matched_record(left: &SourceRecord, right: &SourceRecord) -> MatchedRecord {
    let final_amount = match (left.amount, right.amount) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    };
    MatchedRecord {
        employee: left.employee.trim().to_string(),
        name: left.name.clone(),
        final_amount,
        left: detail(left),
        right: detail(right),
    }
}

fn unmatched_record(source: Side, record: &SourceRecord) -> UnmatchedRecord {
    UnmatchedRecord {
        source,
        employee: record.employee.trim().to_string(),
        name: record.name.clone(),
        amount: record.amount,
        vote: record.vote.clone(),
        ministry: record.ministry.clone(),
        deduction: record.deduction.clone(),
        vendor_name: record.vendor_name.clone(),
    }
}

/// Join two extracts on EMPLOYEE. Matched rows follow the left file's order;
/// unmatched rows list the left file's leftovers first, then the right's.
pub fn reconcile(
    left: &SourceTable,
    right: &SourceTable,
    options: &ReconcileOptions,
) -> Result<Reconciliation> {
    let left_keys = KeyedTable::build(left, options)?;
    let right_keys = KeyedTable::build(right, options)?;

    let mut summary = Summary {
        left_records: left.len(),
        right_records: right.len(),
        left_keys: left_keys.groups.len(),
        right_keys: right_keys.groups.len(),
        duplicates_collapsed: left_keys.collapsed + right_keys.collapsed,
        ..Summary::default()
    };
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for group in &left_keys.groups {
        match right_keys.get(&group.key) {
            Some(other) => {
                summary.matched_keys += 1;
                for l in &group.records {
                    for r in &other.records {
                        matched.push(matched_record(l, r));
                    }
                }
            }
            None => {
                summary.left_only += 1;
                unmatched.extend(group.records.iter().map(|r| unmatched_record(Side::Left, r)));
            }
        }
    }
    for group in right_keys.groups.iter().filter(|g| !left_keys.contains(&g.key)) {
        summary.right_only += 1;
        unmatched.extend(group.records.iter().map(|r| unmatched_record(Side::Right, r)));
    }

    summary.missing_amounts = matched.iter().filter(|m| m.final_amount.is_none()).count();
    if summary.missing_amounts > 0 {
        warn!(count = summary.missing_amounts, "matched rows with a missing amount");
    }
    info!(
        matched = summary.matched_keys,
        left_only = summary.left_only,
        right_only = summary.right_only,
        "reconciliation complete"
    );

    Ok(Reconciliation {
        matched,
        unmatched,
        summary,
    })
}

/// Parse two uploaded files and reconcile them.
pub fn reconcile_uploads(
    left: &Upload,
    right: &Upload,
    options: &ReconcileOptions,
) -> Result<Reconciliation> {
    let (left, right) = load_pair(left, right)?;
    reconcile(&left, &right, options)
}
