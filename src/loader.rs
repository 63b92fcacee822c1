use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{ReconError, Result};
use crate::models::{RawRow, RawTable, SourceRecord, SourceTable, Upload};

pub const EMPLOYEE: &str = "EMPLOYEE";
pub const AMOUNT: &str = "AMOUNT";
pub const NAME: &str = "NAME";
pub const DEDUCTION: &str = "DEDUCTION";
pub const VENDOR_NAME: &str = "VENDOR NAME";
pub const VOTE: &str = "VOTE";
pub const MINISTRY: &str = "MINISTRY";

/// Spellings a spreadsheet or dataframe export uses for an empty amount,
/// compared case-insensitively.
const MISSING_MARKERS: &[&str] = &[
    "#n/a", "#n/a n/a", "#na", "-1.#ind", "-1.#qnan", "-nan", "1.#ind", "1.#qnan", "<na>",
    "n/a", "na", "nan", "null", "none",
];

fn is_missing_marker(s: &str) -> bool {
    MISSING_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[,\s_"'$]"#).expect("separator pattern compiles"))
}

fn integral_float() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d+)\.0+$").expect("integral pattern compiles"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotANumber;

/// Strip thousands separators and currency noise from an amount cell.
/// Blank or NaN-like cells are missing (`Ok(None)`); `(x)` is `-x`.
pub fn normalize_amount(raw: &str) -> std::result::Result<Option<f64>, NotANumber> {
    if is_missing_marker(raw.trim()) {
        return Ok(None);
    }
    let cleaned = separators().replace_all(raw, "");
    let s = cleaned.as_ref();
    if s.is_empty() || is_missing_marker(s) {
        return Ok(None);
    }
    let (negate, body) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let value: f64 = body.parse().map_err(|_| NotANumber)?;
    if !value.is_finite() {
        return Err(NotANumber);
    }
    Ok(Some(if negate { -value } else { value }))
}

/// Canonical form of an employee identifier used as the join key.
pub fn normalize_key(raw: &str, case_insensitive: bool) -> String {
    let mut key: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(caps) = integral_float().captures(&key) {
        key = caps[1].to_string();
    }
    if case_insensitive {
        key = key.to_uppercase();
    }
    key
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn format_error(file: &str, reason: impl Into<String>) -> ReconError {
    ReconError::FileFormat {
        file: file.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Parse an uploaded file into a header row plus text cells, choosing the
/// reader from the file name's extension.
pub fn load_bytes(name: &str, bytes: &[u8]) -> Result<RawTable> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match ext.as_str() {
        "csv" => read_csv(name, bytes)?,
        "xlsx" | "xlsm" | "xls" | "ods" => read_spreadsheet(name, &ext, bytes)?,
        "" => return Err(format_error(name, "file has no extension; expected .csv or .xlsx")),
        other => {
            return Err(format_error(
                name,
                format!("unsupported file type '.{other}'; expected .csv or .xlsx"),
            ))
        }
    };

    if table.headers.iter().all(|h| h.is_empty()) {
        return Err(format_error(name, "file is empty or has no header row"));
    }
    debug!(file = name, columns = table.headers.len(), rows = table.rows.len(), "parsed file");
    Ok(table)
}

fn read_csv(name: &str, bytes: &[u8]) -> Result<RawTable> {
    // Excel's "CSV UTF-8" export prepends a byte order mark.
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut headers = Vec::new();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map_or(rows.len() + 2, |p| p.line() as usize);
        if headers.is_empty() {
            headers = record.iter().map(|h| h.trim().to_string()).collect();
            continue;
        }
        rows.push(RawRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable {
        file: name.to_string(),
        headers,
        rows,
    })
}

#[cfg(feature = "xlsx")]
fn read_spreadsheet(name: &str, ext: &str, bytes: &[u8]) -> Result<RawTable> {
    use calamine::{Ods, Reader, Xls, Xlsx};
    use std::io::Cursor;

    let cursor = Cursor::new(bytes.to_vec());
    let range = match ext {
        "xls" => first_sheet(name, Xls::new(cursor).map_err(calamine::Error::from)?)?,
        "ods" => first_sheet(name, Ods::new(cursor).map_err(calamine::Error::from)?)?,
        _ => first_sheet(name, Xlsx::new(cursor).map_err(calamine::Error::from)?)?,
    };

    let first_line = range.start().map_or(1, |(row, _)| row as usize + 1);
    let mut rows = range.rows().enumerate();
    let headers = match rows.next() {
        Some((_, cells)) => cells.iter().map(|c| cell_text(c).trim().to_string()).collect(),
        None => Vec::new(),
    };
    let rows = rows
        .map(|(i, cells)| RawRow {
            line: first_line + i,
            cells: cells.iter().map(cell_text).collect(),
        })
        .collect();

    Ok(RawTable {
        file: name.to_string(),
        headers,
        rows,
    })
}

/// Error cells (`#N/A`, `#DIV/0!`, ...) carry no value and read as blank.
#[cfg(feature = "xlsx")]
fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty | calamine::Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

#[cfg(feature = "xlsx")]
fn first_sheet<R>(name: &str, mut workbook: R) -> Result<calamine::Range<calamine::Data>>
where
    R: calamine::Reader<std::io::Cursor<Vec<u8>>>,
    calamine::Error: From<R::Error>,
{
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(range.map_err(calamine::Error::from)?),
        None => Err(format_error(name, "workbook has no worksheets")),
    }
}

#[cfg(not(feature = "xlsx"))]
fn read_spreadsheet(name: &str, _ext: &str, _bytes: &[u8]) -> Result<RawTable> {
    Err(format_error(name, "spreadsheet support is not enabled in this build"))
}

// ---------------------------------------------------------------------------
// Column extraction
// ---------------------------------------------------------------------------

/// Pick the payroll columns out of a parsed file and normalize amounts.
pub fn to_source_table(raw: &RawTable) -> Result<SourceTable> {
    let require = |column: &str| {
        find_column(&raw.headers, column).ok_or_else(|| ReconError::Schema {
            file: raw.file.clone(),
            column: column.to_string(),
        })
    };
    let idx_employee = require(EMPLOYEE)?;
    let idx_amount = require(AMOUNT)?;
    let idx_name = require(NAME)?;
    let idx_deduction = require(DEDUCTION)?;
    let idx_vendor = require(VENDOR_NAME)?;
    let idx_vote = find_column(&raw.headers, VOTE);
    let idx_ministry = find_column(&raw.headers, MINISTRY);
    if idx_vote.is_none() || idx_ministry.is_none() {
        debug!(file = %raw.file, "VOTE/MINISTRY column absent, unmatched rows will leave it blank");
    }

    let mut records = Vec::with_capacity(raw.rows.len());
    for row in &raw.rows {
        if row.cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cell = |idx: usize| {
            row.cells
                .get(idx)
                .map(|c| c.trim().to_string())
                .unwrap_or_default()
        };

        let employee = cell(idx_employee);
        if employee.is_empty() {
            return Err(ReconError::MissingKey {
                file: raw.file.clone(),
                row: row.line,
            });
        }
        let raw_amount = cell(idx_amount);
        let amount = normalize_amount(&raw_amount).map_err(|_| ReconError::Conversion {
            file: raw.file.clone(),
            row: row.line,
            column: AMOUNT.to_string(),
            value: raw_amount.clone(),
        })?;

        records.push(SourceRecord {
            row: row.line,
            employee,
            name: cell(idx_name),
            amount,
            deduction: cell(idx_deduction),
            vendor_name: cell(idx_vendor),
            vote: idx_vote.map(&cell).unwrap_or_default(),
            ministry: idx_ministry.map(&cell).unwrap_or_default(),
        });
    }

    Ok(SourceTable {
        file: raw.file.clone(),
        records,
    })
}

pub fn load_source(name: &str, bytes: &[u8]) -> Result<SourceTable> {
    let table = to_source_table(&load_bytes(name, bytes)?)?;
    info!(file = %table.file, records = table.len(), "loaded extract");
    Ok(table)
}

/// Read a file from disk as an upload: its bare file name plus contents.
pub fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(Upload { name, bytes })
}

/// Parse both uploads, each on its own thread.
pub fn load_pair(left: &Upload, right: &Upload) -> Result<(SourceTable, SourceTable)> {
    let (left, right) = std::thread::scope(|s| {
        let handle = s.spawn(|| load_source(&right.name, &right.bytes));
        let left = load_source(&left.name, &left.bytes);
        let right = handle
            .join()
            .unwrap_or_else(|_| Err(ReconError::Other("file loader thread panicked".to_string())));
        (left, right)
    });
    Ok((left?, right?))
}
