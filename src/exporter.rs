use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{Field, Record, SourceLabels};
use crate::reconciler::Reconciliation;

pub const MATCHED_DOWNLOAD: &str = "reconciled_data.xlsx";
pub const UNMATCHED_DOWNLOAD: &str = "unmatched_records.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct SavedFiles {
    pub dir: PathBuf,
    pub matched: PathBuf,
    pub unmatched: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Downloads {
    pub matched_xlsx: PathBuf,
    /// Only written when there is at least one unmatched record.
    pub unmatched_csv: Option<PathBuf>,
}

/// One dated export directory, as shown by `payrecon status`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDay {
    pub date: String,
    pub files: usize,
    pub bytes: u64,
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

pub fn write_csv<W: Write, R: Record>(writer: W, records: &[R], labels: &SourceLabels) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(R::headers(labels))?;
    for record in records {
        wtr.write_record(record.fields().iter().map(Field::to_text))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn csv_bytes<R: Record>(records: &[R], labels: &SourceLabels) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, records, labels)?;
    Ok(buf)
}

/// Encode records as a single-sheet workbook with a bold header row and
/// numeric amount cells.
#[cfg(feature = "xlsx")]
pub fn xlsx_bytes<R: Record>(records: &[R], labels: &SourceLabels, sheet_name: &str) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");

    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;
    for (col, header) in R::headers(labels).iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header.as_str(), &bold)?;
    }
    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, field) in record.fields().iter().enumerate() {
            let col = col as u16;
            match field {
                Field::Text(s) if s.is_empty() => {}
                Field::Text(s) => {
                    sheet.write_string(row, col, s.as_str())?;
                }
                Field::Amount(Some(v)) => {
                    sheet.write_number_with_format(row, col, *v, &money)?;
                }
                Field::Amount(None) => {}
            }
        }
    }
    sheet.autofit();

    Ok(workbook.save_to_buffer()?)
}

#[cfg(not(feature = "xlsx"))]
pub fn xlsx_bytes<R: Record>(_records: &[R], _labels: &SourceLabels, _sheet_name: &str) -> Result<Vec<u8>> {
    Err(crate::error::ReconError::FileFormat {
        file: MATCHED_DOWNLOAD.to_string(),
        reason: "spreadsheet support is not enabled in this build".to_string(),
    })
}

fn write_csv_file<R: Record>(path: &Path, records: &[R], labels: &SourceLabels) -> Result<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), records, labels)?;
    debug!(path = %path.display(), rows = records.len(), "wrote csv");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn discard(paths: &[&Path]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

// ---------------------------------------------------------------------------
// Persisted and download artifacts
// ---------------------------------------------------------------------------

/// Write `<base>/<YYYY-MM-DD>/matched_<HH-MM-SS>.csv` and the matching
/// unmatched file. Both names share the one timestamp; a second run within
/// the same second overwrites them. Either both files land or neither does.
pub fn save(
    result: &Reconciliation,
    labels: &SourceLabels,
    base_dir: &Path,
    at: NaiveDateTime,
) -> Result<SavedFiles> {
    let dir = base_dir.join(at.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir)?;
    let stamp = at.format("%H-%M-%S");
    let matched = dir.join(format!("matched_{stamp}.csv"));
    let unmatched = dir.join(format!("unmatched_{stamp}.csv"));

    let matched_tmp = staging_path(&matched);
    let unmatched_tmp = staging_path(&unmatched);
    let staged = write_csv_file(&matched_tmp, &result.matched, labels)
        .and_then(|()| write_csv_file(&unmatched_tmp, &result.unmatched, labels));
    if let Err(e) = staged {
        discard(&[&matched_tmp, &unmatched_tmp]);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&matched_tmp, &matched) {
        discard(&[&matched_tmp, &unmatched_tmp]);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&unmatched_tmp, &unmatched) {
        warn!(path = %unmatched.display(), error = %e, "could not save unmatched rows, removing matched file");
        discard(&[&matched, &unmatched_tmp]);
        return Err(e.into());
    }
    info!(dir = %dir.display(), "saved reconciliation");

    Ok(SavedFiles {
        dir,
        matched,
        unmatched,
    })
}

pub fn save_now(result: &Reconciliation, labels: &SourceLabels, base_dir: &Path) -> Result<SavedFiles> {
    save(result, labels, base_dir, chrono::Local::now().naive_local())
}

/// Write the on-demand download files: matched rows as a workbook, and the
/// unmatched rows as CSV when there are any.
pub fn write_downloads(result: &Reconciliation, labels: &SourceLabels, dir: &Path) -> Result<Downloads> {
    std::fs::create_dir_all(dir)?;

    let matched_xlsx = dir.join(MATCHED_DOWNLOAD);
    std::fs::write(&matched_xlsx, xlsx_bytes(&result.matched, labels, "Reconciled")?)?;

    let unmatched_csv = if result.unmatched.is_empty() {
        None
    } else {
        let path = dir.join(UNMATCHED_DOWNLOAD);
        std::fs::write(&path, csv_bytes(&result.unmatched, labels)?)?;
        Some(path)
    };

    Ok(Downloads {
        matched_xlsx,
        unmatched_csv,
    })
}

/// Dated export directories under `base_dir`, newest first.
pub fn list_exports(base_dir: &Path) -> Result<Vec<ExportDay>> {
    if !base_dir.exists() {
        return Ok(Vec::new());
    }
    let mut days = Vec::new();
    for entry in std::fs::read_dir(base_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !entry.file_type()?.is_dir()
            || chrono::NaiveDate::parse_from_str(&name, "%Y-%m-%d").is_err()
        {
            continue;
        }
        let mut files = 0usize;
        let mut bytes = 0u64;
        for file in std::fs::read_dir(entry.path())? {
            let meta = file?.metadata()?;
            if meta.is_file() {
                files += 1;
                bytes += meta.len();
            }
        }
        days.push(ExportDay {
            date: name,
            files,
            bytes,
        });
    }
    days.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchedRecord, Side, SideDetail, UnmatchedRecord};
    use crate::reconciler::Summary;
    use chrono::NaiveDate;

    fn sample() -> Reconciliation {
        Reconciliation {
            matched: vec![MatchedRecord {
                employee: "1".to_string(),
                name: "Jane, Doe".to_string(),
                final_amount: Some(1500.0),
                left: SideDetail {
                    deduction: "D463".to_string(),
                    vendor_name: "Acme".to_string(),
                    amount: Some(1000.0),
                },
                right: SideDetail {
                    deduction: "D322".to_string(),
                    vendor_name: "Beta".to_string(),
                    amount: Some(500.0),
                },
            }],
            unmatched: vec![UnmatchedRecord {
                source: Side::Left,
                employee: "2".to_string(),
                name: "Joe".to_string(),
                amount: None,
                vote: "V1".to_string(),
                ministry: "Health".to_string(),
                deduction: "D463".to_string(),
                vendor_name: "Acme".to_string(),
            }],
            summary: Summary::default(),
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_csv_bytes_matched_schema() {
        let bytes = csv_bytes(&sample().matched, &SourceLabels::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "EMPLOYEE,NAME,FINAL AMOUNT,DEDUCTION CODE 463,VENDOR NAME (463),Amount (463),DEDUCTION CODE 322,VENDOR NAME (322),Amount (322)"
        );
        assert_eq!(lines.next().unwrap(), "1,\"Jane, Doe\",1500.00,D463,Acme,1000.00,D322,Beta,500.00");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_bytes_unmatched_schema() {
        let bytes = csv_bytes(&sample().unmatched, &SourceLabels::default()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "EMPLOYEE,NAME,AMOUNT,VOTE,MINISTRY,DEDUCTION,VENDOR NAME\n2,Joe,,V1,Health,D463,Acme\n"
        );
    }

    #[test]
    fn test_save_writes_dated_files() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save(&sample(), &SourceLabels::default(), dir.path(), at()).unwrap();
        assert_eq!(saved.dir, dir.path().join("2025-03-07"));
        assert_eq!(saved.matched, dir.path().join("2025-03-07").join("matched_14-05-09.csv"));
        assert_eq!(saved.unmatched, dir.path().join("2025-03-07").join("unmatched_14-05-09.csv"));
        let matched = std::fs::read_to_string(&saved.matched).unwrap();
        assert!(matched.starts_with("EMPLOYEE,NAME,FINAL AMOUNT"));
        let unmatched = std::fs::read_to_string(&saved.unmatched).unwrap();
        assert_eq!(unmatched.lines().count(), 2);
    }

    #[test]
    fn test_save_with_no_rows_writes_headers_only() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save(&Reconciliation::default(), &SourceLabels::default(), dir.path(), at()).unwrap();
        let unmatched = std::fs::read_to_string(&saved.unmatched).unwrap();
        assert_eq!(unmatched, "EMPLOYEE,NAME,AMOUNT,VOTE,MINISTRY,DEDUCTION,VENDOR NAME\n");
    }

    #[test]
    fn test_save_failure_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let day = dir.path().join("2025-03-07");
        // A directory squatting on the unmatched name makes the final rename fail.
        std::fs::create_dir_all(day.join("unmatched_14-05-09.csv").join("occupied")).unwrap();

        assert!(save(&sample(), &SourceLabels::default(), dir.path(), at()).is_err());
        assert!(!day.join("matched_14-05-09.csv").exists());
        let leftovers: Vec<String> = std::fs::read_dir(&day)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["unmatched_14-05-09.csv".to_string()]);
    }

    #[test]
    fn test_list_exports_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        save(&sample(), &SourceLabels::default(), dir.path(), at()).unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap().and_hms_opt(9, 0, 0).unwrap();
        save(&sample(), &SourceLabels::default(), dir.path(), later).unwrap();
        std::fs::create_dir_all(dir.path().join("not-a-date")).unwrap();

        let days = list_exports(dir.path()).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2025-03-08");
        assert_eq!(days[0].files, 2);
        assert!(days[0].bytes > 0);
        assert_eq!(days[1].date, "2025-03-07");
    }

    #[test]
    fn test_list_exports_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_exports(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_xlsx_round_trips_through_loader() {
        let bytes = xlsx_bytes(&sample().matched, &SourceLabels::default(), "Reconciled").unwrap();
        let raw = crate::loader::load_bytes(MATCHED_DOWNLOAD, &bytes).unwrap();
        assert_eq!(raw.headers[2], "FINAL AMOUNT");
        assert_eq!(raw.rows.len(), 1);
        assert_eq!(raw.rows[0].cells[2], "1500");
        assert_eq!(raw.rows[0].cells[1], "Jane, Doe");
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_write_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = write_downloads(&sample(), &SourceLabels::default(), dir.path()).unwrap();
        assert!(downloads.matched_xlsx.exists());
        assert_eq!(downloads.unmatched_csv, Some(dir.path().join(UNMATCHED_DOWNLOAD)));

        let mut all_matched = sample();
        all_matched.unmatched.clear();
        let other = dir.path().join("second");
        let downloads = write_downloads(&all_matched, &SourceLabels::default(), &other).unwrap();
        assert!(downloads.matched_xlsx.exists());
        assert!(downloads.unmatched_csv.is_none());
        assert!(!other.join(UNMATCHED_DOWNLOAD).exists());
    }
}
