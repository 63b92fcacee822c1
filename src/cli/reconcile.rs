use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::ReconcileArgs;
use crate::error::Result;
use crate::exporter;
use crate::fmt::money;
use crate::loader::read_upload;
use crate::models::{Field, Record, Side, SourceLabels};
use crate::reconciler::{self, ReconcileOptions, Reconciliation};
use crate::settings::{load_settings, shellexpand_path, Settings};

/// Settings for one run after command-line overrides.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunPlan {
    pub labels: SourceLabels,
    pub options: ReconcileOptions,
    pub preview_rows: usize,
    pub unmatched_preview_rows: usize,
    pub export_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
}

pub(crate) fn plan(settings: &Settings, args: &ReconcileArgs) -> RunPlan {
    let mut labels = settings.labels();
    if let Some(l) = &args.left_label {
        labels.left = l.clone();
    }
    if let Some(r) = &args.right_label {
        labels.right = r.clone();
    }
    let mut options = settings.reconcile_options();
    if let Some(d) = args.duplicates {
        options.duplicates = d;
    }
    if args.case_sensitive {
        options.case_insensitive_keys = false;
    }
    let export_dir = if args.no_save {
        None
    } else {
        Some(PathBuf::from(
            args.out_dir
                .as_deref()
                .map(shellexpand_path)
                .unwrap_or_else(|| settings.export_dir.clone()),
        ))
    };
    RunPlan {
        labels,
        options,
        preview_rows: args.preview.unwrap_or(settings.preview_rows),
        unmatched_preview_rows: settings.unmatched_preview_rows,
        export_dir,
        download_dir: args.download_dir.as_deref().map(|d| PathBuf::from(shellexpand_path(d))),
    }
}

fn preview_table<R: Record>(records: &[R], labels: &SourceLabels, limit: usize) -> Table {
    let mut table = Table::new();
    table.set_header(R::headers(labels));
    for record in records.iter().take(limit) {
        table.add_row(record.fields().into_iter().map(|field| match field {
            Field::Text(s) => Cell::new(s),
            Field::Amount(v) => Cell::new(money(v)).set_alignment(CellAlignment::Right),
        }));
    }
    table
}

fn print_summary(result: &Reconciliation, labels: &SourceLabels) {
    let summary = &result.summary;
    let side_line = |label: &str, side: Side, records: usize, keys: usize, only: usize| {
        let leftover_rows = result.unmatched.iter().filter(|u| u.source == side).count();
        let rows = if leftover_rows == only {
            String::new()
        } else {
            format!(" ({leftover_rows} rows)")
        };
        println!("File {label}: {records} records, {keys} employees, {only} unmatched{rows}");
    };

    println!();
    side_line(&labels.left, Side::Left, summary.left_records, summary.left_keys, summary.left_only);
    side_line(&labels.right, Side::Right, summary.right_records, summary.right_keys, summary.right_only);
    println!(
        "Matched employees: {} of {}",
        summary.matched_keys.to_string().green(),
        summary.distinct_keys()
    );
    if summary.duplicates_collapsed > 0 {
        println!("Duplicate rows merged: {}", summary.duplicates_collapsed);
    }
    if summary.missing_amounts > 0 {
        let msg = format!(
            "{} matched rows have no FINAL AMOUNT (a source amount is blank)",
            summary.missing_amounts
        );
        println!("{}", msg.yellow());
    }
}

pub fn run(args: ReconcileArgs) -> Result<()> {
    let plan = plan(&load_settings(), &args);
    let labels = &plan.labels;

    let left = read_upload(Path::new(&args.left))?;
    let right = read_upload(Path::new(&args.right))?;
    let result = reconciler::reconcile_uploads(&left, &right, &plan.options)?;

    println!("Number of records in File {}: {}", labels.left, result.summary.left_records);
    println!("Number of records in File {}: {}", labels.right, result.summary.right_records);

    println!(
        "{} Here are the first {} reconciliations:",
        "Reconciliation complete!".green().bold(),
        plan.preview_rows.min(result.matched.len())
    );
    println!("{}", preview_table(&result.matched, labels, plan.preview_rows));

    if !result.unmatched.is_empty() {
        println!(
            "{} Here are the first {}:",
            format!("{} unmatched records found!", result.unmatched.len()).yellow().bold(),
            plan.unmatched_preview_rows.min(result.unmatched.len())
        );
        println!("{}", preview_table(&result.unmatched, labels, plan.unmatched_preview_rows));
    }
    print_summary(&result, labels);

    if let Some(dir) = &plan.download_dir {
        let downloads = exporter::write_downloads(&result, labels, dir)?;
        println!("Wrote {}", downloads.matched_xlsx.display());
        if let Some(path) = downloads.unmatched_csv {
            println!("Wrote {}", path.display());
        }
    }

    if let Some(dir) = &plan.export_dir {
        let saved = exporter::save_now(&result, labels, dir)?;
        println!("Saved to {}", saved.dir.display());
        println!("  {}", saved.matched.display());
        println!("  {}", saved.unmatched.display());
    }

    Ok(())
}
