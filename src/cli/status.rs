use std::path::PathBuf;

use comfy_table::Table;

use crate::error::Result;
use crate::exporter::list_exports;
use crate::fmt::format_bytes;
use crate::settings::{load_settings, settings_file_exists, settings_path};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let export_dir = PathBuf::from(&settings.export_dir);

    let source = if settings_file_exists() {
        settings_path().display().to_string()
    } else {
        "(defaults, run `payrecon init` to save)".to_string()
    };
    println!("Settings:    {source}");
    println!("Export dir:  {}", export_dir.display());
    println!("Labels:      {} / {}", settings.left_label, settings.right_label);
    println!("Duplicates:  {}", settings.duplicates);
    println!(
        "Keys:        {}",
        if settings.case_insensitive_keys { "case-insensitive" } else { "case-sensitive" }
    );

    let days = list_exports(&export_dir)?;
    println!();
    if days.is_empty() {
        println!("No saved reconciliations yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Files", "Size"]);
    for day in &days {
        table.add_row(vec![day.date.clone(), day.files.to_string(), format_bytes(day.bytes)]);
    }
    println!("{table}");
    Ok(())
}
