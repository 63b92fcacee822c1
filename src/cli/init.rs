use std::path::PathBuf;

use crate::error::Result;
use crate::reconciler::DuplicatePolicy;
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(
    export_dir: Option<String>,
    left_label: Option<String>,
    right_label: Option<String>,
    duplicates: Option<DuplicatePolicy>,
) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = export_dir {
        settings.export_dir = shellexpand_path(&dir);
    }
    if let Some(label) = left_label {
        settings.left_label = label;
    }
    if let Some(label) = right_label {
        settings.right_label = label;
    }
    if let Some(policy) = duplicates {
        settings.duplicates = policy;
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.export_dir);
    std::fs::create_dir_all(&resolved)?;

    println!("Settings saved to {}", settings_path().display());
    println!("Exports will be written under {}", resolved.display());
    Ok(())
}
