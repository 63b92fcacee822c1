pub mod init;
pub mod reconcile;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::reconciler::DuplicatePolicy;

#[derive(Parser)]
#[command(
    name = "payrecon",
    version,
    about = "Reconcile two payroll deduction extracts by employee number."
)]
pub struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long = "log-level", global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save defaults: export directory, source labels and duplicate policy.
    Init {
        /// Base directory for dated exports (default: ~/Documents/payrecon)
        #[arg(long = "export-dir")]
        export_dir: Option<String>,
        /// Label of the first file, used in output column names
        #[arg(long = "left-label")]
        left_label: Option<String>,
        /// Label of the second file, used in output column names
        #[arg(long = "right-label")]
        right_label: Option<String>,
        /// Duplicate employee policy: reject, first, sum, cross
        #[arg(long)]
        duplicates: Option<DuplicatePolicy>,
    },
    /// Match two CSV/XLSX extracts on EMPLOYEE and export the results.
    Reconcile(ReconcileArgs),
    /// Show settings and saved exports.
    Status,
    /// Print a shell completion script.
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReconcileArgs {
    /// First extract (CSV or XLSX), e.g. the 463 file
    pub left: String,
    /// Second extract (CSV or XLSX), e.g. the 322 file
    pub right: String,
    /// Base directory for the dated matched/unmatched CSVs
    #[arg(long = "out-dir")]
    pub out_dir: Option<String>,
    /// Also write reconciled_data.xlsx and unmatched_records.csv here
    #[arg(long = "download-dir")]
    pub download_dir: Option<String>,
    /// Do not write the dated CSVs
    #[arg(long = "no-save")]
    pub no_save: bool,
    /// Duplicate employee policy: reject, first, sum, cross
    #[arg(long)]
    pub duplicates: Option<DuplicatePolicy>,
    /// Compare employee numbers case-sensitively
    #[arg(long = "case-sensitive")]
    pub case_sensitive: bool,
    /// Number of matched rows to preview
    #[arg(long)]
    pub preview: Option<usize>,
    /// Label of the first file
    #[arg(long = "left-label")]
    pub left_label: Option<String>,
    /// Label of the second file
    #[arg(long = "right-label")]
    pub right_label: Option<String>,
}
