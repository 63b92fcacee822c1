use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("{file}: {reason}")]
    FileFormat { file: String, reason: String },

    #[error("{file}: missing required column '{column}'")]
    Schema { file: String, column: String },

    #[error("{file}: row {row}: {column} value '{value}' is not a number")]
    Conversion {
        file: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("{file}: row {row}: EMPLOYEE is blank")]
    MissingKey { file: String, row: usize },

    #[error("{file}: EMPLOYEE '{key}' appears {count} times (use --duplicates first|sum|cross to allow)")]
    DuplicateKey {
        file: String,
        key: String,
        count: usize,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl ReconError {
    /// True when the error comes from the uploaded files rather than the
    /// environment; the user can fix the input and run again.
    pub fn is_user_recoverable(&self) -> bool {
        match self {
            Self::Csv(_)
            | Self::FileFormat { .. }
            | Self::Schema { .. }
            | Self::Conversion { .. }
            | Self::MissingKey { .. }
            | Self::DuplicateKey { .. } => true,
            #[cfg(feature = "xlsx")]
            Self::Spreadsheet(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
