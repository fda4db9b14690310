use thiserror::Error;

/// Problems found while validating a panel configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("page id must not be empty")]
    EmptyPageId,

    #[error("duplicate page id: {0}")]
    DuplicatePage(String),

    #[error("page {page}: chart has an empty column")]
    EmptyColumn { page: String },

    #[error("column {column}: bin width must be positive, got {width}")]
    BadBinWidth { column: String, width: i64 },

    #[error("column {column}: bin edges must be strictly increasing")]
    UnsortedEdges { column: String },

    #[error("column {column}: {labels} labels for {bins} bins")]
    LabelCount {
        column: String,
        labels: usize,
        bins: usize,
    },

    #[error("column {column}: top-n needs n > 0")]
    ZeroTopN { column: String },

    #[error("column {column}: multi-value delimiter must not be empty")]
    EmptyDelimiter { column: String },
}
