use thiserror::Error;

#[derive(Error, Debug)]
pub enum RandError {
    #[error("Invalid block size {block_size}: must be a positive even integer")]
    InvalidBlockSize { block_size: usize },

    #[error("Block size {block_size} exceeds the maximum of {max}")]
    BlockSizeTooLarge { block_size: usize, max: usize },

    #[error("Invalid target size: at least one participant is required")]
    InvalidTargetSize,

    #[error("Invalid oversample factor {factor}: must be finite and >= 1.0")]
    InvalidOversample { factor: f64 },

    #[error("Requested table of {requested} rows exceeds the maximum of {max}")]
    TableTooLarge { requested: f64, max: usize },

    #[error("Invalid probability {prob}: must lie in [0, 1]")]
    InvalidProbability { prob: f64 },

    #[error("Stratification requested but no strata were given")]
    EmptyStrata,

    #[error("Stratum labels must not be blank")]
    BlankStratum,

    #[error("Duplicate stratum '{label}'")]
    DuplicateStratum { label: String },

    #[error("Stratum '{label}' not found in table")]
    UnknownStratum { label: String },

    #[error("Assignment table exhausted for stratum '{stratum}'; regenerate with a larger oversample factor")]
    TableExhausted { stratum: String },

    #[error("Narrative error at line {line}: {message}")]
    Narrative { line: usize, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RandResult<T> = Result<T, RandError>;
