use thiserror::Error;

/// Crate-wide error taxonomy. Each variant names the failure domain so the
/// caller can tell which pipeline step gave up without unwrapping sources.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("query execution failed: {0}")]
    QueryExecution(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("attachment unavailable: {0}")]
    Attachment(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Short label for the pipeline step this error belongs to, used in
    /// operator-facing failure messages.
    pub fn step(&self) -> &'static str {
        match self {
            ExportError::Authentication(_) => "authentication",
            ExportError::QueryExecution(_) => "query",
            ExportError::Transport(_) => "transport",
            ExportError::Render(_) => "render",
            ExportError::Attachment(_) => "attachment",
            ExportError::Config(_) => "configuration",
            ExportError::Io(_) => "io",
        }
    }
}
