pub mod config;
pub mod error;
pub mod export;
pub mod mail;
pub mod query;
pub mod render;

pub use config::{AppConfig, DatabricksConfig, ExportConfig, SmtpConfig};
pub use error::{ExportError, Result};
pub use export::Exporter;
pub use mail::{AttachmentRef, EmailMessage, MailTransport, SmtpMailer};
pub use query::{CellValue, Column, DatabricksRunner, QueryExecutor, QueryResult};
pub use render::{
    compute_layout, ColumnPlan, Orientation, PageSize, RenderConfig, RenderedDocument,
    TableLayout, TableRenderer, TableStyle,
};
