use crate::error::{ExportError, Result};
use crate::render::{Orientation, PageSize};
use std::env;
use std::fmt;

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAX_ROWS: u64 = 10_000;
const DEFAULT_OUTPUT_DIR: &str = "./exports";

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Databricks workspace settings. `host` and `token` are optional here so
/// that validation can report everything missing in one pass.
#[derive(Debug, Clone)]
pub struct DatabricksConfig {
    pub warehouse_id: String,
    pub host: Option<String>,
    pub token: Option<String>,
}

impl DatabricksConfig {
    pub fn from_env() -> Self {
        Self {
            warehouse_id: env_opt("DATABRICKS_WAREHOUSE_ID").unwrap_or_default(),
            host: env_opt("DATABRICKS_HOST"),
            token: env_opt("DATABRICKS_TOKEN"),
        }
    }
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub use_tls: bool,
}

// Manual Debug so the password never reaches logs.
impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("from_email", &self.from_email)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl SmtpConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_opt("SMTP_HOST").unwrap_or_default(),
            port: env_opt("SMTP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            user: env_opt("SMTP_USER").unwrap_or_default(),
            password: env_opt("SMTP_PASSWORD").unwrap_or_default(),
            from_email: env_opt("FROM_EMAIL").unwrap_or_default(),
            use_tls: env_opt("SMTP_USE_TLS")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub output_dir: String,
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub max_rows: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            page_size: PageSize::Letter,
            orientation: Orientation::Landscape,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl ExportConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let page_size = match env_opt("EXPORT_PAGE_SIZE") {
            Some(v) => v.parse().map_err(ExportError::Config)?,
            None => defaults.page_size,
        };
        let orientation = match env_opt("EXPORT_ORIENTATION") {
            Some(v) => v.parse().map_err(ExportError::Config)?,
            None => defaults.orientation,
        };
        let max_rows = match env_opt("EXPORT_MAX_ROWS") {
            Some(v) => v
                .parse()
                .map_err(|_| ExportError::Config(format!("invalid EXPORT_MAX_ROWS: {v}")))?,
            None => defaults.max_rows,
        };
        Ok(Self {
            output_dir: env_opt("EXPORT_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            page_size,
            orientation,
            max_rows,
        })
    }
}

/// Process-wide configuration, read from the environment exactly once at
/// startup and passed by reference into each component. No component reads
/// ambient environment state directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub databricks: DatabricksConfig,
    pub smtp: SmtpConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            databricks: DatabricksConfig::from_env(),
            smtp: SmtpConfig::from_env(),
            export: ExportConfig::from_env()?,
        })
    }

    /// Returns every configuration problem at once rather than failing on
    /// the first, so an operator can fix their environment in one round.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.databricks.warehouse_id.is_empty() {
            errors.push("DATABRICKS_WAREHOUSE_ID is required".to_string());
        }
        if self.databricks.host.is_none() {
            errors.push("DATABRICKS_HOST is required".to_string());
        }
        if self.databricks.token.is_none() {
            errors.push("DATABRICKS_TOKEN is required".to_string());
        }

        if self.smtp.host.is_empty() {
            errors.push("SMTP_HOST is required".to_string());
        }
        if self.smtp.user.is_empty() {
            errors.push("SMTP_USER is required".to_string());
        }
        if self.smtp.password.is_empty() {
            errors.push("SMTP_PASSWORD is required".to_string());
        }
        if self.smtp.from_email.is_empty() {
            errors.push("FROM_EMAIL is required".to_string());
        }

        if self.export.max_rows == 0 {
            errors.push("EXPORT_MAX_ROWS must be greater than zero".to_string());
        }

        errors
    }
}
