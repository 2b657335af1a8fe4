use crate::config::AppConfig;
use crate::error::{ExportError, Result};
use crate::mail::{AttachmentRef, EmailMessage, MailTransport, SmtpMailer};
use crate::query::{DatabricksRunner, QueryExecutor, QueryResult};
use crate::render::{RenderConfig, RenderedDocument, TableRenderer};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

const ARTIFACT_PREFIX: &str = "dashboard_export";

/// Sequences the pipeline: execute query, render PDF, send email. Strictly
/// linear; the first failing step's error propagates verbatim and nothing
/// downstream of it runs. A PDF rendered before a mail failure is left on
/// disk as a recoverable artifact.
pub struct Exporter {
    config: AppConfig,
    executor: Box<dyn QueryExecutor>,
    mailer: Box<dyn MailTransport>,
    renderer: TableRenderer,
}

impl Exporter {
    pub fn new(config: AppConfig) -> Result<Self> {
        let executor = Box::new(DatabricksRunner::new(&config.databricks)?);
        let mailer = Box::new(SmtpMailer::new(&config.smtp)?);
        Ok(Self::with_parts(config, executor, mailer))
    }

    /// Wires explicit executor and mailer implementations, used by tests
    /// to run the pipeline against synthetic collaborators.
    pub fn with_parts(
        config: AppConfig,
        executor: Box<dyn QueryExecutor>,
        mailer: Box<dyn MailTransport>,
    ) -> Self {
        Self {
            config,
            executor,
            mailer,
            renderer: TableRenderer::new(),
        }
    }

    pub async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        self.executor.execute(sql, self.config.export.max_rows).await
    }

    pub fn render_pdf(
        &self,
        data: &QueryResult,
        output_path: impl AsRef<Path>,
        render_config: &RenderConfig,
    ) -> Result<RenderedDocument> {
        self.renderer.render(data, output_path, render_config)
    }

    pub async fn send_email(&self, message: &EmailMessage) -> Result<()> {
        self.mailer.send(message).await
    }

    /// Query-and-render without the email step, for manual distribution.
    pub async fn export_pdf(&self, sql: &str, title: &str) -> Result<PathBuf> {
        let (_, document, _) = self.query_and_render(sql, title).await?;
        Ok(document.path)
    }

    /// The end-to-end operation. Returns the rendered artifact's path; the
    /// file stays on disk regardless of whether the email step succeeds.
    pub async fn export_and_email(
        &self,
        sql: &str,
        to: Vec<String>,
        cc: Vec<String>,
        subject: &str,
        title: &str,
    ) -> Result<PathBuf> {
        let (data, document, generated) = self.query_and_render(sql, title).await?;

        let message = EmailMessage {
            to,
            cc,
            subject: subject.to_string(),
            body: report_body(title, &data, &generated),
            attachment: Some(AttachmentRef::pdf(&document.path)),
        };
        self.send_email(&message).await?;

        Ok(document.path)
    }

    async fn query_and_render(
        &self,
        sql: &str,
        title: &str,
    ) -> Result<(QueryResult, RenderedDocument, String)> {
        let data = self.execute_query(sql).await?;
        info!(
            rows = data.row_count(),
            columns = data.column_count(),
            truncated = data.truncated(),
            "Query complete"
        );

        let now = Local::now();
        let generated = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let output_dir = PathBuf::from(&self.config.export.output_dir);
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            ExportError::Render(format!(
                "cannot create output directory {}: {e}",
                output_dir.display()
            ))
        })?;
        let filename = format!("{ARTIFACT_PREFIX}_{}.pdf", now.format("%Y%m%d_%H%M%S"));
        let output_path = output_dir.join(filename);

        let render_config = RenderConfig {
            page_size: self.config.export.page_size,
            orientation: self.config.export.orientation,
            title: title.to_string(),
            subtitle: Some(format!("Generated: {generated}")),
            ..RenderConfig::default()
        };
        let document = self.render_pdf(&data, &output_path, &render_config)?;
        info!(path = %document.path.display(), pages = document.page_count, "Render complete");

        Ok((data, document, generated))
    }
}

fn report_body(title: &str, data: &QueryResult, generated: &str) -> String {
    let truncation_note = if data.truncated() {
        "\n- Note: the result was truncated at the configured row limit"
    } else {
        ""
    };
    format!(
        "Hello,\n\n\
         Please find attached the dashboard export report: {title}\n\n\
         Report Details:\n\
         - Generated: {generated}\n\
         - Total Rows: {rows}\n\
         - Columns: {cols}{truncation_note}\n\n\
         This is an automated report generated from a Databricks SQL Warehouse.\n",
        rows = data.row_count(),
        cols = data.column_count(),
    )
}
