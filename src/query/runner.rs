use crate::config::DatabricksConfig;
use crate::error::{ExportError, Result};
use crate::query::{CellValue, Column, QueryResult};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";
const INLINE_WAIT_TIMEOUT: &str = "30s";
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Seam between the orchestrator and the warehouse, so exports can run
/// against a synthetic executor in tests.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, max_rows: u64) -> Result<QueryResult>;
}

/// Client for the Databricks SQL Statement Execution API. Submits one
/// statement, waits for completion, and converts the inline JSON_ARRAY
/// result into a [`QueryResult`]. No local retry; the first failure is
/// surfaced to the caller in its own domain.
pub struct DatabricksRunner {
    client: reqwest::Client,
    host: String,
    token: String,
    warehouse_id: String,
}

impl DatabricksRunner {
    pub fn new(config: &DatabricksConfig) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| ExportError::Config("DATABRICKS_HOST is required".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let token = config
            .token
            .as_deref()
            .ok_or_else(|| ExportError::Config("DATABRICKS_TOKEN is required".to_string()))?
            .to_string();
        Ok(Self {
            client: reqwest::Client::new(),
            host,
            token,
            warehouse_id: config.warehouse_id.clone(),
        })
    }

    async fn submit(&self, sql: &str, max_rows: u64) -> Result<StatementResponse> {
        let url = format!("{}{}", self.host, STATEMENTS_PATH);
        let body = json!({
            "warehouse_id": self.warehouse_id,
            "statement": sql,
            "format": "JSON_ARRAY",
            "disposition": "INLINE",
            "wait_timeout": INLINE_WAIT_TIMEOUT,
            "row_limit": max_rows,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(classify_http_error)?;
        decode_http_response(response).await
    }

    async fn poll(&self, statement_id: &str) -> Result<StatementResponse> {
        let url = format!("{}{}/{}", self.host, STATEMENTS_PATH, statement_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(classify_http_error)?;
        decode_http_response(response).await
    }
}

#[async_trait]
impl QueryExecutor for DatabricksRunner {
    async fn execute(&self, sql: &str, max_rows: u64) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(ExportError::QueryExecution(
                "statement text is empty".to_string(),
            ));
        }
        if max_rows == 0 {
            return Err(ExportError::QueryExecution(
                "max_rows must be greater than zero".to_string(),
            ));
        }

        info!(warehouse_id = %self.warehouse_id, "Submitting statement");
        let mut response = self.submit(sql, max_rows).await?;

        // The inline wait window covers most statements; anything still
        // running afterwards is polled to completion.
        while response.status.is_running() {
            debug!(statement_id = %response.statement_id, state = %response.status.state, "Statement still running");
            tokio::time::sleep(POLL_INTERVAL).await;
            response = self.poll(&response.statement_id).await?;
        }

        let result = into_query_result(response)?;
        info!(
            rows = result.row_count(),
            truncated = result.truncated(),
            "Statement finished"
        );
        Ok(result)
    }
}

fn classify_http_error(err: reqwest::Error) -> ExportError {
    ExportError::Transport(err.to_string())
}

async fn decode_http_response(response: reqwest::Response) -> Result<StatementResponse> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ExportError::Authentication(format!(
            "warehouse rejected credentials (HTTP {status})"
        )));
    }
    if status.is_server_error() {
        return Err(ExportError::Transport(format!(
            "warehouse unavailable (HTTP {status})"
        )));
    }
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(ExportError::QueryExecution(format!(
            "statement rejected (HTTP {status}): {detail}"
        )));
    }
    response
        .json::<StatementResponse>()
        .await
        .map_err(|e| ExportError::Transport(format!("malformed statement response: {e}")))
}

/// Converts a terminal statement response into a validated result table.
fn into_query_result(response: StatementResponse) -> Result<QueryResult> {
    match response.status.state.as_str() {
        "SUCCEEDED" => {}
        state => {
            let detail = response
                .status
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "no error detail provided".to_string());
            return Err(ExportError::QueryExecution(format!(
                "statement finished in state {state}: {detail}"
            )));
        }
    }

    let manifest = response.manifest.unwrap_or_default();
    let columns: Vec<Column> = manifest
        .schema
        .columns
        .into_iter()
        .map(|c| Column::new(c.name, c.type_name))
        .collect();

    let data = response
        .result
        .map(|r| r.data_array)
        .unwrap_or_default();
    if data.is_empty() {
        warn!("Statement returned no rows");
    }

    let rows: Vec<Vec<CellValue>> = data
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(i, raw)| {
                    let type_name = columns.get(i).map(|c| c.type_name.as_str()).unwrap_or("");
                    typed_cell(raw, type_name)
                })
                .collect()
        })
        .collect();

    QueryResult::new(columns, rows, manifest.truncated)
}

/// Types a raw JSON_ARRAY cell by its column's declared type. Numeric text
/// is kept verbatim; anything unparseable falls back to text rather than
/// failing the whole export.
fn typed_cell(raw: Option<String>, type_name: &str) -> CellValue {
    let Some(text) = raw else {
        return CellValue::Null;
    };
    let upper = type_name.to_ascii_uppercase();
    if upper == "BOOLEAN" {
        return match text.as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => CellValue::Text(text),
        };
    }
    if matches!(
        upper.as_str(),
        "TINYINT" | "SMALLINT" | "INT" | "BIGINT" | "LONG" | "FLOAT" | "DOUBLE"
    ) || upper.starts_with("DECIMAL")
    {
        return CellValue::Number(text);
    }
    if upper.starts_with("TIMESTAMP") {
        if let Some(ts) = parse_timestamp(&text) {
            return CellValue::Timestamp(ts);
        }
    }
    CellValue::Text(text)
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<ResultManifest>,
    #[serde(default)]
    result: Option<ResultData>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<StatementError>,
}

impl StatementStatus {
    fn is_running(&self) -> bool {
        matches!(self.state.as_str(), "PENDING" | "RUNNING")
    }
}

#[derive(Debug, Deserialize)]
struct StatementError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultManifest {
    #[serde(default)]
    schema: ResultSchema,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ResultSchema {
    #[serde(default)]
    columns: Vec<SchemaColumn>,
}

#[derive(Debug, Deserialize)]
struct SchemaColumn {
    name: String,
    type_name: String,
}

#[derive(Debug, Deserialize)]
struct ResultData {
    #[serde(default)]
    data_array: Vec<Vec<Option<String>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS_FIXTURE: &str = r#"{
        "statement_id": "01ef-abc",
        "status": { "state": "SUCCEEDED" },
        "manifest": {
            "schema": { "columns": [
                { "name": "id", "type_name": "BIGINT", "position": 0 },
                { "name": "name", "type_name": "STRING", "position": 1 },
                { "name": "active", "type_name": "BOOLEAN", "position": 2 },
                { "name": "seen_at", "type_name": "TIMESTAMP", "position": 3 }
            ]},
            "total_row_count": 2,
            "truncated": false
        },
        "result": { "data_array": [
            ["1", "alpha", "true", "2024-03-09T14:30:05.000Z"],
            ["2", null, "false", null]
        ]}
    }"#;

    #[test]
    fn test_into_query_result_types_cells_by_column() {
        let response: StatementResponse = serde_json::from_str(SUCCESS_FIXTURE).unwrap();
        let result = into_query_result(response).unwrap();

        assert_eq!(result.column_count(), 4);
        assert_eq!(result.row_count(), 2);
        assert!(!result.truncated());

        let first = &result.rows()[0];
        assert_eq!(first[0], CellValue::Number("1".into()));
        assert_eq!(first[1], CellValue::Text("alpha".into()));
        assert_eq!(first[2], CellValue::Bool(true));
        assert!(matches!(first[3], CellValue::Timestamp(_)));

        let second = &result.rows()[1];
        assert_eq!(second[1], CellValue::Null);
        assert_eq!(second[3], CellValue::Null);
    }

    #[test]
    fn test_into_query_result_truncated_flag_carries_through() {
        let raw = SUCCESS_FIXTURE.replace("\"truncated\": false", "\"truncated\": true");
        let response: StatementResponse = serde_json::from_str(&raw).unwrap();
        let result = into_query_result(response).unwrap();
        assert!(result.truncated());
    }

    #[test]
    fn test_into_query_result_failed_state_is_query_error() {
        let response: StatementResponse = serde_json::from_str(
            r#"{
                "statement_id": "01ef-def",
                "status": {
                    "state": "FAILED",
                    "error": { "error_code": "SYNTAX_ERROR", "message": "mismatched input" }
                }
            }"#,
        )
        .unwrap();
        let err = into_query_result(response).unwrap_err();
        assert!(matches!(err, ExportError::QueryExecution(_)));
        assert!(err.to_string().contains("mismatched input"));
    }

    #[test]
    fn test_into_query_result_empty_result_is_valid() {
        let response: StatementResponse = serde_json::from_str(
            r#"{
                "statement_id": "01ef-ghi",
                "status": { "state": "SUCCEEDED" },
                "manifest": { "schema": { "columns": [
                    { "name": "id", "type_name": "BIGINT", "position": 0 }
                ]}, "truncated": false }
            }"#,
        )
        .unwrap();
        let result = into_query_result(response).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.column_count(), 1);
    }

    #[test]
    fn test_typed_cell_decimal_preserves_text() {
        let cell = typed_cell(Some("1500.00".to_string()), "DECIMAL(10,2)");
        assert_eq!(cell, CellValue::Number("1500.00".into()));
    }

    #[test]
    fn test_typed_cell_unparseable_timestamp_falls_back_to_text() {
        let cell = typed_cell(Some("not-a-time".to_string()), "TIMESTAMP");
        assert_eq!(cell, CellValue::Text("not-a-time".into()));
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_statement() {
        let runner = DatabricksRunner::new(&crate::config::DatabricksConfig {
            warehouse_id: "wh".to_string(),
            host: Some("https://example.cloud.databricks.com".to_string()),
            token: Some("dapi-test".to_string()),
        })
        .unwrap();
        let err = runner.execute("   ", 10).await.unwrap_err();
        assert!(matches!(err, ExportError::QueryExecution(_)));
    }

    #[tokio::test]
    async fn test_execute_rejects_zero_max_rows() {
        let runner = DatabricksRunner::new(&crate::config::DatabricksConfig {
            warehouse_id: "wh".to_string(),
            host: Some("https://example.cloud.databricks.com".to_string()),
            token: Some("dapi-test".to_string()),
        })
        .unwrap();
        let err = runner.execute("SELECT 1", 0).await.unwrap_err();
        assert!(matches!(err, ExportError::QueryExecution(_)));
    }
}
