use clap::Parser;
use dashex::{AppConfig, Exporter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Export a Databricks SQL Warehouse query result as a PDF table and email
/// it to a list of recipients. One export per invocation.
#[derive(Parser, Debug)]
#[command(name = "dashex", version, about)]
struct Cli {
    /// SQL statement to execute.
    #[arg(long, conflicts_with = "sql_file", required_unless_present = "sql_file")]
    sql: Option<String>,

    /// Read the SQL statement from a file instead.
    #[arg(long)]
    sql_file: Option<PathBuf>,

    /// Recipient address; repeat for multiple recipients.
    #[arg(long = "to")]
    to: Vec<String>,

    /// Cc address; repeat for multiple.
    #[arg(long = "cc")]
    cc: Vec<String>,

    /// Email subject line.
    #[arg(long, default_value = "Dashboard Export Report")]
    subject: String,

    /// Title printed at the top of every PDF page.
    #[arg(long, default_value = "Dashboard Export")]
    title: String,

    /// Render the PDF but skip the email step.
    #[arg(long)]
    no_email: bool,

    /// Directory for rendered PDFs.
    #[arg(long, env = "EXPORT_OUTPUT_DIR")]
    output_dir: Option<String>,

    /// Page size: LETTER or A4.
    #[arg(long, env = "EXPORT_PAGE_SIZE")]
    page_size: Option<String>,

    /// Page orientation: portrait or landscape.
    #[arg(long, env = "EXPORT_ORIENTATION")]
    orientation: Option<String>,

    /// Maximum rows retrieved from the warehouse.
    #[arg(long, env = "EXPORT_MAX_ROWS")]
    max_rows: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run(Cli::parse()).await {
        Ok(path) => {
            println!("Export complete: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(step = err.step(), "{err}");
            eprintln!("Export failed during {}: {err}", err.step());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> dashex::Result<PathBuf> {
    let mut config = AppConfig::from_env()?;
    apply_overrides(&mut config, &cli)?;

    let problems = config.validate();
    if !problems.is_empty() {
        return Err(dashex::ExportError::Config(problems.join("; ")));
    }
    if !cli.no_email && cli.to.is_empty() {
        return Err(dashex::ExportError::Config(
            "at least one --to recipient is required (or pass --no-email)".to_string(),
        ));
    }

    let sql = match (&cli.sql, &cli.sql_file) {
        (Some(sql), _) => sql.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => unreachable!("clap enforces one of --sql/--sql-file"),
    };

    let exporter = Exporter::new(config)?;

    if cli.no_email {
        return exporter.export_pdf(&sql, &cli.title).await;
    }

    exporter
        .export_and_email(&sql, cli.to.clone(), cli.cc.clone(), &cli.subject, &cli.title)
        .await
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) -> dashex::Result<()> {
    if let Some(dir) = &cli.output_dir {
        config.export.output_dir = dir.clone();
    }
    if let Some(size) = &cli.page_size {
        config.export.page_size = size.parse().map_err(dashex::ExportError::Config)?;
    }
    if let Some(orientation) = &cli.orientation {
        config.export.orientation = orientation.parse().map_err(dashex::ExportError::Config)?;
    }
    if let Some(max_rows) = cli.max_rows {
        config.export.max_rows = max_rows;
    }
    Ok(())
}
