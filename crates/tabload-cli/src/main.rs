//! tabload CLI - load delimited text, CSV, and Excel data into ClickHouse.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use tabload::{
    ClickHouseWriter, DestinationConfig, LoadConfig, LoadError, Loader, RangeBound, SourceFormat,
    SourceSpec,
};

#[derive(Parser)]
#[command(name = "tabload")]
#[command(about = "Load delimited text, CSV, and Excel data into ClickHouse")]
#[command(version)]
struct Cli {
    /// Source of data: a file path or a web address
    #[arg(short, long)]
    source: String,

    /// Source format: text (tab delimited), csv, xlsx, or xls
    #[arg(short, long, value_parser = parse_format)]
    format: SourceFormat,

    /// Destination ClickHouse table
    #[arg(short, long)]
    table: String,

    /// ClickHouse HTTP endpoint
    #[arg(long, default_value = "http://127.0.0.1:8123")]
    url: String,

    /// ClickHouse user
    #[arg(long, default_value = "default")]
    user: String,

    /// ClickHouse password
    #[arg(long, default_value = "")]
    password: String,

    /// ClickHouse database
    #[arg(long, default_value = "default")]
    database: String,

    /// Comma-separated field names; read from the data when omitted
    #[arg(long)]
    headers: Option<String>,

    /// Comma-separated field types (s, i, f, d); inferred when omitted
    #[arg(long)]
    types: Option<String>,

    /// Convert field names to camelCase
    #[arg(long)]
    camel: bool,

    /// Store field names lower-cased
    #[arg(long)]
    lowercase_names: bool,

    /// Quote character for delimited text
    #[arg(short, long, default_value_t = '"')]
    quote: char,

    /// Rows to skip at the beginning of the source
    #[arg(long, default_value_t = 0)]
    skip: usize,

    /// Skip and count bad rows instead of aborting
    #[arg(short = 'i', long)]
    skip_bad_rows: bool,

    /// Date pattern (chrono syntax) for parsing date fields
    #[arg(long)]
    date_format: Option<String>,

    /// Rows per insert batch; 0 writes a single batch
    #[arg(long, default_value_t = 1000)]
    batch_size: usize,

    /// Sheet name for Excel inputs; the first sheet when omitted
    #[arg(long)]
    sheet: Option<String>,

    /// Start:end row range for Excel inputs, 0-based; end 0 takes all rows
    #[arg(long, default_value = "0:0", value_parser = parse_range)]
    rows: RangeBound,

    /// Start:end column range for Excel inputs, 0-based; end 0 takes all columns
    #[arg(long, default_value = "0:0", value_parser = parse_range)]
    cols: RangeBound,

    /// Print the run report as JSON
    #[arg(long)]
    output_json: bool,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn parse_format(s: &str) -> Result<SourceFormat, String> {
    s.parse::<SourceFormat>().map_err(|e| e.to_string())
}

fn parse_range(s: &str) -> Result<RangeBound, String> {
    s.parse::<RangeBound>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), LoadError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)?;

    let config = build_config(&cli)?;
    info!(
        "loading {} ({}) into table {}",
        config.source.location, config.source.format, config.table
    );

    let writer = Arc::new(ClickHouseWriter::new(config.destination.clone()));
    let report = Loader::new(config, writer).run().await?;

    if cli.output_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| LoadError::Config(e.to_string()))?
        );
    } else {
        println!("\nLoad completed!");
        println!("  Table: {}", report.table);
        println!("  Columns: {}", report.columns);
        println!("  Rows: {}", report.rows_written);
        if cli.skip_bad_rows {
            println!("  Rows skipped: {}", report.rows_skipped);
        }
        let secs = report.duration_seconds as u64;
        println!("  Elapsed time: {} minutes {} seconds", secs / 60, secs % 60);
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<LoadConfig, LoadError> {
    if !cli.quote.is_ascii() {
        return Err(LoadError::Config(format!(
            "quote must be a single ASCII character, got {:?}",
            cli.quote
        )));
    }

    let mut source = SourceSpec::new(cli.source.clone(), cli.format);
    source.quote = cli.quote as u8;
    source.skip = cli.skip;
    source.sheet = cli.sheet.clone();
    source.rows = cli.rows;
    source.cols = cli.cols;

    let destination = DestinationConfig {
        url: cli.url.clone(),
        user: cli.user.clone(),
        password: cli.password.clone(),
        database: cli.database.clone(),
    };

    let mut config = LoadConfig::new(source, destination, cli.table.clone());
    config.naming.camel = cli.camel;
    config.naming.lowercase = cli.lowercase_names;
    config.headers = cli.headers.as_deref().map(parse_list);
    config.types = cli.types.as_deref().map(parse_list);
    config.date_format = cli.date_format.clone();
    config.batch_size = cli.batch_size;
    config.skip_bad_rows = cli.skip_bad_rows;

    // Fail on bad combinations before touching the source or destination.
    config.validate()?;
    Ok(config)
}

/// Split a comma-separated flag value, tolerating stray spaces and single
/// quotes around the list.
fn parse_list(raw: &str) -> Vec<String> {
    raw.replace('\'', "")
        .split(',')
        .map(|part| part.trim().to_string())
        .collect()
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), LoadError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
