//! felling CLI - tree-felling permit bulletin extraction tool

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use felling::config::{DEFAULT_S3_REGION, DEFAULT_SOURCE_URL};
use felling::{
    assemble, AssembleOptions, ArchiveConfig, ColumnarWriter, Config, FileSource, GeocodingConfig,
    PageSelection, ParquetWriter, ParseOptions, PdfDocument, Pipeline, ProgressEvent, ProxyConfig,
    RecordWriter, Recordset, RunSummary, S3Config, SpreadsheetWriter, Stage, XlsxWriter,
};

#[derive(Parser)]
#[command(name = "felling")]
#[command(version)]
#[command(about = "Fetch the Haifa tree-felling permit bulletin and export its tables", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, parse, export and optionally enrich and archive (default)
    Run(RunArgs),

    /// Parse a local bulletin and print its records
    Records {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Page range (e.g., "1-10", "1,3,5")
        #[arg(long)]
        pages: Option<String>,

        /// Skip rows whose cell count does not match the header
        #[arg(long)]
        skip_bad_rows: bool,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Fetch and parse even if a previous export exists
    #[arg(long)]
    download: bool,

    /// Do not write the Excel export
    #[arg(long)]
    no_spreadsheet: bool,

    /// Geocode permit addresses (needs GCP_API_KEY)
    #[arg(long)]
    enrich: bool,

    /// Copy outputs to the archive
    #[arg(long)]
    upload: bool,

    /// Archive root directory
    #[arg(long, value_name = "DIR", env = "FELLING_ARCHIVE_ROOT", conflicts_with = "s3_bucket")]
    archive_root: Option<PathBuf>,

    /// S3 bucket to archive into (needs AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY)
    #[arg(long, value_name = "BUCKET")]
    s3_bucket: Option<String>,

    /// S3-compatible endpoint, e.g. a local MinIO
    #[arg(long, value_name = "URL", env = "AWS_FAKE_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// S3 region
    #[arg(long, value_name = "REGION", env = "AWS_REGION", default_value = DEFAULT_S3_REGION)]
    s3_region: String,

    /// Key prefix inside the archive
    #[arg(long, value_name = "PREFIX", alias = "s3-path")]
    archive_prefix: Option<String>,

    /// Fetch through the scraping proxy from this country (needs SCRAPINGBEE_API_KEY)
    #[arg(long, value_name = "CC")]
    proxy_country: Option<String>,

    /// Directory receiving the PDF and exports
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Bulletin URL
    #[arg(long, default_value = DEFAULT_SOURCE_URL)]
    url: String,

    /// Read the bulletin from a local file instead of the URL
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Skip rows whose cell count does not match the header
    #[arg(long)]
    skip_bad_rows: bool,

    /// Also drop rows that repeat the header on later pages
    #[arg(long)]
    skip_repeated_headers: bool,

    /// Page range (e.g., "1-10", "1,3,5")
    #[arg(long)]
    pages: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    #[arg(long, env = "SCRAPINGBEE_API_KEY", hide_env_values = true, hide = true)]
    scrapingbee_api_key: Option<String>,

    #[arg(long, env = "GCP_API_KEY", hide_env_values = true, hide = true)]
    gcp_api_key: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true, hide = true)]
    aws_access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true, hide = true)]
    aws_secret_access_key: Option<String>,

    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true, hide = true)]
    aws_session_token: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Records as a JSON array of objects
    Json,
    /// Column-major JSON, as written by a run
    Columnar,
    /// CSV with a header line
    Csv,
    /// Parquet, as written by a run (needs --output)
    Parquet,
    /// Excel workbook (needs --output)
    Xlsx,
}

impl OutputFormat {
    fn is_binary(self) -> bool {
        matches!(self, OutputFormat::Parquet | OutputFormat::Xlsx)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Run(args)) => cmd_run(args, cli.verbose),
        Some(Commands::Records {
            input,
            output,
            format,
            pages,
            skip_bad_rows,
        }) => cmd_records(
            &input,
            output.as_deref(),
            format,
            pages.as_deref(),
            skip_bad_rows,
        ),
        Some(Commands::Info { input }) => cmd_info(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => cmd_run(cli.run, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn page_selection(pages: Option<&str>) -> Result<PageSelection, Box<dyn std::error::Error>> {
    match pages {
        Some(p) => Ok(PageSelection::parse(p).map_err(|e| format!("Invalid page range: {}", e))?),
        None => Ok(PageSelection::All),
    }
}

fn assemble_options(skip_bad_rows: bool, skip_repeated_headers: bool) -> AssembleOptions {
    let options = AssembleOptions::new().with_skip_repeated_headers(skip_repeated_headers);
    if skip_bad_rows {
        options.skip_bad_rows()
    } else {
        options
    }
}

fn s3_config(args: &RunArgs) -> Option<S3Config> {
    args.s3_bucket.as_ref().map(|bucket| S3Config {
        bucket: bucket.clone(),
        region: args.s3_region.clone(),
        endpoint: args.s3_endpoint.clone(),
        access_key_id: args.aws_access_key_id.clone(),
        secret_access_key: args.aws_secret_access_key.clone(),
        session_token: args.aws_session_token.clone(),
    })
}

fn build_config(args: &RunArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::new()
        .with_source_url(args.url.clone())
        .with_proxy(ProxyConfig {
            api_key: args.scrapingbee_api_key.clone(),
            country_code: args.proxy_country.clone(),
            premium: true,
        })
        .with_geocoding(GeocodingConfig {
            api_key: args.gcp_api_key.clone(),
            ..GeocodingConfig::default()
        })
        .with_archive(ArchiveConfig {
            root: args.archive_root.clone(),
            s3: s3_config(args),
            prefix: args.archive_prefix.clone(),
        })
        .with_parse_options(ParseOptions::new().with_pages(page_selection(args.pages.as_deref())?))
        .with_assemble_options(assemble_options(args.skip_bad_rows, args.skip_repeated_headers))
        // A local input always replaces any previous export.
        .with_force_download(args.download || args.input.is_some())
        .with_spreadsheet(!args.no_spreadsheet)
        .with_enrich(args.enrich)
        .with_upload(args.upload);

    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir.clone());
    }
    Ok(config)
}

fn cmd_run(args: RunArgs, verbose: u8) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    fs::create_dir_all(&config.output_dir)?;
    log::info!("Output directory: {}", config.output_dir.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let bar = pb.clone();
    let mut pipeline = Pipeline::new(config)?.with_progress(move |event| match event {
        ProgressEvent::Stage(stage) => {
            bar.set_position(0);
            bar.set_length(0);
            bar.set_message(stage_message(stage));
        }
        ProgressEvent::Page { done, total } | ProgressEvent::Geocoded { done, total } => {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        }
    });
    if let Some(input) = &args.input {
        pipeline = pipeline.with_source(FileSource::new(input));
    }

    let output_dir = pipeline.config().output_dir.clone();
    let output = pipeline.run();
    pb.finish_and_clear();
    let output = output?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output.summary)?);
    } else {
        print_summary(&output.summary, &output_dir);
        if verbose > 0 {
            print_preview(&output.recordset);
        }
    }
    Ok(())
}

const PREVIEW_ROWS: usize = 5;

fn print_preview(recordset: &Recordset) {
    if recordset.is_empty() {
        return;
    }
    println!("\n{}", "Preview".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}", recordset.schema().columns().join(" | ").bold());
    for record in recordset.iter().take(PREVIEW_ROWS) {
        println!("{}", record.values().join(" | "));
    }
    if recordset.len() > PREVIEW_ROWS {
        println!("{}", format!("... {} more", recordset.len() - PREVIEW_ROWS).dimmed());
    }
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Fetching => "Fetching bulletin...",
        Stage::ReadingCache => "Reading previous export...",
        Stage::Parsing => "Parsing tables...",
        Stage::Enriching => "Geocoding addresses...",
        Stage::Writing => "Writing exports...",
        Stage::Archiving => "Archiving...",
    }
}

fn print_summary(summary: &RunSummary, output_dir: &Path) {
    println!("{}", "Run Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "Records".bold(), summary.records);
    if summary.reused_cache {
        println!("{}: {}", "Source".bold(), "previous export".yellow());
    } else {
        println!("{}: {}", "Pages".bold(), summary.pages);
        println!("{}: {}", "Tables".bold(), summary.tables);
    }
    if summary.page_errors > 0 {
        println!("{}: {}", "Page errors".bold(), summary.page_errors.to_string().red());
    }
    if summary.skipped_rows > 0 {
        println!("{}: {}", "Skipped rows".bold(), summary.skipped_rows.to_string().yellow());
    }
    if summary.enrichment_failures > 0 {
        println!(
            "{}: {}",
            "Geocoding misses".bold(),
            summary.enrichment_failures.to_string().yellow()
        );
    }
    println!("{}: {}", "Output".bold(), output_dir.display());

    if !summary.archived.is_empty() {
        println!("\n{}", "Archived:".green().bold());
        let last = summary.archived.len() - 1;
        for (i, key) in summary.archived.iter().enumerate() {
            let branch = if i == last { "└─" } else { "├─" };
            println!("  {} {}", branch.dimmed(), key);
        }
    }
}

fn cmd_records(
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    pages: Option<&str>,
    skip_bad_rows: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if format.is_binary() && output.is_none() {
        return Err("binary formats need --output".into());
    }

    let options = ParseOptions::new().with_pages(page_selection(pages)?);
    let document = PdfDocument::open_path(input, options)?;
    let (recordset, stats) =
        assemble(document, assemble_options(skip_bad_rows, false)).collect_recordset()?;

    let mut buffer = Vec::new();
    match format {
        OutputFormat::Json => serde_json::to_writer_pretty(&mut buffer, recordset.records())?,
        OutputFormat::Columnar => ColumnarWriter.write_to(&recordset, &mut buffer)?,
        OutputFormat::Parquet => ParquetWriter.write_to(&recordset, &mut buffer)?,
        OutputFormat::Xlsx => XlsxWriter.write_to(&recordset, &mut buffer)?,
        OutputFormat::Csv => SpreadsheetWriter::new()
            .with_bom(output.is_some())
            .write_to(&recordset, &mut buffer)?,
    }

    if let Some(path) = output {
        fs::write(path, &buffer)?;
        println!(
            "{} {} ({} records, {} page errors)",
            "Saved to".green(),
            path.display(),
            stats.records,
            stats.page_errors
        );
    } else {
        io::Write::write_all(&mut io::stdout().lock(), &buffer)?;
        println!();
    }

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let document = PdfDocument::open_path(input, ParseOptions::default())?;
    let metadata = document.metadata().clone();

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), metadata.pdf_version);
    println!("{}: {}", "Pages".bold(), metadata.page_count);

    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref producer) = metadata.producer {
        println!("{}: {}", "Producer".bold(), producer);
    }
    if let Some(ref created) = metadata.created {
        println!("{}: {}", "Published".bold(), created);
    }
    if let Some(ref modified) = metadata.modified {
        println!("{}: {}", "Modified".bold(), modified);
    }

    let mut records = assemble(document, AssembleOptions::new().skip_bad_rows());
    let mut failed = None;
    for record in records.by_ref() {
        if let Err(e) = record {
            failed = Some(e);
        }
    }
    let stats = *records.stats();

    println!();
    println!("{}", "Table Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    if let Some(header) = records.header() {
        println!("{}: {}", "Columns".bold(), header.join(" | "));
    }
    println!("{}: {}", "Tables".bold(), stats.tables);
    println!("{}: {}", "Records".bold(), stats.records);
    println!("{}: {}", "Skipped rows".bold(), stats.skipped_rows);
    println!("{}: {}", "Page errors".bold(), stats.page_errors);
    if let Some(e) = failed {
        println!("{}: {}", "Stopped".red().bold(), e);
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "felling".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Tree-felling permit bulletin extraction tool");
    println!();
    println!("Source: {}", DEFAULT_SOURCE_URL.dimmed());
    println!("License: MIT");
}
