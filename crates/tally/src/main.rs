use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use polars::prelude::{AnyValue, DataFrame};
use tally_core::config::{Period, ReportConfig};
use tally_core::fields::ExportKind;
use tally_core::ingestion::{ingest_exports, ExportInput, FileStatus};
use tally_core::mapping::{tables_for, MapperSet};
use tally_core::normalize::NormalizeOptions;
use tally_core::output::{write_frame, write_frame_by_extension, OutputFormat};
use tally_core::pivot::Dimension;
use tally_core::report::{build_report, Report, ReportOptions};
use tally_parser::{parse_export_file, HeaderRow, ParseOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sales and margin reports from accounting exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every configured export and print the sales pivot
    Report(ReportArgs),
    /// Show how a single export file is parsed and mapped
    Inspect(InspectArgs),
    /// Print the built-in column code tables
    Mappings(MappingsArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// Report configuration (falls back to TALLY_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
    /// First day of the period, YYYY-MM-DD
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day of the period, YYYY-MM-DD
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Pivot dimensions, e.g. company,item,origin
    #[arg(long, value_delimiter = ',')]
    by: Option<Vec<Dimension>>,
    /// Write the pivot to this file
    #[arg(long)]
    output: Option<PathBuf>,
    /// Output format when it cannot be inferred from the extension
    #[arg(long)]
    format: Option<OutputFormat>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    file: PathBuf,
    #[arg(long, default_value = "sales")]
    kind: ExportKind,
    /// Use this row (among non-empty rows) as the header instead of detecting it
    #[arg(long)]
    header_row: Option<usize>,
    /// Apply the mapping overrides of this configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the resolution as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct MappingsArgs {
    #[arg(long)]
    kind: Option<ExportKind>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Report(args) => handle_report(args),
        Command::Inspect(args) => handle_inspect(args),
        Command::Mappings(args) => handle_mappings(args),
    }
}

fn config_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => env::var("TALLY_CONFIG")
            .map(PathBuf::from)
            .context("--config or TALLY_CONFIG must be set"),
    }
}

fn load_config(path: &Path) -> Result<ReportConfig> {
    ReportConfig::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn resolve_period(args: &ReportArgs, configured: Option<Period>) -> Result<Option<Period>> {
    let period = match (args.start, args.end, configured) {
        (None, None, period) => period,
        (Some(start), Some(end), _) => Some(Period::new(start, end)?),
        (Some(start), None, Some(period)) => Some(Period::new(start, period.end)?),
        (None, Some(end), Some(period)) => Some(Period::new(period.start, end)?),
        _ => bail!("--start and --end must be given together when the config has no period"),
    };
    Ok(period)
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let path = config_path(args.config.clone())?;
    let mut config = load_config(&path)?;

    config.period = resolve_period(&args, config.period)?;
    if let Some(dimensions) = &args.by {
        config.pivot.dimensions = dimensions.clone();
    }
    config.validate()?;

    let mut loaded = Vec::new();
    for input in config.resolve_inputs()? {
        match fs::read(&input.path) {
            Ok(contents) => {
                let display = input.path.display().to_string();
                loaded.push((input, display, contents));
            }
            Err(err) => warn!(path = %input.path.display(), error = %err, "could not read export"),
        }
    }
    if loaded.is_empty() {
        bail!("no export files matched the configured patterns");
    }

    let inputs: Vec<ExportInput<'_>> = loaded
        .iter()
        .map(|(input, path, contents)| ExportInput {
            path,
            company: &input.company,
            kind: input.kind,
            header_row: input.header_row,
            contents,
        })
        .collect();

    let mappers = config.mappers()?;
    let batch = ingest_exports(&inputs, &mappers);
    info!(
        parsed = batch.count(FileStatus::Parsed),
        duplicates = batch.count(FileStatus::Duplicate),
        failed = batch.count(FileStatus::Failed),
        "ingestion finished"
    );

    let today = chrono::Local::now().date_naive();
    let options = ReportOptions {
        normalize: NormalizeOptions::new(today).with_period(config.period),
        pivot: config.pivot_spec(),
    };
    let report = build_report(batch, &mappers, &options)?;

    print_report(&report)?;

    if let Some(output) = &args.output {
        let format = match args.format {
            Some(format) => {
                write_frame(&report.pivot, output, format)?;
                format
            }
            None => write_frame_by_extension(&report.pivot, output)?,
        };
        println!("Pivot written to {} ({format})", output.display());
    }

    Ok(())
}

fn print_report(report: &Report) -> Result<()> {
    let mut files = new_table(vec!["file", "company", "kind", "status", "rows", "hash"]);
    for file in &report.files {
        let detail = if file.parser_attempts.is_empty() {
            file.status.as_str().to_string()
        } else {
            let reasons: Vec<String> = file
                .parser_attempts
                .iter()
                .map(|attempt| format!("{}: {}", attempt.parser, attempt.message))
                .collect();
            format!("{} ({})", file.status.as_str(), reasons.join("; "))
        };
        files.add_row(vec![
            file.path.clone(),
            file.company.clone(),
            file.kind.to_string(),
            detail,
            file.rows.to_string(),
            file.hash.chars().take(12).collect(),
        ]);
    }
    println!("{files}");

    let mut mappings = new_table(vec!["file", "company", "mapped", "missing", "unmapped columns"]);
    for entry in &report.mappings {
        let mapping = &entry.mapping;
        let total = mapping.assignments().len();
        let missing: Vec<&str> = mapping.missing().map(|field| field.canonical_name()).collect();
        mappings.add_row(vec![
            entry.path.clone(),
            entry.company.clone(),
            format!("{}/{}", total - missing.len(), total),
            missing.join(", "),
            mapping.unmapped().join(", "),
        ]);
    }
    println!("{mappings}");

    if !report.costs.is_empty() {
        println!("{}", frame_table(&report.costs.to_frame()?));
    }
    println!("{}", frame_table(&report.pivot));
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let contents =
        fs::read(&args.file).with_context(|| format!("failed to read {}", args.file.display()))?;

    let mappers = match &args.config {
        Some(path) => load_config(path)?.mappers()?,
        None => MapperSet::default(),
    };
    let mapper = mappers.for_kind(args.kind);

    let header_row = match args.header_row {
        Some(row) => HeaderRow::Fixed(row),
        None => HeaderRow::detect(mapper.header_markers()),
    };
    let export = parse_export_file(&contents, &ParseOptions::with_header_row(header_row))
        .with_context(|| format!("failed to parse {}", args.file.display()))?;
    let mapping = mapper.resolve(&export.headers);

    if args.json {
        let summary = serde_json::json!({
            "file": args.file.display().to_string(),
            "kind": args.kind,
            "format": export.source_format.to_string(),
            "header_row": export.header_row,
            "rows": export.height(),
            "hash": export.file_hash,
            "headers": export.headers,
            "mapping": mapping,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("File:       {}", args.file.display());
    println!("Format:     {}", export.source_format);
    println!("Header row: {}", export.header_row);
    println!("Data rows:  {}", export.height());
    println!("Hash:       {}", export.file_hash);

    let mut table = new_table(vec!["field", "source column", "match"]);
    for assignment in mapping.assignments() {
        table.add_row(vec![
            assignment.field.canonical_name().to_string(),
            assignment.source.clone().unwrap_or_default(),
            assignment.kind.as_str().to_string(),
        ]);
    }
    println!("{table}");

    if !mapping.unmapped().is_empty() {
        println!("Unmapped columns: {}", mapping.unmapped().join(", "));
    }
    println!("{}", frame_table(&export.df.head(Some(5))));
    Ok(())
}

fn handle_mappings(args: MappingsArgs) -> Result<()> {
    let kinds = match args.kind {
        Some(kind) => vec![kind],
        None => vec![ExportKind::Sales, ExportKind::Warehouse],
    };

    for kind in kinds {
        for mapping_table in tables_for(kind) {
            println!("{} ({})", mapping_table.name, mapping_table.kind);
            let mut table = new_table(vec!["source code", "field"]);
            for (code, field) in mapping_table.entries {
                table.add_row(vec![code.to_string(), field.canonical_name().to_string()]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn render_value(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Float64(v) => format!("{v:.2}"),
        AnyValue::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn frame_table(df: &DataFrame) -> Table {
    let header: Vec<&str> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    let mut table = new_table(header);
    let columns = df.get_columns();
    for idx in 0..df.height() {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                column
                    .get(idx)
                    .map(render_value)
                    .unwrap_or_default()
            })
            .collect();
        table.add_row(row);
    }
    table
}
