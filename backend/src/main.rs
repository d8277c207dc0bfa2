//! Datasweep CLI - Inspect, clean and convert CSV/Excel files
//!
//! # Commands
//!
//! ```bash
//! datasweep serve                              # Start HTTP server (port 3000)
//! datasweep inspect data.csv                   # Metadata and first rows
//! datasweep convert data.csv --to excel        # Convert to data.xlsx
//! datasweep convert data.XLSX --to csv --dedupe --fill-missing --columns id,val
//! datasweep chart data.csv                     # Bar chart data as JSON
//! ```

use clap::{Args, Parser, Subcommand};
use datasweep::{
    bar_chart, prepare_table, preview, process_file, CleaningOptions, ColumnSelection,
    ConversionRequest, FileControls, FileMetadata, FileStatus, ServerConfig, TargetFormat,
    UploadedFile,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datasweep")]
#[command(about = "Clean, chart and convert CSV/Excel files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show file metadata and the first rows
    Inspect {
        /// Input CSV or Excel file
        input: PathBuf,
    },

    /// Clean, project and convert a file
    Convert {
        /// Input CSV or Excel file
        input: PathBuf,

        /// Target format: csv or excel
        #[arg(short, long)]
        to: TargetFormat,

        #[command(flatten)]
        cleaning: CleaningArgs,

        /// Output file (default: input name with the target extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print bar chart data for the first two numeric columns
    Chart {
        /// Input CSV or Excel file
        input: PathBuf,

        #[command(flatten)]
        cleaning: CleaningArgs,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: DATASWEEP_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Cleaning and selection flags shared by `convert` and `chart`.
#[derive(Args)]
struct CleaningArgs {
    /// Remove exact duplicate rows
    #[arg(long)]
    dedupe: bool,

    /// Fill missing numeric values with the column mean
    #[arg(long)]
    fill_missing: bool,

    /// Keep only these columns (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    columns: Option<Vec<String>>,
}

impl CleaningArgs {
    fn controls(self) -> FileControls {
        FileControls {
            cleaning: CleaningOptions {
                remove_duplicates: self.dedupe,
                fill_missing_numeric: self.fill_missing,
            },
            columns: ColumnSelection(self.columns),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { input } => cmd_inspect(&input),

        Commands::Convert {
            input,
            to,
            cleaning,
            output,
        } => cmd_convert(&input, to, cleaning.controls(), output.as_deref()),

        Commands::Chart { input, cleaning } => cmd_chart(&input, cleaning.controls()),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn read_input(input: &Path) -> Result<UploadedFile, Box<dyn std::error::Error>> {
    UploadedFile::from_path(input).map_err(|e| format!("Cannot read {}: {}", input.display(), e).into())
}

fn cmd_inspect(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());

    let file = read_input(input)?;
    let (format, table) = datasweep::parse_upload(&file)?;
    let meta = FileMetadata::describe(&file, &table);

    eprintln!("   Format: {:?}", format);
    eprintln!("   Size: {}", meta.size_kb);
    eprintln!("   Rows: {}", meta.row_count);
    eprintln!("   Columns:");
    for column in &meta.columns {
        eprintln!("     - {} ({:?})", column.name, column.kind);
    }

    println!("\t{}", table.column_names().join("\t"));
    for row in preview(&table) {
        let cells: Vec<String> = row.cells.iter().map(|c| c.to_string()).collect();
        println!("{}\t{}", row.index, cells.join("\t"));
    }

    Ok(())
}

fn cmd_convert(
    input: &Path,
    to: TargetFormat,
    mut controls: FileControls,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let file = read_input(input)?;
    controls.convert = Some(ConversionRequest { target_format: to });

    let outcome = process_file(&file, &controls);
    if let Some(meta) = &outcome.metadata {
        eprintln!("   Rows: {}", meta.row_count);
    }
    if outcome.status != FileStatus::Processed {
        return Err(outcome.error.unwrap_or_else(|| "Conversion failed".into()).into());
    }

    eprintln!("   Columns: {}", outcome.selected_columns.join(", "));

    let artifact = outcome.artifact.ok_or("No artifact produced")?;
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => input.with_file_name(&artifact.filename),
    };
    fs::write(&path, &artifact.data)?;
    eprintln!("💾 Output written to: {} ({})", path.display(), artifact.mime_type);

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_chart(input: &Path, controls: FileControls) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📊 Charting: {}", input.display());

    let file = read_input(input)?;
    let table = prepare_table(&file, &controls)?;
    let chart = bar_chart(&table)?;

    eprintln!(
        "   Series: {}",
        chart.series.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    eprintln!("   Bars: {}", chart.x.len());

    println!("{}", serde_json::to_string_pretty(&chart)?);
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env().with_port(port);
    datasweep::server::start_server(config).await
}
