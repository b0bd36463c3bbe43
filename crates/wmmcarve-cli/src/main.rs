//! wmmcarve - Recover data from damaged Windows Movie Maker projects
//!
//! This tool finds `.MSWMM` project files in a folder tree, carves the JFIF
//! thumbnails cached inside them and extracts the project XML as indented,
//! human-readable text.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use wmmcarve_core::finder::{self, DirectoryScanner, FinderConfig, FoundLog};
use wmmcarve_core::thumbnail::{self, CarverConfig};
use wmmcarve_core::xml::{self, ExtractorConfig, ReindentConfig, XmlPayloadExtractor, XmlReindenter};

/// Recover thumbnails and project XML from damaged Windows Movie Maker files
#[derive(Parser, Debug)]
#[command(name = "wmmcarve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find Movie Maker project files in a folder and its subfolders
    #[command(visible_alias = "f")]
    Find(FindArgs),

    /// Extract the thumbnail images cached inside a project file
    #[command(visible_alias = "i")]
    Thumbnails(ThumbnailArgs),

    /// Extract the project XML and re-indent it
    #[command(visible_alias = "x")]
    Xml(XmlArgs),
}

#[derive(Args, Debug)]
struct FindArgs {
    /// Folder to search; subfolders are searched too
    #[arg(value_parser = parse_path)]
    folder: PathBuf,

    /// Log file receiving one line per project file found
    #[arg(long, default_value = finder::DEFAULT_LOG_NAME)]
    log: PathBuf,

    /// Keep records from a previous search instead of starting a new log
    #[arg(long)]
    append: bool,

    /// Maximum folder depth to descend
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Args, Debug)]
struct ThumbnailArgs {
    /// Project file; corrupted files are supported
    #[arg(value_parser = parse_path)]
    file: PathBuf,

    /// Output folder [default: project path without its extension]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Bytes per read; also the granularity of thumbnail boundaries
    #[arg(long, default_value = "16")]
    chunk_size: usize,

    /// Maximum number of thumbnails to extract (0 = unlimited)
    #[arg(long, default_value = "0")]
    max_thumbnails: u32,
}

#[derive(Args, Debug)]
struct XmlArgs {
    /// Project file; semi-corrupted files are supported
    #[arg(value_parser = parse_path)]
    file: PathBuf,

    /// Output file [default: project path with an .XML extension]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Bytes per read
    #[arg(long, default_value = "32")]
    chunk_size: usize,

    /// Indent with this many spaces instead of a tab
    #[arg(long, conflicts_with = "raw")]
    spaces: Option<usize>,

    /// Write the decoded XML as found, without re-indenting it
    #[arg(long)]
    raw: bool,
}

/// Process exit status, one per documented outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Outcome {
    Success = 0,
    PathNotFound = 4,
    NoXmlData = 5,
    NoThumbnails = 6,
    FooterBeforeHeader = 7,
    NoMarkers = 8,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome as u8)
    }
}

/// Drag-and-drop on Windows wraps paths in double quotes
fn parse_path(raw: &str) -> std::result::Result<PathBuf, String> {
    let cleaned = raw.replace('"', "");
    if cleaned.is_empty() {
        return Err("path must not be empty".to_string());
    }
    Ok(PathBuf::from(cleaned))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let result = match &cli.command {
        Command::Find(args) => run_find(args),
        Command::Thumbnails(args) => run_thumbnails(args),
        Command::Xml(args) => run_xml(args),
    };

    match result {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            error!("{:#}", err);
            outcome_for_error(&err).map_or(ExitCode::FAILURE, Into::into)
        }
    }
}

/// Maps library errors with a documented exit status
fn outcome_for_error(err: &anyhow::Error) -> Option<Outcome> {
    let core = err.downcast_ref::<wmmcarve_core::Error>()?;
    if core.is_not_found() {
        Some(Outcome::PathNotFound)
    } else if core.is_data_not_found() {
        Some(Outcome::NoXmlData)
    } else {
        None
    }
}

/// Search a folder tree for project files
fn run_find(args: &FindArgs) -> Result<Outcome> {
    if !args.folder.is_dir() {
        return Err(wmmcarve_core::Error::path_not_found(&args.folder).into());
    }

    let log = FoundLog::new(&args.log);
    if !args.append {
        log.reset()?;
    }

    let mut config = FinderConfig::new();
    if let Some(depth) = args.max_depth {
        config = config.max_depth(depth);
    }

    let report = DirectoryScanner::with_config(config)
        .run(&args.folder, Some(&log))
        .with_context(|| format!("Failed to search {}", args.folder.display()))?;

    for path in &report.found {
        println!("{} - MSWMM XML header found!", path.display());
    }

    info!(
        "Summary: {} files scanned, {} project files found, {} unreadable entries",
        report.files_scanned,
        report.found.len(),
        report.failures.len()
    );

    if report.is_empty() {
        error!("No MSWMM headers found");
        return Ok(Outcome::NoMarkers);
    }
    println!("Results logged to {}", log.path().display());
    Ok(Outcome::Success)
}

/// Carve thumbnails out of one project file
fn run_thumbnails(args: &ThumbnailArgs) -> Result<Outcome> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| thumbnail::default_output_dir(&args.file));
    let config = CarverConfig::new()
        .chunk_size(args.chunk_size)
        .max_thumbnails(args.max_thumbnails);

    let report = thumbnail::carve_file(&args.file, &output, config)
        .with_context(|| format!("Failed to extract thumbnails from {}", args.file.display()))?;

    if report.is_empty() {
        error!("Couldn't find any thumbnails in {}", args.file.display());
        return Ok(Outcome::NoThumbnails);
    }

    for thumb in &report.thumbnails {
        let path = output.join(format!("{}.JFIF", thumb.number));
        let digest = file_digest(&path)?;
        println!(
            "{}  {} bytes at {}  blake3:{}",
            path.display(),
            thumb.len(),
            thumb.start,
            digest
        );
    }

    if report.footer_before_header {
        warn!(
            "JFIF footer found before header at {} location(s) - file may be severely corrupted",
            report.stray_footers.len()
        );
        return Ok(Outcome::FooterBeforeHeader);
    }
    Ok(Outcome::Success)
}

/// Extract, re-indent and write the project XML
fn run_xml(args: &XmlArgs) -> Result<Outcome> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| xml::default_output_path(&args.file));

    let extractor =
        XmlPayloadExtractor::with_config(ExtractorConfig::new().chunk_size(args.chunk_size));
    let mut reindent = ReindentConfig::new();
    if let Some(width) = args.spaces {
        reindent = reindent.indent(" ".repeat(width));
    }
    let reindenter = XmlReindenter::with_config(reindent);
    let reindenter = (!args.raw).then_some(&reindenter);

    let recovery = xml::recover_file(&args.file, &output, &extractor, reindenter)
        .with_context(|| format!("Failed to extract XML from {}", args.file.display()))?;

    if recovery.truncated {
        warn!("Closing </MovieMaker> tag not found, the XML is incomplete");
    }
    println!(
        "Wrote {} ({} lines from {} bytes of XML data)",
        recovery.output.display(),
        recovery.lines,
        recovery.payload_len
    );
    Ok(Outcome::Success)
}

/// BLAKE3 digest of a written artifact, for the evidence listing
fn file_digest(path: &Path) -> Result<String> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(blake3::hash(&data).to_hex().to_string())
}
