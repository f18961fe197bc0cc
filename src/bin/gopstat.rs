use std::{
    io::{self, Write},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;
use gopstat::{
    AnalysisOptions, AnalysisSummary, DEFAULT_CHUNK_MAX_DURATION, JsonLinesSink, ProbeCommand,
    ProgressCallback, ProgressInfo, ReportSink, TextSink, analyze, analyze_source,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

const DEFAULT_SOURCE: &str = "http://devimages.apple.com/iphone/samples/bipbop/bipbopall.m3u8";

const CLI_AFTER_HELP: &str = "Examples:\n  gopstat input.mp4\n  gopstat --chunk 4 https://example.com/live/index.m3u8\n  ffprobe -show_entries frame -select_streams v -print_format json input.mp4 | gopstat -\n  gopstat --json input.mp4 > gops.jsonl\n  gopstat --completions zsh > _gopstat";

/// Frames between two progress spinner updates.
const PROGRESS_BATCH: u64 = 50;

#[derive(Debug, Parser)]
#[command(
    name = "gopstat",
    version,
    about = "Report the bitrate of every GOP and chunk of a video stream",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input media path or URL, or `-` to read ffprobe frame JSON from stdin.
    #[arg(default_value = DEFAULT_SOURCE)]
    source: String,

    /// Chunk size in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_CHUNK_MAX_DURATION, value_parser = parse_chunk_duration)]
    chunk: f64,

    /// Print one JSON object per GOP instead of text lines.
    #[arg(long)]
    json: bool,

    /// Show a progress spinner on stderr.
    #[arg(long)]
    progress: bool,

    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,

    /// Path to the ffprobe executable.
    #[arg(long, value_name = "PATH")]
    ffprobe: Option<String>,

    /// Print shell completions and exit.
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn parse_chunk_duration(value: &str) -> Result<f64, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("chunk size must be a positive number of seconds, got {value}"));
    }
    Ok(seconds)
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "gopstat=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Only fails when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner:.green} {elapsed} {msg}")?);
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let position = info
            .current_timestamp
            .map(|seconds| format!(" @{seconds:.3} s"))
            .unwrap_or_default();
        self.bar.set_message(format!(
            "{} frames, {} GOPs, {} chunks{position}",
            info.frames, info.gops, info.chunks
        ));
    }
}

fn print_summary(summary: &AnalysisSummary) {
    let mut line = format!(
        "{} frames, {} GOPs, {} chunks",
        summary.frames,
        summary.gops,
        summary.chunks()
    );
    if summary.chunks() > 0 {
        line.push_str(&format!(
            ", mean {:.3} k/s, {:.3} sd, {:.3} cv",
            summary.statistics.mean(),
            summary.statistics.standard_deviation(),
            summary.statistics.coefficient_of_variation()
        ));
    }
    eprintln!("{} {}", "done:".green().bold(), line);
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "gopstat", &mut io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose);

    if cli.json {
        eprintln!("Inspecting {}", cli.source);
    } else {
        println!("Inspecting {}", cli.source);
    }

    let spinner = if cli.progress {
        Some(Arc::new(SpinnerProgress::new()?))
    } else {
        None
    };

    let mut options = AnalysisOptions::new().with_chunk_max_duration(cli.chunk);
    if let Some(spinner) = &spinner {
        options = options
            .with_progress(spinner.clone())
            .with_batch_size(PROGRESS_BATCH);
    }

    let stdout = io::stdout().lock();
    let mut sink: Box<dyn ReportSink> = if cli.json {
        Box::new(JsonLinesSink::new(stdout))
    } else {
        Box::new(TextSink::new(stdout))
    };

    let result = if cli.source == "-" {
        analyze(io::stdin().lock(), &options, sink.as_mut())
    } else {
        let mut command = ProbeCommand::new(cli.source.as_str());
        if let Some(program) = &cli.ffprobe {
            command = command.with_program(program.as_str());
        }
        analyze_source(&command, &options, sink.as_mut())
    };

    if let Some(spinner) = &spinner {
        spinner.bar.finish_and_clear();
    }
    drop(sink);
    io::stdout().flush()?;

    let summary = result?;
    print_summary(&summary);
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
