//! casechunk command line
//!
//! Run with: cargo run -p casechunk -- --directory decisions/ --output chunks.jsonl

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casechunk::processing::{
    compile_pattern, dedupe, discover_files, resolve_file, FileOutcome, WorkItem,
};
use casechunk::{DocumentPipeline, OutputSink, PipelineConfig, ResumableOrchestrator, StopHandle};

/// Split legal decision PDFs into section-aware chunks written as JSONL
#[derive(Parser, Debug)]
#[command(name = "casechunk", version)]
struct Args {
    /// Directory containing PDF files to process
    #[arg(short, long, default_value = ".")]
    directory: PathBuf,

    /// Output JSONL file
    #[arg(short, long, default_value = "decision_chunks.jsonl")]
    output: PathBuf,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Resume from a previous run with the same output file
    #[arg(short, long)]
    resume: bool,

    /// List matching PDF files instead of processing them
    #[arg(short, long, conflicts_with_all = ["file", "resume"])]
    list: bool,

    /// Regex that file names must match
    #[arg(short, long)]
    pattern: Option<String>,

    /// Process a single PDF file (a path, or a name inside --directory)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Descend into subdirectories of --directory
    #[arg(long)]
    recursive: bool,

    /// TOML configuration file; command line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum chunk body size in characters
    #[arg(long)]
    max_chunk_chars: Option<usize>,

    /// Characters shared between consecutive chunks
    #[arg(long)]
    overlap_chars: Option<usize>,

    /// Give up on a single file after this many seconds
    #[arg(long)]
    file_timeout_secs: Option<u64>,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(workers) = self.workers {
            config.processing.workers = workers;
        }
        if let Some(max) = self.max_chunk_chars {
            config.chunking.max_chunk_chars = max;
        }
        if let Some(overlap) = self.overlap_chars {
            config.chunking.overlap_chars = overlap;
        }
        if let Some(secs) = self.file_timeout_secs {
            config.processing.file_timeout_secs = Some(secs);
        }
        if self.recursive {
            config.processing.recursive = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn work_items(&self, config: &PipelineConfig) -> Result<Vec<WorkItem>> {
        let items = match &self.file {
            Some(file) => vec![resolve_file(file, Some(&self.directory))?],
            None => {
                let filter = compile_pattern(self.pattern.as_deref())?;
                discover_files(&self.directory, config.processing.recursive, filter.as_ref())?
            }
        };
        Ok(dedupe(items))
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "casechunk=debug" } else { "casechunk=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn make_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {bar:30} {pos}/{len} files ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.pipeline_config()?;
    let files = args.work_items(&config)?;

    if args.list {
        for item in &files {
            println!("{}", item.key);
        }
        println!("{} PDF files", files.len());
        return Ok(());
    }

    if files.is_empty() {
        tracing::warn!("No PDF files found in {}", args.directory.display());
    }

    let pipeline = Arc::new(DocumentPipeline::from_config(&config)?);
    let sink = Arc::new(
        OutputSink::open(&args.output, args.resume)
            .with_context(|| format!("cannot open output {}", args.output.display()))?,
    );

    let stop = StopHandle::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing files in flight");
                stop.stop();
            }
        });
    }

    let remaining = files.iter().filter(|f| !sink.is_completed(&f.key)).count();
    let pb = make_progress_bar(remaining);
    let bar = pb.clone();

    let orchestrator = ResumableOrchestrator::new(pipeline, sink, &config.processing)
        .with_stop_handle(stop)
        .with_progress(Arc::new(move |filename: &str, outcome: &FileOutcome| {
            bar.inc(1);
            match outcome {
                FileOutcome::Completed { .. } => bar.set_message(filename.to_string()),
                FileOutcome::Failed { .. } => bar.set_message(format!("failed: {}", filename)),
            }
        }));

    let result = orchestrator.run(files).await;
    pb.finish_and_clear();

    let summary = result.context("processing run aborted")?;
    summary.log();

    println!(
        "{} completed, {} failed, {} skipped, {} pending; {} chunks written to {}",
        summary.completed,
        summary.failed,
        summary.skipped,
        summary.pending,
        summary.chunks_written,
        args.output.display()
    );
    if summary.failed > 0 {
        println!(
            "Failures are listed in {}",
            OutputSink::failure_log_path(&args.output).display()
        );
    }

    Ok(())
}
