use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use redline_core::JobStatus;
use redline_engine::{EngineConfig, EngineHandle, NextWarmup};
use redline_logging::{redline_info, LogDestination};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(name = "redline", about = "Apply natural-language edits to documents")]
pub struct Cli {
    #[arg(long, global = true, default_value = "redline.ron")]
    config: PathBuf,
    #[arg(long, global = true, value_enum, default_value_t = LogTarget::File)]
    log: LogTarget,
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Edit one document and wait for the result
    Edit(EditArgs),
    /// Send a single warm-up request and print the statistics
    Warmup,
}

#[derive(Debug, Args)]
struct EditArgs {
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,
    #[arg(short, long)]
    instruction: String,
    /// Rendered output; defaults to `<stem>_redlined.html` next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write the edited plain text here
    #[arg(long)]
    text: Option<PathBuf>,
    /// Print each status change as a JSON line
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let level = if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        redline_logging::initialize(self.log.into(), level);

        let config = EngineConfig::load(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        match self.command {
            Command::Edit(args) => edit(config, args),
            Command::Warmup => warmup(config),
        }
    }
}

fn edit(config: EngineConfig, args: EditArgs) -> anyhow::Result<()> {
    let document = fs::read(&args.document)
        .with_context(|| format!("reading {}", args.document.display()))?;
    let filename = args
        .document
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document")
        .to_string();

    let engine = EngineHandle::start(config).context("starting engine")?;
    let id = engine.submit(args.instruction, &document, &filename)?;
    redline_info!("Submitted {} as job {id}", args.document.display());

    let mut last = None;
    let view = loop {
        let Some(view) = engine.poll_status(id) else {
            bail!("job {id} disappeared");
        };
        if last.as_ref() != Some(&view) {
            if args.json {
                println!("{}", serde_json::to_string(&view)?);
            } else {
                eprintln!("[{:>3}%] {}", view.progress, view.message);
            }
            last = Some(view.clone());
        }
        if view.status.is_terminal() {
            break view;
        }
        thread::sleep(POLL_INTERVAL);
    };

    if view.status == JobStatus::Error {
        engine.shutdown();
        bail!("job {id} failed: {}", view.message);
    }
    let result = engine
        .fetch_result(id)
        .with_context(|| format!("job {id} completed without a result"))?;
    engine.shutdown();

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.document));
    fs::write(&output, &result.rendered)
        .with_context(|| format!("writing {}", output.display()))?;
    if let Some(text_path) = &args.text {
        fs::write(text_path, &result.text)
            .with_context(|| format!("writing {}", text_path.display()))?;
    }
    println!("{}", output.display());
    Ok(())
}

fn warmup(mut config: EngineConfig) -> anyhow::Result<()> {
    config.warmup_enabled = false;
    let engine = EngineHandle::start(config).context("starting engine")?;
    let ok = engine.trigger_warmup()?;
    let snapshot = engine.warmup_stats();
    engine.shutdown();

    println!("warm-up {}", if ok { "succeeded" } else { "failed" });
    println!(
        "attempts {} (success rate {:.1}%)",
        snapshot.stats.total_attempts, snapshot.success_rate
    );
    match snapshot.next_warmup {
        NextWarmup::Due => println!("next warm-up: due"),
        NextWarmup::At(at) => println!("next warm-up: {}", at.to_rfc3339()),
    }
    if !ok {
        bail!("model did not answer the warm-up request");
    }
    Ok(())
}

fn default_output_path(document: &Path) -> PathBuf {
    let stem = document
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");
    document.with_file_name(format!("{stem}_redlined.html"))
}
