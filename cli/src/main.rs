//! Aequalis - Command-line front end for the compare & sync engine.
//!
//! Compares a source against a destination, prints the assessment and,
//! with `--apply`, copies the items that need it. Progress goes to stderr
//! so that `--json` output on stdout stays machine-readable.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use engine::{
    apply_diffs, eligible_count, Action, CancelToken, CompareConfig, CompareRequest, DiffItem,
    DiffSummary, EventSink, SyncWorker, WorkerEvent,
};
use tracing_subscriber::EnvFilter;

/// Aequalis - one-way compare & sync by size and modification time
#[derive(Parser, Debug)]
#[command(name = "aequalis")]
#[command(version = "0.1.0")]
#[command(about = "Compare a source against a destination and copy what is missing or newer")]
struct Args {
    /// Source directory (or file with --file)
    #[arg(long, value_name = "PATH")]
    src: PathBuf,

    /// Destination directory (or file with --file)
    #[arg(long, value_name = "PATH")]
    dst: PathBuf,

    /// Compare two single files instead of two directory trees
    #[arg(long)]
    file: bool,

    /// JSON configuration file (skipHeavyDirs, extraIgnores)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Descend into .git, node_modules, build and the other heavy directories
    #[arg(long)]
    no_skip_heavy: bool,

    /// Additional entry name to ignore (repeatable)
    #[arg(long = "ignore", value_name = "NAME")]
    ignore: Vec<String>,

    /// Print the diff set as JSON on stdout
    #[arg(long)]
    json: bool,

    /// List identical items too
    #[arg(long)]
    all: bool,

    /// Copy eligible items after comparing
    #[arg(long)]
    apply: bool,

    /// Do not ask for confirmation before copying
    #[arg(long, requires = "apply")]
    yes: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

/// How a successful invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    /// Nothing failed
    Clean,
    /// The copy pass finished but some items failed
    CompletedWithErrors,
}

/// Stderr renderer for worker and copy-pass events.
struct CliProgress {
    state: Mutex<RenderState>,
}

struct RenderState {
    max: u64,
    last_draw: Option<Instant>,
    drawing: bool,
}

impl CliProgress {
    const THROTTLE: Duration = Duration::from_millis(200);

    fn new() -> Self {
        CliProgress {
            state: Mutex::new(RenderState {
                max: 0,
                last_draw: None,
                drawing: false,
            }),
        }
    }

    fn print_progress_bar(value: u64, max: u64) -> String {
        let percent = if max == 0 { 0 } else { (value.min(max) * 100 / max) as usize };
        let filled = percent / 5;
        format!(
            "[{}{}] {}/{}",
            "=".repeat(filled),
            " ".repeat(20 - filled),
            value,
            max
        )
    }

    /// Terminate an in-place progress line, if one is showing.
    fn finish_line(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.drawing {
                eprintln!();
                state.drawing = false;
            }
        }
    }
}

impl EventSink for CliProgress {
    fn emit(&self, event: WorkerEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        match event {
            WorkerEvent::Phase(label) => {
                if state.drawing {
                    eprintln!();
                    state.drawing = false;
                }
                eprintln!("{label}");
            }
            WorkerEvent::ProgressRange { max, .. } => {
                state.max = max;
                state.last_draw = None;
            }
            WorkerEvent::ProgressValue(value) => {
                let max = state.max;
                let due = state
                    .last_draw
                    .map_or(true, |at| at.elapsed() >= Self::THROTTLE);
                if max > 0 && (due || value >= max) {
                    eprint!("\r{}", Self::print_progress_bar(value, max));
                    let _ = io::stderr().flush();
                    state.last_draw = Some(Instant::now());
                    state.drawing = true;
                }
            }
            WorkerEvent::Done(_) | WorkerEvent::Failed(_) => {}
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Parse and validate command-line arguments, then run the compare
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let stdin = io::stdin();
    let exit_code = match run_cli(&args, &mut stdin.lock()) {
        Ok(RunStatus::Clean) => 0,
        Ok(RunStatus::CompletedWithErrors) => 1,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, input: &mut dyn BufRead) -> Result<RunStatus, String> {
    validate_paths(args)?;

    let mut config = match &args.config {
        Some(path) => CompareConfig::load(path).map_err(|e| e.to_string())?,
        None => CompareConfig::default(),
    };
    if args.no_skip_heavy {
        config.skip_heavy_dirs = false;
    }
    config.extra_ignores.extend(args.ignore.iter().cloned());

    let request = if args.file {
        CompareRequest::single_file(&args.src, &args.dst)
    } else {
        CompareRequest::tree(&args.src, &args.dst, config.ignore_names())
    };

    let progress = CliProgress::new();
    let diffs = run_compare(request.clone(), &progress)?;
    report_diffs(args, &diffs)?;

    if !args.apply {
        return Ok(RunStatus::Clean);
    }

    let eligible = eligible_count(&diffs);
    if eligible == 0 {
        eprintln!("Up-to-date: no eligible items to copy.");
        return Ok(RunStatus::Clean);
    }

    let (src_root, dst_root) = apply_roots(args)?;
    if !args.yes && !confirm(&format!("Copy {} item(s)?", eligible), input) {
        eprintln!("Update cancelled.");
        return Ok(RunStatus::Clean);
    }

    let report = apply_diffs(&src_root, &dst_root, &diffs, &CancelToken::new(), Some(&progress));
    progress.finish_line();

    if !report.errors.is_empty() {
        eprintln!(
            "Completed with errors: copied {}; errors {}",
            report.copied,
            report.errors.len()
        );
        for error in &report.errors {
            eprintln!("  {}", error);
        }
        return Ok(RunStatus::CompletedWithErrors);
    }

    eprintln!("Update complete: copied {} items.", report.copied);

    let rerun = run_compare(request, &progress)?;
    eprintln!("{}", DiffSummary::from_items(&rerun));
    Ok(RunStatus::Clean)
}

/// Reject invocations the engine would answer with a meaningless result.
fn validate_paths(args: &Args) -> Result<(), String> {
    if args.src == args.dst {
        return Err("Source and destination cannot be the same".to_string());
    }

    if args.file {
        // The engine reports two missing paths as "Both missing"/identical;
        // for a user that is always a typo.
        if !args.src.exists() && !args.dst.exists() {
            return Err(format!(
                "Neither source nor destination exists: {}, {}",
                args.src.display(),
                args.dst.display()
            ));
        }
        return Ok(());
    }

    if !args.src.exists() {
        return Err(format!("Source directory does not exist: {}", args.src.display()));
    }
    if !args.src.is_dir() {
        return Err(format!("Source is not a directory: {}", args.src.display()));
    }
    if args.dst.exists() && !args.dst.is_dir() {
        return Err(format!("Destination is not a directory: {}", args.dst.display()));
    }

    Ok(())
}

/// Roots to hand to the copy pass.
///
/// In single-file mode the diff item is keyed by the source file name, so
/// the copy only lines up when both files share that name.
fn apply_roots(args: &Args) -> Result<(PathBuf, PathBuf), String> {
    if !args.file {
        return Ok((args.src.clone(), args.dst.clone()));
    }

    if args.src.file_name() != args.dst.file_name() {
        return Err(format!(
            "--apply with --file needs matching file names ({} vs {})",
            args.src.display(),
            args.dst.display()
        ));
    }

    let parent = |p: &PathBuf| p.parent().map(PathBuf::from).unwrap_or_default();
    Ok((parent(&args.src), parent(&args.dst)))
}

/// Spawn a worker for `request` and drain its events until the terminal one.
fn run_compare(request: CompareRequest, progress: &CliProgress) -> Result<Vec<DiffItem>, String> {
    let handle = SyncWorker::new(request).spawn();
    tracing::debug!("Started compare run {}", handle.id());

    let mut outcome = None;
    for event in handle.events().iter() {
        match event {
            WorkerEvent::Done(diffs) => {
                outcome = Some(Ok(diffs));
                break;
            }
            WorkerEvent::Failed(message) => {
                outcome = Some(Err(format!("Compare failed: {}", message)));
                break;
            }
            other => progress.emit(other),
        }
    }
    progress.finish_line();

    handle.join().map_err(|e| e.to_string())?;
    outcome.unwrap_or_else(|| Err("Compare worker exited without a result".to_string()))
}

/// Print the assessment: JSON on stdout, or a table plus summary line.
fn report_diffs(args: &Args, diffs: &[DiffItem]) -> Result<(), String> {
    let summary = DiffSummary::from_items(diffs);

    if args.json {
        let json = serde_json::to_string_pretty(diffs)
            .map_err(|e| format!("Failed to serialize diff set: {}", e))?;
        println!("{}", json);
        eprintln!("{}", summary);
        return Ok(());
    }

    for item in diffs {
        if !args.all && item.action == Action::Identical {
            continue;
        }
        println!(
            "{:<16} {}  ({})  src: {} {:>10}  dst: {} {:>10}",
            item.action.label(),
            item.relpath.display(),
            item.reason,
            item.src.mtime_display(),
            item.src.size_display(),
            item.dst.mtime_display(),
            item.dst.size_display()
        );
    }
    println!("{}", summary);
    Ok(())
}

/// Ask a yes/no question on stderr; anything but "y"/"yes" is a no.
fn confirm(prompt: &str, input: &mut dyn BufRead) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = io::stderr().flush();

    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
