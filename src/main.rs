use std::io::{self, BufRead, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use fsearch::{available_threads, FileSearcher, Results, ShutdownStatus};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File name to search for (exact, case-sensitive). Prompts when omitted.
    #[arg(requires = "dir")]
    name: Option<String>,

    /// Directory to start the search from. Prompts when omitted.
    dir: Option<PathBuf>,

    /// Number of worker threads (defaults to the number of CPU cores)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Seconds to wait for the worker pool to drain on shutdown
    #[arg(long, default_value = "60")]
    timeout: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let threads = cli.threads.unwrap_or_else(available_threads);
    let timeout = Duration::from_secs(cli.timeout);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let (Some(name), Some(dir)) = (cli.name, cli.dir) {
        let searcher = FileSearcher::new(threads)?;
        let outcome = run_search(&searcher, &name, &normalize(&dir), &mut out);
        finish(&searcher, timeout);
        return outcome;
    }

    writeln!(out, "Using {} threads based on available CPU cores.", threads)?;
    loop {
        let searcher = FileSearcher::new(threads)?;
        let outcome = prompt_and_search(&searcher, &mut input, &mut out);
        finish(&searcher, timeout);
        outcome?;

        if !ask_for_another_search(&mut input, &mut out)? {
            break;
        }
    }

    Ok(())
}

fn prompt_and_search<R: BufRead, W: Write>(
    searcher: &FileSearcher,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    let name = read_file_name(input, out)?;
    let dir = read_directory(input, out)?;
    run_search(searcher, &name, &dir, out)
}

fn run_search<W: Write>(
    searcher: &FileSearcher,
    name: &str,
    dir: &Path,
    out: &mut W,
) -> Result<()> {
    info!(file_name = name, dir = %dir.display(), "Starting search");

    let results = searcher
        .search(name, dir)
        .with_context(|| format!("search for '{}' in '{}' failed", name, dir.display()))?;
    let elapsed_ms = results.stats.duration.as_secs_f64() * 1000.0;

    display_results(&results, out)?;
    writeln!(out, "Search completed in {} milliseconds.", elapsed_ms)?;
    info!(elapsed_ms, "Search completed");
    Ok(())
}

fn finish(searcher: &FileSearcher, timeout: Duration) {
    if searcher.shutdown(timeout) == ShutdownStatus::Abandoned {
        warn!("Worker pool did not terminate");
    }
}

/// Prompt for the file name. Empty input is rejected.
fn read_file_name<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<String> {
    writeln!(out, "Please enter the file name to search:")?;
    let line = read_line(input)?;
    if line.is_empty() {
        bail!("File name cannot be empty");
    }
    Ok(line)
}

/// Prompt for the base directory. Input is trimmed and lexically normalized.
fn read_directory<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<PathBuf> {
    writeln!(out, "Please enter the base directory to start the search:")?;
    let line = read_line(input)?;
    let line = line.trim();
    if line.is_empty() {
        bail!("Directory cannot be empty");
    }
    Ok(normalize(Path::new(line)))
}

/// Only a case-insensitive "yes" continues.
fn ask_for_another_search<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    writeln!(out, "Would you like to search again? (yes/no)")?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(false);
    }
    Ok(line.trim().eq_ignore_ascii_case("yes"))
}

fn display_results<W: Write>(results: &Results, out: &mut W) -> Result<()> {
    if results.paths.is_empty() {
        writeln!(out, "File not found.")?;
    }
    for path in &results.paths {
        writeln!(out, "File found: {}", path.display())?;
    }

    for skipped in results.warnings.iter().chain(&results.faults) {
        match skipped.path() {
            Some(p) => eprintln!("Skipped: {} ({})", p.display(), skipped),
            None => eprintln!("Skipped: {}", skipped),
        }
    }
    Ok(())
}

/// One line without its terminator. End of input is an error.
fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line).context("failed to read input")? == 0 {
        bail!("No input available");
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(line)
}

/// Remove `.` components and resolve `..` against preceding names, without
/// touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}
