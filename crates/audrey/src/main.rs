//! audrey - Audit requirements traceability in a repository
//!
//! audrey scans a repository for requirement identifiers (`FT-001`, `US-014`,
//! `RISK-IAM-002`, ...) across requirements, tests, sources, and docs, then
//! reports definitions, references, duplicate-definition conflicts, orphan
//! files, coverage tables, and a composite traceability score.

use audrey::config::Config;
use audrey::output::{OutputFormat, render_report};
use audrey_core::{
    AuditOptions, CoverageReport, IdGrammar, MIN_SOURCE_LINES_FOR_ORPHAN_CHECK,
    check_duplicate_definitions, find_definitions, run_audit,
};
use clap::{Parser, Subcommand};
use eyre::Result;
use owo_colors::OwoColorize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "audrey", version, about = "Requirements traceability audit")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Repository root to audit (default: current directory)
    #[arg(value_name = "REPO")]
    repo: Option<PathBuf>,

    /// Path to config file (default: .config/audrey.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Minimum line count before an untraced source file is flagged as orphan
    #[arg(long)]
    min_source_lines: Option<usize>,

    /// Show conflict occurrences with context snippets
    #[arg(short, long)]
    verbose: bool,
}

/// Subcommands
#[derive(Debug, Subcommand)]
enum Command {
    /// Check YAML files for duplicate id definitions (pre-commit friendly)
    CheckIds {
        /// Files to check (default: requirements/ recursively)
        files: Vec<PathBuf>,

        /// Path to config file (default: .config/audrey.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:?}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::CheckIds { files, config }) => run_check_ids(files, config),
        None => run_audit_command(cli),
    }
}

fn run_audit_command(cli: Cli) -> Result<ExitCode> {
    let repo_root = cli.repo.unwrap_or_else(|| PathBuf::from("."));
    let config = Config::load(cli.config.as_deref(), &repo_root)?;
    let grammar = IdGrammar::new(&config.grammar_config())?;

    if !repo_root.join(".git").exists() && !repo_root.join("requirements").exists() {
        eprintln!(
            "{} {} may not be a valid project root (no .git or requirements/)",
            "!".yellow().bold(),
            repo_root.display()
        );
    }

    let options = AuditOptions {
        min_source_lines: cli
            .min_source_lines
            .or(config.audit.min_source_lines)
            .unwrap_or(MIN_SOURCE_LINES_FOR_ORPHAN_CHECK),
    };

    let result = run_audit(&grammar, &repo_root, &options);
    let coverage = CoverageReport::compute(&result, &grammar);

    print!("{}", render_report(&result, &coverage, cli.format, cli.verbose));

    // The exit code is the only hard contract: 1 iff conflicts were found.
    Ok(if result.has_conflicts() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_check_ids(files: Vec<PathBuf>, config_path: Option<PathBuf>) -> Result<ExitCode> {
    let cwd = PathBuf::from(".");
    let config = Config::load(config_path.as_deref(), &cwd)?;
    let grammar = IdGrammar::new(&config.grammar_config())?;

    let yaml_files: Vec<PathBuf> = if files.is_empty() {
        let requirements = cwd.join("requirements");
        if !requirements.exists() {
            println!("No requirements directory found.");
            return Ok(ExitCode::SUCCESS);
        }
        collect_yaml_files(&requirements)
    } else {
        files.into_iter().filter(|file| is_yaml(file)).collect()
    };

    if yaml_files.is_empty() {
        println!("No YAML files to check.");
        return Ok(ExitCode::SUCCESS);
    }

    let duplicates = check_duplicate_definitions(&grammar, &yaml_files);
    if !duplicates.is_empty() {
        println!("Duplicate story IDs found:\n");
        for (id, sites) in &duplicates {
            println!("  {}:", id.red());
            for site in sites {
                println!("    - {}:{}", site.file.display(), site.line);
            }
        }
        println!(
            "\n{} duplicate ID(s) found. Please resolve conflicts.",
            duplicates.len()
        );
        return Ok(ExitCode::FAILURE);
    }

    let unique: BTreeSet<String> = yaml_files
        .iter()
        .flat_map(|file| find_definitions(&grammar, file))
        .map(|definition| definition.id)
        .collect();
    println!("No duplicate IDs found ({} unique IDs checked)", unique.len());
    Ok(ExitCode::SUCCESS)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

/// Collect YAML files under a directory, sorted.
fn collect_yaml_files(root: &Path) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(root)
        .follow_links(true)
        .hidden(false)
        .git_ignore(true)
        .build();

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_yaml(path))
        .collect();
    files.sort();
    files
}
