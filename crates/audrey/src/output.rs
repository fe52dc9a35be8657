//! Report rendering for audit results
//!
//! All formats observe the same fixed section order: banner, repository path,
//! summary table, conflicts, uncovered requirements, orphan lists, per-prefix
//! coverage, score breakdown. Output is deterministic: re-rendering the same
//! result is byte-identical.

use audrey_core::{AuditResult, Conflict, CoverageReport, CoverageStatus, PrefixCoverage};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::PathBuf;

/// Uncovered identifiers shown before the list is elided.
const UNCOVERED_DISPLAY_CAP: usize = 20;
/// Orphan files shown per list before elision.
const ORPHAN_DISPLAY_CAP: usize = 10;
/// Context snippets are clipped to this many characters for display only.
const SNIPPET_DISPLAY_LEN: usize = 80;

/// Output format for the audit report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

/// Render a report in the requested format.
pub fn render_report(
    result: &AuditResult,
    coverage: &CoverageReport,
    format: OutputFormat,
    verbose: bool,
) -> String {
    match format {
        OutputFormat::Text => render_text(result, coverage, verbose),
        OutputFormat::Markdown => render_markdown(result, coverage, verbose),
        OutputFormat::Json => render_json(result, coverage),
    }
}

fn render_text(result: &AuditResult, coverage: &CoverageReport, verbose: bool) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    out.push_str(&rule);
    out.push('\n');
    out.push_str("              TRACEABILITY AUDIT REPORT\n");
    out.push_str(&rule);
    out.push_str("\n\n");
    render_body(&mut out, result, coverage, verbose, true);
    out.push_str(&rule);
    out.push('\n');
    out
}

fn render_markdown(result: &AuditResult, coverage: &CoverageReport, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str("# Traceability Audit Report\n\n");
    render_body(&mut out, result, coverage, verbose, false);
    out
}

fn render_body(
    out: &mut String,
    result: &AuditResult,
    coverage: &CoverageReport,
    verbose: bool,
    colored: bool,
) {
    out.push_str(&format!("Repository: {}\n\n", result.repo_root.display()));

    // Summary
    out.push_str("## Summary\n\n");
    out.push_str("| Metric | Count |\n");
    out.push_str("|--------|-------|\n");
    out.push_str(&format!("| Total unique IDs | {} |\n", coverage.total_ids));
    out.push_str(&format!(
        "| In requirements | {} |\n",
        coverage.requirement_count
    ));
    out.push_str(&format!("| In tests | {} |\n", coverage.tested_count));
    out.push_str(&format!("| In source | {} |\n", coverage.traced_count));
    out.push_str(&format!("| ID conflicts | {} |\n", result.conflicts.len()));
    out.push_str(&format!(
        "| Orphan test files | {} |\n",
        result.orphan_tests.len()
    ));
    out.push_str(&format!(
        "| Orphan source files | {} |\n\n",
        result.orphan_sources.len()
    ));

    // Conflicts
    if !result.conflicts.is_empty() {
        out.push_str("## ID Conflicts Found\n\n");
        out.push_str("| ID | Defined in |\n");
        out.push_str("|----|------------|\n");
        for conflict in &result.conflicts {
            let files: Vec<String> = conflict
                .defining_files
                .iter()
                .map(|file| {
                    file.file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| file.display().to_string())
                })
                .collect();
            out.push_str(&format!("| {} | {} |\n", conflict.id, files.join(", ")));
        }
        out.push('\n');
        if verbose {
            for conflict in &result.conflicts {
                out.push_str(&format!("{}:\n", conflict.id));
                for occurrence in &conflict.occurrences {
                    out.push_str(&format!(
                        "  {}:{} {}\n",
                        occurrence.file.display(),
                        occurrence.line,
                        clip_chars(&occurrence.snippet, SNIPPET_DISPLAY_LEN)
                    ));
                }
            }
            out.push('\n');
        }
    }

    // Coverage gaps
    if !coverage.uncovered.is_empty() {
        out.push_str(&format!(
            "## Requirements Without Coverage ({})\n\n",
            coverage.uncovered.len()
        ));
        for id in coverage.uncovered.iter().take(UNCOVERED_DISPLAY_CAP) {
            out.push_str(&format!("- {id}\n"));
        }
        if coverage.uncovered.len() > UNCOVERED_DISPLAY_CAP {
            out.push_str(&format!(
                "- ... and {} more\n",
                coverage.uncovered.len() - UNCOVERED_DISPLAY_CAP
            ));
        }
        out.push('\n');
    }

    // Orphan files
    if !result.orphan_tests.is_empty() {
        out.push_str(&format!(
            "## Orphan Test Files ({})\n\n",
            result.orphan_tests.len()
        ));
        out.push_str("Tests without any story reference:\n");
        render_orphan_list(out, &result.orphan_tests);
    }
    if !result.orphan_sources.is_empty() {
        out.push_str(&format!(
            "## Orphan Source Files ({})\n\n",
            result.orphan_sources.len()
        ));
        out.push_str("Source files without traceability:\n");
        render_orphan_list(out, &result.orphan_sources);
    }

    // Per-prefix coverage
    out.push_str("## Coverage by Prefix\n\n");
    out.push_str("| Prefix | Type | Total | Tested | Traced | Coverage |\n");
    out.push_str("|--------|------|-------|--------|--------|----------|\n");
    for row in &coverage.prefixes {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.0}% {} |\n",
            row.prefix,
            row.type_name.as_deref().unwrap_or("-"),
            row.total,
            row.tested,
            row.traced,
            row.percent,
            status_cell(row.status, colored)
        ));
    }
    out.push('\n');

    // Score breakdown, all four components in order
    out.push_str("## Traceability Score\n\n");
    let score = &coverage.score;

    if score.conflict_count == 0 {
        out.push_str(&format!("- {} No ID conflicts (+30)\n", check(true, colored)));
    } else {
        out.push_str(&format!(
            "- {} ID conflicts found: {} (+0)\n",
            check(false, colored),
            score.conflict_count
        ));
    }

    if score.coverage_points == 30 {
        out.push_str(&format!(
            "- {} Coverage >= 70% ({:.0}%) (+30)\n",
            check(true, colored),
            score.coverage_percent
        ));
    } else {
        out.push_str(&format!(
            "- {} Coverage {:.0}% (+{})\n",
            check(false, colored),
            score.coverage_percent,
            score.coverage_points
        ));
    }

    if score.orphan_test_points > 0 {
        out.push_str(&format!(
            "- {} Orphan tests < 20% ({:.0}%) (+20)\n",
            check(true, colored),
            score.orphan_test_percent
        ));
    } else {
        out.push_str(&format!(
            "- {} Orphan tests {:.0}% (+0)\n",
            check(false, colored),
            score.orphan_test_percent
        ));
    }

    if score.orphan_source_points > 0 {
        out.push_str(&format!(
            "- {} Orphan sources < 5 ({}) (+20)\n",
            check(true, colored),
            score.orphan_source_count
        ));
    } else {
        out.push_str(&format!(
            "- {} Orphan sources: {} (+0)\n",
            check(false, colored),
            score.orphan_source_count
        ));
    }

    out.push_str(&format!("\n**Total Score: {}/100**\n", score.total()));
    let grade = score.grade().describe();
    if colored {
        out.push_str(&format!("**Grade: {}**\n\n", grade.bold()));
    } else {
        out.push_str(&format!("**Grade: {grade}**\n\n"));
    }
}

fn render_orphan_list(out: &mut String, orphans: &[PathBuf]) {
    for file in orphans.iter().take(ORPHAN_DISPLAY_CAP) {
        out.push_str(&format!("- {}\n", file.display()));
    }
    if orphans.len() > ORPHAN_DISPLAY_CAP {
        out.push_str(&format!(
            "- ... and {} more\n",
            orphans.len() - ORPHAN_DISPLAY_CAP
        ));
    }
    out.push('\n');
}

fn status_cell(status: CoverageStatus, colored: bool) -> String {
    let label = status.label();
    if !colored {
        return label.to_string();
    }
    match status {
        CoverageStatus::Ok => label.green().to_string(),
        CoverageStatus::Warn => label.yellow().to_string(),
        CoverageStatus::Fail => label.red().to_string(),
    }
}

fn check(earned: bool, colored: bool) -> String {
    match (earned, colored) {
        (true, true) => "[x]".green().to_string(),
        (true, false) => "[x]".to_string(),
        (false, true) => "[ ]".red().to_string(),
        (false, false) => "[ ]".to_string(),
    }
}

fn clip_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    schema_version: u32,
    repository: String,
    total_unique_ids: usize,
    in_requirements: usize,
    in_tests: usize,
    in_source: usize,
    conflicts: &'a [Conflict],
    uncovered_requirements: &'a [String],
    orphan_tests: &'a [PathBuf],
    orphan_sources: &'a [PathBuf],
    coverage_by_prefix: &'a [PrefixCoverage],
    score: JsonScore,
}

#[derive(Serialize)]
struct JsonScore {
    no_conflicts_points: u32,
    coverage_percent: f64,
    coverage_points: u32,
    orphan_test_percent: f64,
    orphan_test_points: u32,
    orphan_source_count: usize,
    orphan_source_points: u32,
    total: u32,
    grade: &'static str,
}

fn render_json(result: &AuditResult, coverage: &CoverageReport) -> String {
    let score = &coverage.score;
    let report = JsonReport {
        schema_version: result.schema_version,
        repository: result.repo_root.display().to_string(),
        total_unique_ids: coverage.total_ids,
        in_requirements: coverage.requirement_count,
        in_tests: coverage.tested_count,
        in_source: coverage.traced_count,
        conflicts: &result.conflicts,
        uncovered_requirements: &coverage.uncovered,
        orphan_tests: &result.orphan_tests,
        orphan_sources: &result.orphan_sources,
        coverage_by_prefix: &coverage.prefixes,
        score: JsonScore {
            no_conflicts_points: score.conflict_points,
            coverage_percent: score.coverage_percent,
            coverage_points: score.coverage_points,
            orphan_test_percent: score.orphan_test_percent,
            orphan_test_points: score.orphan_test_points,
            orphan_source_count: score.orphan_source_count,
            orphan_source_points: score.orphan_source_points,
            total: score.total(),
            grade: score.grade().describe(),
        },
    };
    let mut json = serde_json::to_string_pretty(&report).expect("JSON serialization failed");
    json.push('\n');
    json
}
