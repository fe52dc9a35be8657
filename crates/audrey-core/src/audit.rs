//! Repository audit: multi-source aggregation and conflict detection
//!
//! Four independent category scans (requirements, tests, sources, docs) merge
//! into one [`AuditResult`]. Scans are pure reads; files within a category are
//! processed in parallel but collected in sorted path order, so the merged
//! result is identical regardless of execution interleaving.

use crate::grammar::{GRAMMAR_VERSION, IdGrammar};
use crate::scan::{self, Occurrence, STORY_MARKER, SourceCategory, TRACE_MARKER};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Source files with this many lines or fewer are never flagged as orphans.
pub const MIN_SOURCE_LINES_FOR_ORPHAN_CHECK: usize = 20;

/// File extensions scanned in the test and source categories.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "py",    // Python
    "rs",    // Rust
    "ts",    // TypeScript
    "tsx",   // TypeScript JSX
    "js",    // JavaScript
    "jsx",   // JavaScript JSX
    "go",    // Go
    "java",  // Java
    "kt",    // Kotlin
    "swift", // Swift
    "c",     // C
    "h",     // C headers
    "cpp",   // C++
    "hpp",   // C++ headers
    "cs",    // C#
    "rb",    // Ruby
    "php",   // PHP
];

/// Re-export/package-marker files that carry no logic worth tracing.
pub const PACKAGE_INIT_FILES: &[&str] = &["__init__.py", "mod.rs"];

/// Tunable knobs for an audit run.
#[derive(Debug, Clone, Copy)]
pub struct AuditOptions {
    /// Minimum line count before an untraced source file is flagged.
    pub min_source_lines: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            min_source_lines: MIN_SOURCE_LINES_FOR_ORPHAN_CHECK,
        }
    }
}

/// Occurrences keyed by identifier.
pub type OccurrenceMap = BTreeMap<String, Vec<Occurrence>>;

/// An identifier with authoritative definitions in more than one file.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub id: String,
    /// Distinct files containing a definition line, sorted.
    pub defining_files: Vec<PathBuf>,
    /// Every requirement-category occurrence, definitions and references both,
    /// retained for diagnostic display.
    pub occurrences: Vec<Occurrence>,
}

/// Results of a full traceability audit.
///
/// Constructed fresh per run, derived entirely from the current filesystem
/// snapshot, never persisted.
#[derive(Debug, Default, Serialize)]
pub struct AuditResult {
    /// Grammar schema version the scan ran under.
    pub schema_version: u32,
    pub repo_root: PathBuf,
    /// Every distinct identifier seen in any category.
    pub all_ids: BTreeSet<String>,
    pub requirements: OccurrenceMap,
    pub tests: OccurrenceMap,
    pub sources: OccurrenceMap,
    pub docs: OccurrenceMap,
    pub conflicts: Vec<Conflict>,
    /// Test files with no identifier and no story marker.
    pub orphan_tests: Vec<PathBuf>,
    /// Substantial source files with no identifier and no trace marker.
    pub orphan_sources: Vec<PathBuf>,
    /// Number of test files discovered, for orphan-rate scoring.
    pub test_file_count: usize,
}

impl AuditResult {
    /// The only condition that makes the audit itself fail.
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Run a full traceability audit over a repository root.
pub fn run_audit(grammar: &IdGrammar, repo_root: &Path, options: &AuditOptions) -> AuditResult {
    let requirements = scan_requirements(grammar, repo_root);
    let (tests, orphan_tests, test_file_count) = scan_tests(grammar, repo_root);
    let (sources, orphan_sources) = scan_sources(grammar, repo_root, options);
    let docs = scan_docs(grammar, repo_root);

    let mut all_ids = BTreeSet::new();
    for map in [&requirements, &tests, &sources, &docs] {
        all_ids.extend(map.keys().cloned());
    }

    let conflicts = detect_conflicts(grammar, &requirements);

    AuditResult {
        schema_version: GRAMMAR_VERSION,
        repo_root: repo_root.to_path_buf(),
        all_ids,
        requirements,
        tests,
        sources,
        docs,
        conflicts,
        orphan_tests,
        orphan_sources,
        test_file_count,
    }
}

/// Identifiers whose authoritative `id:` definitions span more than one file.
///
/// References never create conflicts, and a file defining the same identifier
/// twice does not conflict with itself.
pub fn detect_conflicts(grammar: &IdGrammar, requirements: &OccurrenceMap) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for (id, occurrences) in requirements {
        let defining_files: BTreeSet<&PathBuf> = occurrences
            .iter()
            .filter(|occurrence| grammar.is_definition_line(&occurrence.snippet, id))
            .map(|occurrence| &occurrence.file)
            .collect();
        if defining_files.len() > 1 {
            conflicts.push(Conflict {
                id: id.clone(),
                defining_files: defining_files.into_iter().cloned().collect(),
                occurrences: occurrences.clone(),
            });
        }
    }
    conflicts
}

/// A single `id:` definition site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub id: String,
    pub file: PathBuf,
    pub line: usize,
}

/// Find every authoritative definition line in one file.
pub fn find_definitions(grammar: &IdGrammar, path: &Path) -> Vec<Definition> {
    let Some(content) = scan::read_lenient(path) else {
        return Vec::new();
    };
    let mut definitions = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        for m in grammar.find_all(line) {
            if grammar.is_definition_line(line, m.id) {
                definitions.push(Definition {
                    id: m.id.to_string(),
                    file: path.to_path_buf(),
                    line: idx + 1,
                });
            }
        }
    }
    definitions
}

/// Duplicate check over an explicit file list, for pre-commit hooks.
///
/// Stricter than the audit's conflict rule: every identifier defined more than
/// once is reported, same-file duplicates included.
pub fn check_duplicate_definitions(
    grammar: &IdGrammar,
    files: &[PathBuf],
) -> BTreeMap<String, Vec<Definition>> {
    let mut by_id: BTreeMap<String, Vec<Definition>> = BTreeMap::new();
    for file in files {
        for definition in find_definitions(grammar, file) {
            by_id.entry(definition.id.clone()).or_default().push(definition);
        }
    }
    by_id.retain(|_, sites| sites.len() > 1);
    by_id
}

/// Collect files under `root` that satisfy `keep`, in sorted order.
///
/// A missing root is "zero results" by contract, never an error.
fn collect_files(root: &Path, keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !root.exists() {
        return files;
    }
    let walker = WalkBuilder::new(root)
        .follow_links(true)
        .hidden(false)
        .git_ignore(true)
        .build();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("walk error under {}: {}", root.display(), err);
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_some_and(|t| t.is_file()) && keep(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e))
}

fn is_requirement_file(path: &Path) -> bool {
    has_extension(path, &["yaml", "yml"])
}

fn is_test_file(path: &Path) -> bool {
    has_extension(path, SOURCE_EXTENSIONS)
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with("test_"))
}

fn is_source_file(path: &Path) -> bool {
    has_extension(path, SOURCE_EXTENSIONS)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_none_or(|n| !PACKAGE_INIT_FILES.contains(&n))
}

/// Sorted `apps/*/<child>` directories, for the multi-app repo layout.
fn app_subdirs(repo_root: &Path, child: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(repo_root.join("apps")) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join(child))
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn merge(occurrences: impl IntoIterator<Item = Occurrence>) -> OccurrenceMap {
    let mut map = OccurrenceMap::new();
    for occurrence in occurrences {
        map.entry(occurrence.id.clone()).or_default().push(occurrence);
    }
    map
}

fn scan_requirements(grammar: &IdGrammar, repo_root: &Path) -> OccurrenceMap {
    let root = if repo_root.file_name().is_some_and(|name| name == "requirements") {
        repo_root.to_path_buf()
    } else {
        repo_root.join("requirements")
    };
    let files = collect_files(&root, is_requirement_file);
    let occurrences: Vec<Vec<Occurrence>> = files
        .par_iter()
        .map(|file| scan::scan_file(grammar, file, SourceCategory::Requirement))
        .collect();
    merge(occurrences.into_iter().flatten())
}

fn scan_tests(grammar: &IdGrammar, repo_root: &Path) -> (OccurrenceMap, Vec<PathBuf>, usize) {
    let mut root = repo_root.join("tests");
    if !root.exists() {
        if let Some(fallback) = app_subdirs(repo_root, "tests").into_iter().next() {
            root = fallback;
        }
    }
    let files = collect_files(&root, is_test_file);
    let per_file: Vec<(Vec<Occurrence>, Option<PathBuf>)> = files
        .par_iter()
        .map(|file| {
            let Some(content) = scan::read_lenient(file) else {
                return (Vec::new(), None);
            };
            let occurrences = scan::scan_content(grammar, file, &content, SourceCategory::Test);
            if occurrences.is_empty() && !content.contains(STORY_MARKER) {
                (occurrences, Some(file.clone()))
            } else {
                (occurrences, None)
            }
        })
        .collect();

    let mut all = Vec::new();
    let mut orphans = Vec::new();
    for (occurrences, orphan) in per_file {
        all.extend(occurrences);
        orphans.extend(orphan);
    }
    (merge(all), orphans, files.len())
}

fn scan_sources(
    grammar: &IdGrammar,
    repo_root: &Path,
    options: &AuditOptions,
) -> (OccurrenceMap, Vec<PathBuf>) {
    let mut roots = vec![repo_root.join("src")];
    roots.extend(app_subdirs(repo_root, "src"));

    let mut all = Vec::new();
    let mut orphans = Vec::new();
    for root in roots {
        let files = collect_files(&root, is_source_file);
        let per_file: Vec<(Vec<Occurrence>, Option<PathBuf>)> = files
            .par_iter()
            .map(|file| {
                let Some(content) = scan::read_lenient(file) else {
                    return (Vec::new(), None);
                };
                let occurrences =
                    scan::scan_content(grammar, file, &content, SourceCategory::Source);
                let substantial = content.lines().count() > options.min_source_lines;
                if occurrences.is_empty() && !content.contains(TRACE_MARKER) && substantial {
                    (occurrences, Some(file.clone()))
                } else {
                    (occurrences, None)
                }
            })
            .collect();
        for (occurrences, orphan) in per_file {
            all.extend(occurrences);
            orphans.extend(orphan);
        }
    }
    (merge(all), orphans)
}

fn scan_docs(grammar: &IdGrammar, repo_root: &Path) -> OccurrenceMap {
    let files = collect_files(&repo_root.join("docs"), |path| {
        has_extension(path, &["md"])
    });
    let occurrences: Vec<Vec<Occurrence>> = files
        .par_iter()
        .map(|file| scan::scan_file(grammar, file, SourceCategory::Doc))
        .collect();
    merge(occurrences.into_iter().flatten())
}
