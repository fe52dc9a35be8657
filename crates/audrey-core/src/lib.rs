//! audrey-core - Core library for requirements traceability auditing
//!
//! This crate provides the building blocks for:
//! - Matching requirement identifiers (`FT-001`, `US-014`, `RISK-IAM-002`, ...)
//!   through a single configurable grammar
//! - Scanning files for identifier occurrences with line and context info
//! - Auditing a whole repository across four source categories
//!   (requirements, tests, sources, docs)
//! - Detecting identifiers defined in more than one file
//! - Computing coverage statistics and a composite traceability score
//!
//! # Matching and classifying identifiers
//!
//! The grammar is the single source of truth: the scanner, the classifier,
//! and the conflict detector all go through one [`IdGrammar`] instance.
//! A line is a *definition* only when an `id:` key maps directly to the
//! identifier; suffixed keys like `epic_id:` are references.
//!
//! ```
//! use audrey_core::{GrammarConfig, IdGrammar, SourceCategory, scan_content};
//! use std::path::Path;
//!
//! let grammar = IdGrammar::new(&GrammarConfig::default()).unwrap();
//! let occurrences = scan_content(
//!     &grammar,
//!     Path::new("features.yaml"),
//!     "- id: FT-001\n  epic_id: EP-001\n",
//!     SourceCategory::Requirement,
//! );
//!
//! assert_eq!(occurrences.len(), 2);
//! assert!(grammar.is_definition_line(&occurrences[0].snippet, "FT-001"));
//! assert!(!grammar.is_definition_line(&occurrences[1].snippet, "EP-001"));
//! ```
//!
//! # Auditing a repository
//!
//! [`run_audit`] walks `requirements/`, `tests/`, `src/` (plus `apps/*/src`
//! and `apps/*/tests`), and `docs/`, merges every occurrence by identifier,
//! and flags conflicts and orphan files. [`CoverageReport::compute`] derives
//! the coverage tables and the 0-100 composite score from the result:
//!
//! ```no_run
//! use audrey_core::{AuditOptions, CoverageReport, IdGrammar, run_audit};
//! use std::path::Path;
//!
//! let grammar = IdGrammar::builtin();
//! let result = run_audit(&grammar, Path::new("."), &AuditOptions::default());
//! let coverage = CoverageReport::compute(&result, &grammar);
//! println!("score: {}/100", coverage.score.total());
//! ```
//!
//! Scanning never fails: unreadable files log a warning and contribute zero
//! occurrences, and missing category directories simply produce zero results.

mod audit;
mod coverage;
mod grammar;
mod scan;

pub use audit::{
    AuditOptions, AuditResult, Conflict, Definition, MIN_SOURCE_LINES_FOR_ORPHAN_CHECK,
    OccurrenceMap, PACKAGE_INIT_FILES, SOURCE_EXTENSIONS, check_duplicate_definitions,
    detect_conflicts, find_definitions, run_audit,
};
pub use coverage::{
    CoverageReport, CoverageStatus, Grade, PREFIX_OK_THRESHOLD, PREFIX_WARN_THRESHOLD,
    PrefixCoverage, ScoreBreakdown,
};
pub use grammar::{GRAMMAR_VERSION, GrammarConfig, IdGrammar, IdMatch};
pub use scan::{
    MAX_SNIPPET_LEN, Occurrence, STORY_MARKER, SourceCategory, TRACE_MARKER, read_lenient,
    scan_content, scan_file,
};
