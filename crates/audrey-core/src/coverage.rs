//! Coverage analysis and composite traceability scoring

use crate::audit::AuditResult;
use crate::grammar::IdGrammar;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-prefix coverage at or above this percentage is "OK".
pub const PREFIX_OK_THRESHOLD: f64 = 80.0;
/// Per-prefix coverage at or above this percentage is "WARN"; below, "FAIL".
pub const PREFIX_WARN_THRESHOLD: f64 = 50.0;

/// Status band for a per-prefix coverage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoverageStatus {
    Ok,
    Warn,
    Fail,
}

impl CoverageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CoverageStatus::Ok => "[OK]",
            CoverageStatus::Warn => "[WARN]",
            CoverageStatus::Fail => "[FAIL]",
        }
    }

    fn for_percent(percent: f64) -> Self {
        if percent >= PREFIX_OK_THRESHOLD {
            CoverageStatus::Ok
        } else if percent >= PREFIX_WARN_THRESHOLD {
            CoverageStatus::Warn
        } else {
            CoverageStatus::Fail
        }
    }
}

/// Coverage counts for one identifier family.
#[derive(Debug, Clone, Serialize)]
pub struct PrefixCoverage {
    pub prefix: String,
    pub type_name: Option<String>,
    pub total: usize,
    pub tested: usize,
    pub traced: usize,
    pub percent: f64,
    pub status: CoverageStatus,
}

/// Letter grade over the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Bands are inclusive at the lower bound and contiguous.
    pub fn for_score(score: u32) -> Self {
        if score >= 90 {
            Grade::A
        } else if score >= 70 {
            Grade::B
        } else if score >= 50 {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Grade::A => "A - Excellent traceability",
            Grade::B => "B - Good traceability",
            Grade::C => "C - Needs improvement",
            Grade::D => "D - Significant gaps",
        }
    }
}

/// Composite score, additive over four independent components.
///
/// Every component is computed on every run; there is no early exit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub conflict_count: usize,
    /// +30 when no conflicts exist.
    pub conflict_points: u32,
    pub coverage_percent: f64,
    /// +30 at >= 70% requirement coverage, floor-scaled partial credit below.
    pub coverage_points: u32,
    pub orphan_test_percent: f64,
    /// +20 when orphan tests stay under 20% of test files. Threshold gate,
    /// no partial credit.
    pub orphan_test_points: u32,
    pub orphan_source_count: usize,
    /// +20 when fewer than 5 orphan source files exist. Absolute count.
    pub orphan_source_points: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.conflict_points + self.coverage_points + self.orphan_test_points
            + self.orphan_source_points
    }

    pub fn grade(&self) -> Grade {
        Grade::for_score(self.total())
    }

    fn compute(
        result: &AuditResult,
        requirement_ids: &BTreeSet<&String>,
        covered: &BTreeSet<&String>,
    ) -> Self {
        let conflict_count = result.conflicts.len();
        let conflict_points = if conflict_count == 0 { 30 } else { 0 };

        // An empty-but-valid project counts as fully covered.
        let coverage_percent = if requirement_ids.is_empty() {
            100.0
        } else {
            let covered_requirements = requirement_ids.intersection(covered).count();
            covered_requirements as f64 / requirement_ids.len() as f64 * 100.0
        };
        let coverage_points = if coverage_percent >= 70.0 {
            30
        } else {
            (coverage_percent / 70.0 * 30.0).floor() as u32
        };

        let test_file_count = result.test_file_count.max(1);
        let orphan_test_percent = result.orphan_tests.len() as f64 / test_file_count as f64 * 100.0;
        let orphan_test_points = if orphan_test_percent < 20.0 { 20 } else { 0 };

        let orphan_source_count = result.orphan_sources.len();
        let orphan_source_points = if orphan_source_count < 5 { 20 } else { 0 };

        ScoreBreakdown {
            conflict_count,
            conflict_points,
            coverage_percent,
            coverage_points,
            orphan_test_percent,
            orphan_test_points,
            orphan_source_count,
            orphan_source_points,
        }
    }
}

/// Derived read-only coverage view over an [`AuditResult`].
///
/// Recomputed on every render; never cached across runs.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub total_ids: usize,
    pub requirement_count: usize,
    pub tested_count: usize,
    pub traced_count: usize,
    /// Requirement ids with neither test nor source coverage, sorted.
    pub uncovered: Vec<String>,
    /// Per-family coverage rows, in lexical prefix order.
    pub prefixes: Vec<PrefixCoverage>,
    pub score: ScoreBreakdown,
}

impl CoverageReport {
    pub fn compute(result: &AuditResult, grammar: &IdGrammar) -> Self {
        let requirement_ids: BTreeSet<&String> = result.requirements.keys().collect();
        let tested_ids: BTreeSet<&String> = result.tests.keys().collect();
        let traced_ids: BTreeSet<&String> = result.sources.keys().collect();
        let covered: BTreeSet<&String> = tested_ids.union(&traced_ids).copied().collect();

        let uncovered: Vec<String> = requirement_ids
            .iter()
            .filter(|id| !covered.contains(*id))
            .map(|id| (**id).clone())
            .collect();

        let mut by_prefix: BTreeMap<String, PrefixCoverage> = BTreeMap::new();
        for id in &result.all_ids {
            let prefix = match grammar.prefix_of(id) {
                Some(prefix) => prefix,
                // all_ids came from the grammar, but stay total anyway
                None => id.split('-').next().unwrap_or(id.as_str()),
            };
            let row = by_prefix
                .entry(prefix.to_string())
                .or_insert_with(|| PrefixCoverage {
                    prefix: prefix.to_string(),
                    type_name: grammar.type_name_of(id).map(str::to_string),
                    total: 0,
                    tested: 0,
                    traced: 0,
                    percent: 0.0,
                    status: CoverageStatus::Fail,
                });
            row.total += 1;
            if tested_ids.contains(id) {
                row.tested += 1;
            }
            if traced_ids.contains(id) {
                row.traced += 1;
            }
        }
        let mut prefixes: Vec<PrefixCoverage> = by_prefix.into_values().collect();
        for row in &mut prefixes {
            row.percent = if row.total > 0 {
                (row.tested + row.traced) as f64 / row.total as f64 * 100.0
            } else {
                0.0
            };
            row.status = CoverageStatus::for_percent(row.percent);
        }

        let score = ScoreBreakdown::compute(result, &requirement_ids, &covered);

        CoverageReport {
            total_ids: result.all_ids.len(),
            requirement_count: requirement_ids.len(),
            tested_count: tested_ids.len(),
            traced_count: traced_ids.len(),
            uncovered,
            prefixes,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::OccurrenceMap;
    use crate::scan::{Occurrence, SourceCategory};
    use std::path::PathBuf;

    fn map_of(category: SourceCategory, ids: &[&str]) -> OccurrenceMap {
        let mut map = OccurrenceMap::new();
        for id in ids {
            map.entry(id.to_string()).or_default().push(Occurrence {
                id: id.to_string(),
                file: PathBuf::from("fixture"),
                line: 1,
                category,
                snippet: format!("id: {id}"),
            });
        }
        map
    }

    fn result_with(
        requirements: &[&str],
        tests: &[&str],
        sources: &[&str],
        test_file_count: usize,
    ) -> AuditResult {
        let requirements = map_of(SourceCategory::Requirement, requirements);
        let tests = map_of(SourceCategory::Test, tests);
        let sources = map_of(SourceCategory::Source, sources);
        let mut all_ids = std::collections::BTreeSet::new();
        for map in [&requirements, &tests, &sources] {
            all_ids.extend(map.keys().cloned());
        }
        AuditResult {
            all_ids,
            requirements,
            tests,
            sources,
            test_file_count,
            ..AuditResult::default()
        }
    }

    #[test]
    fn seventy_percent_coverage_meets_the_bonus_threshold_exactly() {
        let requirements: Vec<String> = (1..=10).map(|n| format!("FT-{n:03}")).collect();
        let tested: Vec<String> = (1..=7).map(|n| format!("FT-{n:03}")).collect();
        let req_refs: Vec<&str> = requirements.iter().map(String::as_str).collect();
        let test_refs: Vec<&str> = tested.iter().map(String::as_str).collect();

        let result = result_with(&req_refs, &test_refs, &[], 7);
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());

        assert_eq!(report.score.coverage_percent, 70.0);
        assert_eq!(report.score.coverage_points, 30);

        let ft = &report.prefixes[0];
        assert_eq!(ft.prefix, "FT");
        assert_eq!(ft.total, 10);
        assert_eq!(ft.tested, 7);
        assert_eq!(ft.traced, 0);
        assert_eq!(ft.percent, 70.0);
        assert_eq!(ft.status, CoverageStatus::Warn);
    }

    #[test]
    fn partial_coverage_credit_is_floored() {
        let result = result_with(&["FT-001", "FT-002", "FT-003", "FT-004"], &["FT-001"], &[], 1);
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        // 25% of 70% target: floor(25 / 70 * 30) = floor(10.71..) = 10
        assert_eq!(report.score.coverage_percent, 25.0);
        assert_eq!(report.score.coverage_points, 10);
    }

    #[test]
    fn empty_project_scores_full_marks() {
        let result = result_with(&[], &[], &[], 0);
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        assert_eq!(report.score.coverage_percent, 100.0);
        assert_eq!(report.score.total(), 100);
        assert_eq!(report.score.grade(), Grade::A);
    }

    #[test]
    fn coverage_outside_requirements_does_not_exceed_hundred() {
        // Tests reference ids that requirements never define.
        let result = result_with(&["FT-001"], &["FT-001", "US-001", "US-002"], &[], 3);
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        assert_eq!(report.score.coverage_percent, 100.0);
    }

    #[test]
    fn conflicts_forfeit_the_conflict_bonus_only() {
        let mut result = result_with(&["FT-001"], &["FT-001"], &[], 1);
        result.conflicts.push(crate::audit::Conflict {
            id: "FT-001".to_string(),
            defining_files: vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")],
            occurrences: Vec::new(),
        });
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        assert_eq!(report.score.conflict_points, 0);
        assert_eq!(report.score.coverage_points, 30);
        assert_eq!(report.score.total(), 70);
        assert_eq!(report.score.grade(), Grade::B);
    }

    #[test]
    fn orphan_test_gate_is_strict_at_twenty_percent() {
        let mut result = result_with(&["FT-001"], &["FT-001"], &[], 5);
        result.orphan_tests.push(PathBuf::from("tests/test_a.py"));
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        // 1 of 5 = 20%, which is not under 20%.
        assert_eq!(report.score.orphan_test_percent, 20.0);
        assert_eq!(report.score.orphan_test_points, 0);

        result.test_file_count = 6;
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        assert_eq!(report.score.orphan_test_points, 20);
    }

    #[test]
    fn orphan_source_gate_is_an_absolute_count() {
        let mut result = result_with(&["FT-001"], &["FT-001"], &[], 1);
        for n in 0..4 {
            result.orphan_sources.push(PathBuf::from(format!("src/m{n}.py")));
        }
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        assert_eq!(report.score.orphan_source_points, 20);

        result.orphan_sources.push(PathBuf::from("src/m4.py"));
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        assert_eq!(report.score.orphan_source_points, 0);
    }

    #[test]
    fn score_never_leaves_the_unit_range() {
        let cases = [
            result_with(&[], &[], &[], 0),
            result_with(&["FT-001", "US-001"], &[], &[], 0),
            result_with(&["FT-001"], &["FT-001"], &["FT-001"], 3),
        ];
        for result in cases {
            let report = CoverageReport::compute(&result, &IdGrammar::builtin());
            assert!(report.score.total() <= 100);
        }
    }

    #[test]
    fn grade_bands_are_inclusive_at_the_lower_bound() {
        assert_eq!(Grade::for_score(100), Grade::A);
        assert_eq!(Grade::for_score(90), Grade::A);
        assert_eq!(Grade::for_score(89), Grade::B);
        assert_eq!(Grade::for_score(70), Grade::B);
        assert_eq!(Grade::for_score(69), Grade::C);
        assert_eq!(Grade::for_score(50), Grade::C);
        assert_eq!(Grade::for_score(49), Grade::D);
        assert_eq!(Grade::for_score(0), Grade::D);
    }

    #[test]
    fn uncovered_lists_requirements_missing_from_tests_and_sources() {
        let result = result_with(&["FT-001", "FT-002", "US-001"], &["FT-001"], &["US-001"], 1);
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        assert_eq!(report.uncovered, vec!["FT-002".to_string()]);
        assert_eq!(report.total_ids, 3);
        assert_eq!(report.requirement_count, 3);
        assert_eq!(report.tested_count, 1);
        assert_eq!(report.traced_count, 1);
    }

    #[test]
    fn prefix_rows_carry_type_names_in_lexical_order() {
        let result = result_with(&["US-001", "FT-001", "ADR-001"], &[], &[], 0);
        let report = CoverageReport::compute(&result, &IdGrammar::builtin());
        let prefixes: Vec<&str> = report.prefixes.iter().map(|p| p.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["ADR", "FT", "US"]);
        assert_eq!(
            report.prefixes[0].type_name.as_deref(),
            Some("Architecture Decision Record")
        );
    }
}
