//! Identifier grammar for requirement artifact IDs
//!
//! Every subsystem in the audit pipeline matches identifiers through one
//! compiled pattern set, built from a registry of recognized prefixes. The
//! canonical forms are `PREFIX-DIGITS` (`FT-001`, `US-14`) and
//! `PREFIX-CLUSTER-DIGITS` (`RISK-IAM-001`), with one or more digits.

use eyre::{Result, bail};
use regex::Regex;
use std::collections::BTreeMap;

/// Grammar schema version attached to audit results.
///
/// Version 1 identifiers were fixed to exactly three digits. Version 2 accepts
/// any digit count and the cluster-qualified form (`RISK-IAM-001`).
pub const GRAMMAR_VERSION: u32 = 2;

/// Registry of recognized identifier prefixes.
///
/// Passed into [`IdGrammar::new`] at construction time so that multiple
/// grammars (e.g. per-project registries in tests) can coexist.
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    prefixes: BTreeMap<String, String>,
}

impl Default for GrammarConfig {
    /// The built-in eight-family registry.
    fn default() -> Self {
        let mut config = Self::new();
        for (prefix, type_name) in [
            ("FT", "Feature"),
            ("US", "User Story"),
            ("EP", "Epic"),
            ("RISK", "Risk"),
            ("RC", "Risk Cluster"),
            ("DC", "Design Control"),
            ("GR", "Guidance Reference"),
            ("ADR", "Architecture Decision Record"),
        ] {
            config = config.register(prefix, type_name);
        }
        config
    }
}

impl GrammarConfig {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            prefixes: BTreeMap::new(),
        }
    }

    /// Register a prefix with its human-readable type name.
    pub fn register(mut self, prefix: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into(), type_name.into());
        self
    }

    /// Iterate registered `(prefix, type name)` pairs in lexical order.
    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes
            .iter()
            .map(|(prefix, name)| (prefix.as_str(), name.as_str()))
    }

    /// Number of registered prefixes.
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// A single identifier match within a line of text.
///
/// `start`/`end` are byte offsets into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMatch<'t> {
    pub id: &'t str,
    pub start: usize,
    pub end: usize,
}

/// Compiled identifier grammar.
///
/// The scanner, classifier, and conflict detector all operate through the same
/// instance; there is no second pattern set anywhere in the pipeline.
#[derive(Debug, Clone)]
pub struct IdGrammar {
    types: BTreeMap<String, String>,
    pattern: Regex,
    anchored: Regex,
}

impl IdGrammar {
    /// Compile a grammar from a prefix registry.
    ///
    /// Fails on an empty registry or on a prefix that is not an upper-case
    /// ASCII word starting with a letter.
    pub fn new(config: &GrammarConfig) -> Result<Self> {
        if config.is_empty() {
            bail!("identifier grammar needs at least one registered prefix");
        }
        for (prefix, _) in config.prefixes() {
            let mut chars = prefix.chars();
            let valid_head = chars.next().is_some_and(|c| c.is_ascii_uppercase());
            let valid_tail = chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if !valid_head || !valid_tail {
                bail!("invalid identifier prefix {prefix:?}: must be upper-case ASCII");
            }
        }

        // Longest prefix first, so a short prefix never eats the head of a
        // longer one in the alternation.
        let mut ordered: Vec<&str> = config.prefixes().map(|(prefix, _)| prefix).collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = ordered
            .iter()
            .map(|prefix| regex::escape(prefix))
            .collect::<Vec<_>>()
            .join("|");
        let body = format!(r"\b(?:{alternation})-(?:[A-Z][A-Z0-9]*-)?[0-9]+\b");

        Ok(Self {
            pattern: Regex::new(&body)?,
            anchored: Regex::new(&format!("^(?:{body})$"))?,
            types: config
                .prefixes()
                .map(|(prefix, name)| (prefix.to_string(), name.to_string()))
                .collect(),
        })
    }

    /// Grammar over the built-in registry.
    pub fn builtin() -> Self {
        Self::new(&GrammarConfig::default()).expect("built-in registry is valid")
    }

    /// Find every non-overlapping identifier in `text`.
    pub fn find_all<'a>(&'a self, text: &'a str) -> impl Iterator<Item = IdMatch<'a>> + 'a {
        self.pattern.find_iter(text).map(|m| IdMatch {
            id: m.as_str(),
            start: m.start(),
            end: m.end(),
        })
    }

    /// Whether `text` is exactly one identifier, nothing else.
    pub fn is_identifier(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    /// The registered prefix of an identifier, if any.
    pub fn prefix_of(&self, id: &str) -> Option<&str> {
        let head = id.split('-').next()?;
        self.types.get_key_value(head).map(|(key, _)| key.as_str())
    }

    /// Human-readable type name for an identifier's family, if registered.
    pub fn type_name_of(&self, id: &str) -> Option<&str> {
        let head = id.split('-').next()?;
        self.types.get(head).map(String::as_str)
    }

    /// Whether `line` is the authoritative definition of `id`.
    ///
    /// The line, modulo a leading `- ` list marker and surrounding whitespace,
    /// must read `id: <identifier>` with the literal key `id` (any case) and
    /// the identifier ending on a word boundary. Suffixed keys (`epic_id:`,
    /// `feature_id:`) never count, and neither does a line whose `id:` defines
    /// a longer identifier that merely shares a prefix with `id`.
    pub fn is_definition_line(&self, line: &str, id: &str) -> bool {
        let mut rest = line.trim();
        if let Some(stripped) = rest.strip_prefix("- ") {
            rest = stripped.trim_start();
        }
        let Some(after_key) = strip_id_key(rest) else {
            return false;
        };
        let Some(tail) = after_key.trim_start().strip_prefix(id) else {
            return false;
        };
        !tail.chars().next().is_some_and(is_word_char)
    }
}

/// Strip a case-insensitive `id:` key from the start of `text`.
///
/// Anchored at the start, so `epic_id:` and friends never match.
fn strip_id_key(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 || bytes[2] != b':' {
        return None;
    }
    if !bytes[0].eq_ignore_ascii_case(&b'i') || !bytes[1].eq_ignore_ascii_case(&b'd') {
        return None;
    }
    Some(&text[3..])
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(grammar: &IdGrammar, text: &str) -> Vec<String> {
        grammar.find_all(text).map(|m| m.id.to_string()).collect()
    }

    #[test]
    fn matches_every_builtin_family() {
        let grammar = IdGrammar::builtin();
        let text = "FT-001 US-014 EP-002 RISK-003 RC-004 DC-005 GR-006 ADR-007";
        assert_eq!(
            ids(&grammar, text),
            vec![
                "FT-001", "US-014", "EP-002", "RISK-003", "RC-004", "DC-005", "GR-006", "ADR-007"
            ]
        );
    }

    #[test]
    fn digit_count_is_unconstrained() {
        let grammar = IdGrammar::builtin();
        assert_eq!(ids(&grammar, "FT-1 FT-0001 US-12345"), vec![
            "FT-1", "FT-0001", "US-12345"
        ]);
    }

    #[test]
    fn embedded_tokens_do_not_match() {
        let grammar = IdGrammar::builtin();
        assert!(ids(&grammar, "XFT-001").is_empty());
        assert!(ids(&grammar, "FT-0011X").is_empty());
        assert!(ids(&grammar, "ft-001").is_empty());
    }

    #[test]
    fn punctuation_bounded_tokens_match() {
        let grammar = IdGrammar::builtin();
        assert_eq!(ids(&grammar, "(FT-001), [US-002]."), vec![
            "FT-001", "US-002"
        ]);
    }

    #[test]
    fn cluster_qualified_risk_ids_match() {
        let grammar = IdGrammar::builtin();
        assert_eq!(ids(&grammar, "RISK-IAM-001 mitigates RC-IAM"), vec![
            "RISK-IAM-001"
        ]);
        // A cluster label without digits is not an identifier.
        assert!(ids(&grammar, "RC-IAM").is_empty());
        assert!(!grammar.is_identifier("RC-IAM"));
        assert!(grammar.is_identifier("RISK-IAM-001"));
    }

    #[test]
    fn longest_prefix_wins_in_alternation() {
        let config = GrammarConfig::new()
            .register("AD", "Advisory")
            .register("ADR", "Architecture Decision Record");
        let grammar = IdGrammar::new(&config).expect("valid registry");
        assert_eq!(ids(&grammar, "ADR-001 AD-002"), vec!["ADR-001", "AD-002"]);
        assert_eq!(grammar.prefix_of("ADR-001"), Some("ADR"));
    }

    #[test]
    fn prefix_and_type_lookup() {
        let grammar = IdGrammar::builtin();
        assert_eq!(grammar.prefix_of("RISK-IAM-001"), Some("RISK"));
        assert_eq!(grammar.type_name_of("FT-001"), Some("Feature"));
        assert_eq!(grammar.type_name_of("ZZ-001"), None);
        assert_eq!(grammar.prefix_of("no dash"), None);
    }

    #[test]
    fn every_match_has_a_registered_prefix() {
        let grammar = IdGrammar::builtin();
        let text = "FT-001 RISK-IAM-002 junk XEP-9 ADR-3";
        for m in grammar.find_all(text) {
            assert!(grammar.prefix_of(m.id).is_some(), "no prefix for {}", m.id);
        }
    }

    #[test]
    fn match_spans_are_byte_offsets() {
        let grammar = IdGrammar::builtin();
        let matches: Vec<IdMatch> = grammar.find_all("see FT-001.").collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start, 4);
        assert_eq!(matches[0].end, 10);
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(IdGrammar::new(&GrammarConfig::new()).is_err());
    }

    #[test]
    fn lowercase_prefix_is_rejected() {
        let config = GrammarConfig::new().register("ft", "Feature");
        assert!(IdGrammar::new(&config).is_err());
    }

    mod definition_lines {
        use super::*;

        #[test]
        fn plain_and_listed_definitions_match() {
            let grammar = IdGrammar::builtin();
            assert!(grammar.is_definition_line("id: FT-001", "FT-001"));
            assert!(grammar.is_definition_line("- id: FT-001", "FT-001"));
            assert!(grammar.is_definition_line("  id: FT-001", "FT-001"));
            assert!(grammar.is_definition_line("id:FT-001", "FT-001"));
        }

        #[test]
        fn key_is_case_insensitive() {
            let grammar = IdGrammar::builtin();
            assert!(grammar.is_definition_line("ID: FT-001", "FT-001"));
            assert!(grammar.is_definition_line("Id: FT-001", "FT-001"));
        }

        #[test]
        fn trailing_commentary_is_allowed() {
            let grammar = IdGrammar::builtin();
            assert!(grammar.is_definition_line("id: FT-001  # primary login", "FT-001"));
        }

        #[test]
        fn suffixed_keys_are_references() {
            let grammar = IdGrammar::builtin();
            assert!(!grammar.is_definition_line("epic_id: EP-001", "EP-001"));
            assert!(!grammar.is_definition_line("feature_id: FT-001", "FT-001"));
            assert!(!grammar.is_definition_line("parent_task_id: US-002", "US-002"));
        }

        #[test]
        fn defining_a_longer_id_is_not_a_definition_of_the_shorter_one() {
            let grammar = IdGrammar::builtin();
            assert!(!grammar.is_definition_line("id: FT-0010", "FT-001"));
            assert!(grammar.is_definition_line("id: FT-0010", "FT-0010"));
        }

        #[test]
        fn identifier_is_case_sensitive() {
            let grammar = IdGrammar::builtin();
            assert!(!grammar.is_definition_line("id: ft-001", "FT-001"));
        }

        #[test]
        fn bare_references_are_not_definitions() {
            let grammar = IdGrammar::builtin();
            assert!(!grammar.is_definition_line("- FT-001", "FT-001"));
            assert!(!grammar.is_definition_line("see FT-001 for details", "FT-001"));
        }
    }
}
