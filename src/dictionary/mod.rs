// src/dictionary/mod.rs - Immutable compiled dictionary snapshot

use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub mod batcher;
pub mod compiler;
pub mod parser;

pub use batcher::{
    LiteralBatch, LiteralBatcher, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, MIN_BATCH_SIZE,
};
pub use compiler::PatternCompiler;
pub use parser::{parse_line, TermParser};

use crate::error::{GuardError, Result};
use crate::types::{
    LoadWarning, MatchReport, PlainTerm, RegexTerm, ReloadOutcome, Term, TermOutcome,
};
use parser::fold_case;

/// Options that shape how dictionary text is parsed and compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryOptions {
    pub treat_lines_as_regex: bool,
    pub ignore_case: bool,
    pub batch_size: usize,
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        Self {
            treat_lines_as_regex: false,
            ignore_case: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Fully compiled matcher. Built in one go, never mutated afterwards, so any
/// number of readers can share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Dictionary {
    plain_terms: Vec<PlainTerm>,
    regex_terms: Vec<RegexTerm>,
    batches: Vec<LiteralBatch>,
    ignore_case: bool,
    source_path: Option<PathBuf>,
    loaded_at: chrono::DateTime<chrono::Utc>,
}

/// A freshly built dictionary plus the warnings collected while building it
#[derive(Debug)]
pub struct LoadedDictionary {
    pub dictionary: Dictionary,
    pub warnings: Vec<LoadWarning>,
}

impl LoadedDictionary {
    /// Summarise this load for the host
    pub fn outcome(&self, elapsed_ms: u64) -> ReloadOutcome {
        ReloadOutcome {
            term_count: self.dictionary.term_count(),
            batch_count: self.dictionary.batch_count(),
            regex_count: self.dictionary.regex_count(),
            warnings: self.warnings.clone(),
            loaded_at: self.dictionary.loaded_at,
            elapsed_ms,
        }
    }
}

impl Dictionary {
    /// Dictionary that matches nothing
    pub fn empty(ignore_case: bool) -> Self {
        Self {
            plain_terms: Vec::new(),
            regex_terms: Vec::new(),
            batches: Vec::new(),
            ignore_case,
            source_path: None,
            loaded_at: chrono::Utc::now(),
        }
    }

    /// Parse and compile dictionary source text.
    ///
    /// Bad lines are dropped with a warning; this never fails as a whole.
    pub fn build_from_source(source: &str, options: DictionaryOptions) -> LoadedDictionary {
        let parser = TermParser::new(options.treat_lines_as_regex, options.ignore_case);
        let compiler = PatternCompiler::default();
        let mut warnings = Vec::new();

        let mut plain_terms = Vec::new();
        let mut regex_terms = Vec::new();
        let mut seen_plain = HashSet::new();
        let mut seen_regex = HashSet::new();
        let mut duplicates = 0usize;

        let normalized = normalize_line_endings(source);
        for (index, raw) in normalized.split('\n').enumerate() {
            let line = index + 1;
            match parser.parse_line(raw) {
                TermOutcome::Skip => {}
                TermOutcome::Plain(text) => {
                    if seen_plain.insert(text.clone()) {
                        plain_terms.push(PlainTerm::new(text, options.ignore_case));
                    } else {
                        duplicates += 1;
                    }
                }
                TermOutcome::Regex { source, flags } => {
                    if !seen_regex.insert((source.clone(), flags)) {
                        duplicates += 1;
                        continue;
                    }
                    match compiler.compile_term(source, flags) {
                        Ok(term) => regex_terms.push(term),
                        Err(e) => warnings.push(LoadWarning::InvalidLine {
                            line,
                            text: raw.trim().to_string(),
                            reason: e.reason,
                        }),
                    }
                }
                TermOutcome::Invalid { reason } => warnings.push(LoadWarning::InvalidLine {
                    line,
                    text: raw.trim().to_string(),
                    reason,
                }),
            }
        }

        if duplicates > 0 {
            debug!("Ignored {} duplicate dictionary entries", duplicates);
        }

        let batcher = LiteralBatcher::new(options.batch_size);
        let (batches, batch_warnings) = batcher.batch(&plain_terms);
        warnings.extend(batch_warnings);

        debug!(
            "Built dictionary: {} plain terms in {} batches (size {}), {} regex terms, {} warnings",
            plain_terms.len(),
            batches.len(),
            batcher.batch_size(),
            regex_terms.len(),
            warnings.len()
        );

        LoadedDictionary {
            dictionary: Self {
                plain_terms,
                regex_terms,
                batches,
                ignore_case: options.ignore_case,
                source_path: None,
                loaded_at: chrono::Utc::now(),
            },
            warnings,
        }
    }

    /// Fast hit-test: true as soon as any batch or regex term matches.
    ///
    /// Batches see the text folded exactly like `matches` folds it for
    /// containment, so both agree on plain terms.
    pub fn hit(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }

        if !self.batches.is_empty() {
            let folded = fold_case(text, self.ignore_case);
            if self.batches.iter().any(|batch| batch.is_match(&folded)) {
                return true;
            }
        }

        self.regex_terms.iter().any(|term| term.is_match(text))
    }

    /// Exhaustive match collection, truncated to `cap` labels (at least one).
    ///
    /// Plain terms are checked by containment against the case-folded text,
    /// regex terms against the original text.
    pub fn matches(&self, text: &str, cap: usize) -> MatchReport {
        let cap = cap.max(1);
        let mut report = MatchReport::default();

        if text.is_empty() {
            return report;
        }

        let folded = fold_case(text, self.ignore_case);
        let plain_hits = self
            .plain_terms
            .iter()
            .filter(|term| folded.contains(term.text.as_str()))
            .map(|term| term.text.clone());
        let regex_hits = self
            .regex_terms
            .iter()
            .filter(|term| term.is_match(text))
            .map(RegexTerm::label);

        for label in plain_hits.chain(regex_hits) {
            report.total += 1;
            if report.labels.len() < cap {
                report.labels.push(label);
            }
        }

        report
    }

    /// All terms in parse order, plain terms first
    pub fn terms(&self) -> impl Iterator<Item = Term> + '_ {
        self.plain_terms
            .iter()
            .cloned()
            .map(Term::Plain)
            .chain(self.regex_terms.iter().cloned().map(Term::Regex))
    }

    pub fn plain_terms(&self) -> &[PlainTerm] {
        &self.plain_terms
    }

    pub fn regex_terms(&self) -> &[RegexTerm] {
        &self.regex_terms
    }

    pub fn batches(&self) -> &[LiteralBatch] {
        &self.batches
    }

    pub fn term_count(&self) -> usize {
        self.plain_terms.len()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn regex_count(&self) -> usize {
        self.regex_terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plain_terms.is_empty() && self.regex_terms.is_empty()
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn loaded_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.loaded_at
    }
}

/// Read, decode and compile a dictionary file.
///
/// I/O failures map to `SourceUnavailable`, non-UTF-8 content to `Decode`.
pub fn load_file(path: &Path, options: DictionaryOptions) -> Result<LoadedDictionary> {
    let bytes = std::fs::read(path).map_err(|source| GuardError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let source = decode_source(path, bytes)?;

    let mut loaded = Dictionary::build_from_source(&source, options);
    loaded.dictionary.source_path = Some(path.to_path_buf());

    for warning in &loaded.warnings {
        warn!("{}: {}", path.display(), warning);
    }

    Ok(loaded)
}

/// Decode raw dictionary bytes as UTF-8
pub fn decode_source(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|source| GuardError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn normalize_line_endings(source: &str) -> String {
    source.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "赌博\n/fu+ck/i\n# comment\nspam";

    fn sample() -> LoadedDictionary {
        Dictionary::build_from_source(SAMPLE, DictionaryOptions::default())
    }

    fn build(source: &str) -> Dictionary {
        Dictionary::build_from_source(source, DictionaryOptions::default()).dictionary
    }

    #[test]
    fn test_sample_dictionary_classification() {
        let loaded = sample();
        let dictionary = &loaded.dictionary;

        assert!(loaded.warnings.is_empty());
        assert_eq!(dictionary.term_count(), 2);
        assert_eq!(dictionary.regex_count(), 1);
        assert_eq!(dictionary.batch_count(), 1);

        let plain: Vec<&str> = dictionary.plain_terms().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(plain, vec!["赌博", "spam"]);
        assert_eq!(dictionary.regex_terms()[0].label(), "/fu+ck/i");
    }

    #[test]
    fn test_sample_hit_test() {
        let dictionary = sample().dictionary;
        assert!(dictionary.hit("这是赌博网站"));
        assert!(dictionary.hit("fuuuck you"));
        assert!(!dictionary.hit("hello world"));
        assert!(!dictionary.hit(""));
    }

    #[test]
    fn test_sample_match_collection() {
        let dictionary = sample().dictionary;
        let report = dictionary.matches("赌博和spam都有", 10);

        assert_eq!(report.total, 2);
        assert!(report.labels.contains(&"赌博".to_string()));
        assert!(report.labels.contains(&"spam".to_string()));
        assert!(!report.is_truncated());
    }

    #[test]
    fn test_match_collection_is_capped() {
        let dictionary = build("one\ntwo\nthree\n/f(our)?/");
        let report = dictionary.matches("one two three four", 2);

        assert_eq!(report.labels, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(report.total, 4);
        assert!(report.is_truncated());

        // A zero cap still reports one label
        assert_eq!(dictionary.matches("one two", 0).labels.len(), 1);
    }

    #[test]
    fn test_case_folding_toggle() {
        let folded = build("Spam");
        assert_eq!(folded.plain_terms()[0].text, "spam");
        assert!(folded.hit("this is SPAM"));
        assert_eq!(folded.matches("this is SPAM", 5).labels, vec!["spam".to_string()]);

        let options = DictionaryOptions {
            ignore_case: false,
            ..DictionaryOptions::default()
        };
        let exact = Dictionary::build_from_source("Spam", options).dictionary;
        assert!(!exact.hit("this is SPAM"));
        assert!(exact.hit("this is Spam"));
        assert!(exact.matches("this is SPAM", 5).is_empty());
    }

    #[test]
    fn test_hit_and_matches_agree_beyond_ascii() {
        let dictionary = build("İstanbul\nſpam\nΣΟΦΙΑ\nStraße\n");
        assert_eq!(dictionary.plain_terms()[0].text, "i\u{307}stanbul");

        for text in [
            "visit İstanbul now",
            "VISIT İSTANBUL",
            "buy spam",
            "buy ſpam",
            "BUY ſPAM",
            "σοφια",
            "ΣΟΦΙΑ!",
            "STRASSE",
            "straße",
        ] {
            assert_eq!(
                dictionary.hit(text),
                !dictionary.matches(text, 10).is_empty(),
                "tiers disagree on {text}"
            );
        }

        assert!(dictionary.hit("visit İstanbul now"));
        assert!(!dictionary.hit("buy spam"));
        assert!(dictionary.hit("buy ſpam"));
    }

    #[test]
    fn test_every_plain_term_hits_itself() {
        let source = "Crypto Pump\nfree v-bucks\n(click)\n加微信\nc++";
        let dictionary = build(source);

        for term in dictionary.plain_terms() {
            assert!(dictionary.hit(&term.text), "no hit for {}", term.text);
            assert!(dictionary.matches(&term.text, 1).labels.contains(&term.text));
        }
        assert!(dictionary.hit("CRYPTO PUMP incoming"));
    }

    #[test]
    fn test_single_bad_line_does_not_abort_load() {
        let mut source: Vec<String> = (1..=9).map(|i| format!("word{}", i)).collect();
        source.insert(4, "/spam(?!filter)/".to_string());
        let loaded =
            Dictionary::build_from_source(&source.join("\n"), DictionaryOptions::default());

        assert_eq!(loaded.dictionary.term_count(), 9);
        assert_eq!(loaded.dictionary.regex_count(), 0);
        assert_eq!(loaded.warnings.len(), 1);
        match &loaded.warnings[0] {
            LoadWarning::InvalidLine { line, text, .. } => {
                assert_eq!(*line, 5);
                assert_eq!(text, "/spam(?!filter)/");
            }
            other => panic!("unexpected warning {:?}", other),
        }
    }

    #[test]
    fn test_batch_size_one_and_clamped_maximum() {
        let source: String = (0..120).map(|i| format!("term{:03}\n", i)).collect();

        let per_term = DictionaryOptions {
            batch_size: 1,
            ..DictionaryOptions::default()
        };
        assert_eq!(Dictionary::build_from_source(&source, per_term).dictionary.batch_count(), 120);

        let huge = DictionaryOptions {
            batch_size: 100_000,
            ..DictionaryOptions::default()
        };
        assert_eq!(Dictionary::build_from_source(&source, huge).dictionary.batch_count(), 1);

        let many: String = (0..MAX_BATCH_SIZE + 10).map(|i| format!("t{}\n", i)).collect();
        let dictionary = Dictionary::build_from_source(&many, huge).dictionary;
        assert_eq!(dictionary.batch_count(), 2);
        assert_eq!(dictionary.batches()[0].term_count, MAX_BATCH_SIZE);
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let dictionary = build("spam\nSPAM\nspam\n/x+/\n/x+/");
        assert_eq!(dictionary.term_count(), 1);
        assert_eq!(dictionary.regex_count(), 1);
    }

    #[test]
    fn test_line_endings_are_normalised() {
        let dictionary = build("alpha\r\nbeta\rgamma\n");
        let plain: Vec<&str> = dictionary.plain_terms().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(plain, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_regex_mode_dictionary() {
        let options = DictionaryOptions {
            treat_lines_as_regex: true,
            ..DictionaryOptions::default()
        };
        let dictionary = Dictionary::build_from_source("v-?bucks\n/exact/", options).dictionary;
        assert_eq!(dictionary.term_count(), 0);
        assert_eq!(dictionary.regex_count(), 2);
        assert_eq!(dictionary.batch_count(), 0);
        assert!(dictionary.hit("free VBUCKS"));
    }

    #[test]
    fn test_empty_dictionary_matches_nothing() {
        let dictionary = Dictionary::empty(true);
        assert!(dictionary.is_empty());
        assert!(!dictionary.hit("anything"));
        assert!(dictionary.matches("anything", 5).is_empty());
    }

    #[test]
    fn test_load_file_records_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let loaded = load_file(file.path(), DictionaryOptions::default()).unwrap();
        assert_eq!(loaded.dictionary.source_path(), Some(file.path()));
        assert_eq!(loaded.outcome(0).term_count, 2);
    }

    #[test]
    fn test_load_file_errors() {
        let missing = std::env::temp_dir().join("notaguard-definitely-missing.txt");
        assert!(matches!(
            load_file(&missing, DictionaryOptions::default()),
            Err(GuardError::SourceUnavailable { .. })
        ));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x73, 0x70, 0xff, 0xfe, 0x0a]).unwrap();
        assert!(matches!(
            load_file(file.path(), DictionaryOptions::default()),
            Err(GuardError::Decode { .. })
        ));
    }
}
