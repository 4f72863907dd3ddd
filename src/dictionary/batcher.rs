// src/dictionary/batcher.rs - Literal term batching into alternation patterns

use log::warn;
use regex::{Regex, RegexBuilder};

use crate::dictionary::compiler::{describe_regex_error, DEFAULT_SIZE_LIMIT};
use crate::types::{LoadWarning, PlainTerm};

/// Lowest batch size accepted from configuration
pub const MIN_BATCH_SIZE: usize = 50;
/// Highest batch size, applied everywhere
pub const MAX_BATCH_SIZE: usize = 2000;
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// One compiled alternation covering a contiguous slice of plain terms
#[derive(Debug, Clone)]
pub struct LiteralBatch {
    pub pattern: Regex,
    /// Index of the first covered term in parse order
    pub first_term: usize,
    pub term_count: usize,
}

impl LiteralBatch {
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Groups plain terms into fixed-size batches and compiles each batch into
/// one escaped alternation.
///
/// Batches match case-sensitively. Terms arrive already case-folded, and the
/// caller folds the text the same way before matching.
#[derive(Debug, Clone, Copy)]
pub struct LiteralBatcher {
    batch_size: usize,
    size_limit: usize,
}

impl LiteralBatcher {
    /// Batch size is clamped to `1..=MAX_BATCH_SIZE`. The configuration layer
    /// applies the stricter `MIN_BATCH_SIZE` floor before getting here.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }

    pub fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Effective (clamped) batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Partition `terms` into contiguous chunks and compile each chunk.
    ///
    /// A chunk the regex engine refuses (size limit) is split in half and
    /// retried; a single term that still fails is reported and left to the
    /// exhaustive matcher only.
    pub fn batch(&self, terms: &[PlainTerm]) -> (Vec<LiteralBatch>, Vec<LoadWarning>) {
        let mut batches = Vec::with_capacity(terms.len().div_ceil(self.batch_size));
        let mut warnings = Vec::new();

        for (index, chunk) in terms.chunks(self.batch_size).enumerate() {
            self.compile_chunk(chunk, index * self.batch_size, &mut batches, &mut warnings);
        }

        (batches, warnings)
    }

    fn compile_chunk(
        &self,
        chunk: &[PlainTerm],
        first_term: usize,
        batches: &mut Vec<LiteralBatch>,
        warnings: &mut Vec<LoadWarning>,
    ) {
        if chunk.is_empty() {
            return;
        }

        match self.compile_alternation(chunk) {
            Ok(pattern) => batches.push(LiteralBatch {
                pattern,
                first_term,
                term_count: chunk.len(),
            }),
            Err(e) if chunk.len() > 1 => {
                warn!(
                    "Literal batch of {} terms rejected ({}), splitting",
                    chunk.len(),
                    describe_regex_error(&e)
                );
                let mid = chunk.len() / 2;
                self.compile_chunk(&chunk[..mid], first_term, batches, warnings);
                self.compile_chunk(&chunk[mid..], first_term + mid, batches, warnings);
            }
            Err(e) => warnings.push(LoadWarning::BatchRejected {
                term: chunk[0].text.clone(),
                reason: describe_regex_error(&e),
            }),
        }
    }

    fn compile_alternation(&self, chunk: &[PlainTerm]) -> Result<Regex, regex::Error> {
        let alternation = chunk
            .iter()
            .map(|term| regex::escape(&term.text))
            .collect::<Vec<_>>()
            .join("|");

        RegexBuilder::new(&format!("(?:{})", alternation))
            .size_limit(self.size_limit)
            .build()
    }
}
