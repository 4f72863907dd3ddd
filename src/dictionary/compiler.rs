// src/dictionary/compiler.rs - Individual regex term compilation

use regex::{Regex, RegexBuilder};

use crate::error::CompileError;
use crate::types::{RegexFlags, RegexTerm};

/// Compiled-program ceiling for a single pattern (the regex crate default is 10 MiB)
pub const DEFAULT_SIZE_LIMIT: usize = 16 * (1 << 20);

/// Compiles regex terms one at a time, turning every failure into a
/// `CompileError` that names the offending source.
#[derive(Debug, Clone, Copy)]
pub struct PatternCompiler {
    size_limit: usize,
}

impl Default for PatternCompiler {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }
}

impl PatternCompiler {
    pub fn with_size_limit(size_limit: usize) -> Self {
        Self { size_limit }
    }

    /// Compile one pattern with the given flags
    pub fn compile(&self, source: &str, flags: RegexFlags) -> Result<Regex, CompileError> {
        let mut builder = RegexBuilder::new(source);
        flags.apply(&mut builder);
        builder.size_limit(self.size_limit);

        builder
            .build()
            .map_err(|e| CompileError::new(source, describe_regex_error(&e)))
    }

    /// Compile into a ready-to-match regex term
    pub fn compile_term(
        &self,
        source: String,
        flags: RegexFlags,
    ) -> Result<RegexTerm, CompileError> {
        let compiled = self.compile(&source, flags)?;
        Ok(RegexTerm {
            source,
            flags,
            compiled,
        })
    }
}

/// Condense a regex error into a single log-friendly line
pub(crate) fn describe_regex_error(error: &regex::Error) -> String {
    match error {
        regex::Error::Syntax(message) => message
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.trim_start_matches("error:").trim().to_string())
            .unwrap_or_else(|| "syntax error".to_string()),
        regex::Error::CompiledTooBig(limit) => {
            format!("compiled pattern exceeds size limit of {} bytes", limit)
        }
        other => other.to_string(),
    }
}
