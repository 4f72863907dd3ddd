// src/dictionary/parser.rs - Dictionary line classification

use crate::types::{RegexFlags, TermOutcome};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Turns raw dictionary lines into typed term outcomes.
///
/// Only full-line comments are recognised: a line whose trimmed text starts
/// with `#` is skipped, while `#` anywhere else is part of the term.
#[derive(Debug, Clone, Copy)]
pub struct TermParser {
    treat_lines_as_regex: bool,
    ignore_case: bool,
}

impl TermParser {
    pub fn new(treat_lines_as_regex: bool, ignore_case: bool) -> Self {
        Self {
            treat_lines_as_regex,
            ignore_case,
        }
    }

    /// Classify one raw line
    pub fn parse_line(&self, raw: &str) -> TermOutcome {
        let line = raw.trim_start_matches(BYTE_ORDER_MARK).trim();

        if line.is_empty() || line.starts_with('#') {
            return TermOutcome::Skip;
        }

        match split_delimited(line) {
            Some((body, letters)) => self.delimited_regex(body, letters),
            None if self.treat_lines_as_regex => TermOutcome::Regex {
                source: line.to_string(),
                flags: RegexFlags::default_for(self.ignore_case),
            },
            None => TermOutcome::Plain(self.fold(line)),
        }
    }

    /// Normalise a literal the same way message text is normalised before
    /// containment checks
    pub fn fold(&self, text: &str) -> String {
        fold_case(text, self.ignore_case)
    }

    fn delimited_regex(&self, body: &str, letters: &str) -> TermOutcome {
        let flags = if letters.is_empty() {
            Ok(RegexFlags::default_for(self.ignore_case))
        } else {
            RegexFlags::parse(letters)
        };

        match flags {
            Ok(flags) => TermOutcome::Regex {
                source: body.to_string(),
                flags,
            },
            Err(reason) => TermOutcome::Invalid { reason },
        }
    }
}

/// Shared case folding for parse time and match time
pub(crate) fn fold_case(text: &str, ignore_case: bool) -> String {
    if ignore_case {
        text.to_lowercase()
    } else {
        text.to_string()
    }
}

/// Split `/body/flags` into its parts. The flag segment must be letters only,
/// otherwise the line is treated as an ordinary term (e.g. `and/or sometimes`).
fn split_delimited(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('/')?;
    let last_slash = rest.rfind('/')?;
    let body = &rest[..last_slash];
    let letters = &rest[last_slash + 1..];

    if body.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some((body, letters))
}

/// Convenience wrapper used by tests and one-off callers
pub fn parse_line(raw: &str, treat_lines_as_regex: bool, ignore_case: bool) -> TermOutcome {
    TermParser::new(treat_lines_as_regex, ignore_case).parse_line(raw)
}
