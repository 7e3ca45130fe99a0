//! Flag extraction from free-form response text.
//!
//! The grammar is a list of regular expressions combined into a single
//! alternation, so the leftmost candidate in the text always wins regardless
//! of which pattern matched it.

use regex::{Regex, RegexBuilder};

use crate::error::{RaiderError, Result};

/// Default flag grammar: `FLAG{...}` or `CTF{...}` with a bounded body.
pub const DEFAULT_FLAG_PATTERN: &str = r"(?:FLAG|CTF)\{[A-Za-z0-9_\-.!?@#$%&+=:]{1,128}\}";

/// A flag-shaped substring and its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagMatch {
    pub value: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct FlagExtractor {
    regex: Regex,
}

impl FlagExtractor {
    pub fn new(patterns: &[String], case_insensitive: bool) -> Result<Self> {
        if patterns.is_empty() {
            return Err(RaiderError::Config(
                "at least one flag pattern is required".to_string(),
            ));
        }

        // Validate individually so the error names the offending pattern.
        for pattern in patterns {
            Regex::new(pattern)?;
        }

        let combined = patterns
            .iter()
            .map(|p| format!("(?:{})", p))
            .collect::<Vec<_>>()
            .join("|");
        let regex = RegexBuilder::new(&combined)
            .case_insensitive(case_insensitive)
            .build()?;

        Ok(Self { regex })
    }

    /// Leftmost flag in `text`, or `None`.
    pub fn extract(&self, text: &str) -> Option<FlagMatch> {
        self.regex.find(text).map(|m| FlagMatch {
            value: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
        })
    }

    /// Every non-overlapping candidate, in position order.
    pub fn extract_all(&self, text: &str) -> Vec<String> {
        self.regex
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for FlagExtractor {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_FLAG_PATTERN).expect("default flag pattern is valid"),
        }
    }
}
