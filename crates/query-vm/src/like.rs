//! SQL `LIKE` matching.
//!
//! Patterns are translated into anchored regular expressions: `_` matches one character, `%`
//! matches any run of characters and every other character matches itself. Matching is
//! case-sensitive and `.` in the subject is an ordinary character (including newlines).
use crate::error::{VmError, VmResult};
use ahash::AHashMap;
use regex::Regex;

/// Translates a `LIKE` pattern into regex source.
pub fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2 + 6);
    regex.push_str("(?s)^");
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            ch => regex.push_str(&regex::escape(ch.encode_utf8(&mut literal))),
        }
    }
    regex.push('$');
    regex
}

pub fn compile_like(pattern: &str) -> VmResult<Regex> {
    Regex::new(&like_to_regex(pattern)).map_err(|source| VmError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Uncached one-shot match.
pub fn like(subject: &str, pattern: &str) -> VmResult<bool> {
    Ok(compile_like(pattern)?.is_match(subject))
}

/// Compiled patterns retained for the lifetime of one execution context.
#[derive(Debug, Clone)]
pub(crate) struct LikeCache {
    capacity: usize,
    patterns: AHashMap<String, Regex>,
}

impl LikeCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            patterns: AHashMap::new(),
        }
    }

    pub(crate) fn is_match(&mut self, subject: &str, pattern: &str) -> VmResult<bool> {
        if let Some(regex) = self.patterns.get(pattern) {
            return Ok(regex.is_match(subject));
        }

        let regex = compile_like(pattern)?;
        let matched = regex.is_match(subject);
        if self.capacity == 0 {
            return Ok(matched);
        }
        if self.patterns.len() >= self.capacity {
            // No recency tracking; a full cache starts over.
            self.patterns.clear();
        }
        self.patterns.insert(pattern.to_string(), regex);
        Ok(matched)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.patterns.len()
    }
}
