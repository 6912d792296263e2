use glob::Pattern;
use std::path::Path;

/// Glob patterns for relative paths the scanner never visits.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn empty() -> Self {
        Self { patterns: Vec::new() }
    }

    /// Load rules from a file, one pattern per line. A missing file means no rules.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::empty(),
        }
    }

    /// Parse rules from newline separated patterns. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Self {
        Self::from_patterns(content.lines())
    }

    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| {
                let p = p.as_ref().trim();
                if p.is_empty() || p.starts_with('#') {
                    return None;
                }
                match Pattern::new(p) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        tracing::debug!("Skipping bad ignore pattern {p:?}: {e}");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if the normalized relative path should be ignored.
    pub fn is_ignored(&self, relative: &str) -> bool {
        let trimmed = relative.trim_end_matches('/');
        self.patterns
            .iter()
            .any(|pattern| pattern.matches(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let rules = IgnoreRules::parse("Intermediate\n.git");
        assert!(rules.is_ignored("Intermediate"));
        assert!(rules.is_ignored(".git/"));
        assert!(!rules.is_ignored("Source"));
    }

    #[test]
    fn test_wildcard() {
        let rules = IgnoreRules::parse("*.bak\n# comment\n\n");
        assert!(rules.is_ignored("Shaders/Common.usf.bak"));
        assert!(!rules.is_ignored("Shaders/Common.usf"));
    }

    #[test]
    fn test_empty() {
        let rules = IgnoreRules::parse("");
        assert!(rules.is_empty());
        assert!(!rules.is_ignored("anything"));
    }
}
