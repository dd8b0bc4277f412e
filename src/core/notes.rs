use std::path::Path;

use crate::utils::error::Result;

/// Speedrun notes split into one page per split.
///
/// Lines wrapped in square brackets are comments and never rendered. A line
/// equal to the separator (a blank line unless configured) starts the next
/// split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notes {
    splits: Vec<String>,
}

impl Notes {
    pub fn parse(text: &str, separator: &str) -> Self {
        let mut splits = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            let line = line.trim_end();
            if line.starts_with('[') && line.ends_with(']') {
                continue;
            }
            if line == separator {
                splits.push(current.join("\n"));
                current.clear();
            } else {
                current.push(line);
            }
        }
        splits.push(current.join("\n"));

        tracing::debug!("Parsed {} splits", splits.len());
        Self { splits }
    }

    pub fn from_file<P: AsRef<Path>>(path: P, separator: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(Self::parse(&text, separator))
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    pub fn raw_split(&self, idx: usize) -> Option<&str> {
        self.splits.get(idx).map(String::as_str)
    }

    /// HTML for one split, lines separated by `<br/>`.
    pub fn render_split(&self, idx: usize) -> Option<String> {
        self.raw_split(idx)
            .map(|raw| raw.split('\n').collect::<Vec<_>>().join("<br/>\n"))
    }

    /// Rendered splits in `[start, end)`, clamped to the available splits.
    pub fn render_splits(&self, start: i64, end: i64) -> Vec<String> {
        let start = start.max(0) as usize;
        let end = end.clamp(0, self.splits.len() as i64) as usize;
        (start..end).filter_map(|idx| self.render_split(idx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "[Route v2]\nGrab the key\nSkip the chest\n\nBoss: hit twice\n[todo]\n\nFinal split\n";

    #[test]
    fn test_parse_splits_and_drops_comments() {
        let notes = Notes::parse(SAMPLE, "");
        assert_eq!(notes.len(), 3);
        assert_eq!(notes.raw_split(0), Some("Grab the key\nSkip the chest"));
        assert_eq!(notes.raw_split(1), Some("Boss: hit twice"));
        assert_eq!(notes.raw_split(2), Some("Final split"));
    }

    #[test]
    fn test_custom_separator() {
        let notes = Notes::parse("a\n\nb\n---\nc", "---");
        assert_eq!(notes.len(), 2);
        assert_eq!(notes.raw_split(0), Some("a\n\nb"));
    }

    #[test]
    fn test_render_split_uses_line_breaks() {
        let notes = Notes::parse(SAMPLE, "");
        assert_eq!(
            notes.render_split(0).unwrap(),
            "Grab the key<br/>\nSkip the chest"
        );
        assert!(notes.render_split(10).is_none());
    }

    #[test]
    fn test_render_splits_clamps_range() {
        let notes = Notes::parse(SAMPLE, "");
        assert_eq!(notes.render_splits(-1, 1).len(), 1);
        assert_eq!(notes.render_splits(1, 10).len(), 2);
        assert!(notes.render_splits(3, 5).is_empty());
        assert!(notes.render_splits(2, 1).is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        let notes = Notes::from_file(file.path(), "").unwrap();
        assert_eq!(notes.len(), 3);
    }
}
