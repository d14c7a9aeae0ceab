use anyhow::Result;
use regex::Regex;

/// A dash followed by a month abbreviation, e.g. "Latency – Mar 2024".
const MONTH_PATTERN: &str = r"(?i)[–-]\s*(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)";

/// Picks caption-like paragraphs out of a document.
///
/// A title is a non-empty paragraph that ends with ':' or carries a
/// dash-month date, and is shorter than `max_chars` characters.
#[derive(Debug, Clone)]
pub struct TitleFilter {
    month: Regex,
    max_chars: usize,
}

impl TitleFilter {
    pub fn new(max_chars: usize) -> Result<Self> {
        Ok(Self {
            month: Regex::new(MONTH_PATTERN)?,
            max_chars,
        })
    }

    pub fn is_title(&self, text: &str) -> bool {
        let text = text.trim();
        !text.is_empty()
            && (text.ends_with(':') || self.month.is_match(text))
            && text.chars().count() < self.max_chars
    }

    /// Trimmed titles in paragraph order.
    pub fn select<I, S>(&self, paragraphs: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paragraphs
            .into_iter()
            .filter(|p| self.is_title(p.as_ref()))
            .map(|p| p.as_ref().trim().to_string())
            .collect()
    }
}
