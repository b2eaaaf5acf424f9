//! Free-text tag lists.
//!
//! Tags arrive from forms as one comma-separated string and are rendered
//! back the same way. [`TagList`] owns the parsing and rendering rules;
//! storage is handled by the database layer.

use std::fmt;

/// Separator used both when parsing and when rendering tag strings.
pub const TAG_SEPARATOR: char = ',';

/// An ordered, duplicate-free list of tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList(Vec<String>);

impl TagList {
    /// Parse a comma-separated tag string.
    ///
    /// Names are trimmed, blanks dropped and duplicates removed (first
    /// occurrence wins). An empty or all-blank input yields an empty list.
    pub fn parse(input: &str) -> Self {
        Self::from_names(input.split(TAG_SEPARATOR))
    }

    /// Build a list from individual names using the same normalization as
    /// [`TagList::parse`].
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || tags.iter().any(|t| t == name) {
                continue;
            }
            tags.push(name.to_string());
        }
        Self(tags)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// Renders names sorted and joined by [`TAG_SEPARATOR`].
impl fmt::Display for TagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted: Vec<&str> = self.0.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        let separator = TAG_SEPARATOR.to_string();
        f.write_str(&sorted.join(separator.as_str()))
    }
}

/// Capability for entities that carry a tag list.
pub trait Tagged {
    fn tags(&self) -> &TagList;

    /// All tags as one delimited string.
    fn tags_to_s(&self) -> String {
        self.tags().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
