//! CSV row rendering with caller-chosen delimiter and line terminator.
//!
//! Each call renders exactly one record (header or data row) into a
//! `String`, so callers can concatenate nested exports (a test set row
//! followed by its cases) without sharing a writer.
//!
//! Delimiter and terminator are arbitrary non-empty strings. A field is
//! quoted when it contains a quote, a line break, or any character of the
//! delimiter or terminator; quoting itself is done by the `csv` writer.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::CoreError;

/// Default field delimiter for exports.
pub const DEFAULT_DELIMITER: &str = ";";

/// Default line terminator for exports.
pub const DEFAULT_LINE_TERMINATOR: &str = "\r\n";

/// Export options threaded through nested CSV rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: String,
    pub line_terminator: String,
    /// How many levels of children to export below the current row.
    pub recurse: u32,
    /// Number of empty leading cells on child rows.
    pub indent: u32,
}

impl CsvOptions {
    /// Build options from string arguments as received from a request.
    pub fn new(delimiter: &str, line_terminator: &str) -> Result<Self, CoreError> {
        if delimiter.is_empty() || delimiter.contains('"') {
            return Err(CoreError::Validation(format!(
                "delimiter must be non-empty and must not contain '\"', got {delimiter:?}"
            )));
        }
        if line_terminator.is_empty() {
            return Err(CoreError::Validation(
                "line terminator must not be empty".to_string(),
            ));
        }
        Ok(Self {
            delimiter: delimiter.to_string(),
            line_terminator: line_terminator.to_string(),
            recurse: 0,
            indent: 0,
        })
    }

    pub fn with_recurse(mut self, recurse: u32) -> Self {
        self.recurse = recurse;
        self
    }

    /// Whether child rows should be appended below the current row.
    pub fn should_recurse(&self) -> bool {
        self.recurse > 0
    }

    /// Options for the next level down: one less level to recurse, one more
    /// level of indentation, same delimiter and terminator.
    pub fn descend(&self) -> Self {
        Self {
            recurse: self.recurse.saturating_sub(1),
            indent: self.indent + 1,
            ..self.clone()
        }
    }

    fn needs_quotes(&self, field: &str) -> bool {
        field.chars().any(|c| {
            matches!(c, '"' | '\r' | '\n')
                || self.delimiter.contains(c)
                || self.line_terminator.contains(c)
        })
    }
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
            recurse: 0,
            indent: 0,
        }
    }
}

/// Quote one field, doubling embedded quotes.
fn quote_field(field: &str) -> Result<String, CoreError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record([field])
        .map_err(|e| CoreError::Internal(format!("csv write failed: {e}")))?;
    let mut bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("csv flush failed: {e}")))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| CoreError::Internal(format!("csv output not UTF-8: {e}")))
}

/// Render one CSV record terminated by the configured line terminator.
pub fn write_row<I, S>(options: &CsvOptions, fields: I) -> Result<String, CoreError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push_str(&options.delimiter);
        }
        let field = field.as_ref();
        if options.needs_quotes(field) {
            out.push_str(&quote_field(field)?);
        } else {
            out.push_str(field);
        }
    }
    out.push_str(&options.line_terminator);
    Ok(out)
}

/// Render one CSV record preceded by `options.indent` empty cells.
pub fn write_indented_row<I, S>(options: &CsvOptions, fields: I) -> Result<String, CoreError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let padding = (0..options.indent).map(|_| String::new());
    let fields = fields.into_iter().map(|f| f.as_ref().to_string());
    write_row(options, padding.chain(fields))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
