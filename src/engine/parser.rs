//! # engine::parser
//!
//! Quote-aware field extraction for backend payloads.
//!
//! The backend speaks JSON, but the extractor does not require the whole body
//! to be valid JSON: it finds `"key"`, skips to the value and scans forward
//! until an unquoted `,` or `}`. A `"` toggles the in-string state unless it is
//! escaped, so delimiters inside quoted values never cut the field short.
//!
//! ```text
//! {"direction": "BUY", "note": "a,b}", "entry_price": 1.1025}
//!                        ^^^^^^^^^^^  one field, value = a,b}
//! ```

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` is not a number: {value:?}")]
    NotANumber { field: String, value: String },

    #[error("unterminated string in field `{0}`")]
    UnterminatedString(String),
}

/// Borrowing view over one payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldExtractor<'a> {
    body: &'a str,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(body: &'a str) -> Self {
        Self { body }
    }

    /// The raw value text of `key`, whitespace-trimmed but still quoted.
    ///
    /// `Ok(None)` when the key does not occur as a key (a quoted token
    /// followed by `:`).
    pub fn raw(&self, key: &str) -> Result<Option<&'a str>, ParseError> {
        let Some(start) = self.value_start(key) else {
            return Ok(None);
        };

        let bytes = self.body.as_bytes();
        let mut in_quotes = false;
        let mut escaped = false;
        let mut end = bytes.len();

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_quotes {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_quotes = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_quotes = true,
                b',' | b'}' => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }

        if in_quotes {
            return Err(ParseError::UnterminatedString(key.to_string()));
        }

        Ok(Some(self.body[start..end].trim()))
    }

    /// The value of `key` with surrounding quotes and whitespace removed and
    /// `\"` / `\\` unescaped.
    pub fn text(&self, key: &str) -> Result<Option<String>, ParseError> {
        Ok(self.raw(key)?.map(|raw| unescape(strip_quotes(raw).trim())))
    }

    /// The value of `key` as a finite `f64`. Quoted numbers are accepted.
    pub fn number(&self, key: &str) -> Result<f64, ParseError> {
        let raw = self
            .raw(key)?
            .ok_or_else(|| ParseError::MissingField(key.to_string()))?;
        let text = strip_quotes(raw).trim();

        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ParseError::NotANumber {
                field: key.to_string(),
                value: text.to_string(),
            }),
        }
    }

    /// Like [`FieldExtractor::number`], but an absent key yields `default`.
    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, ParseError> {
        match self.raw(key)? {
            Some(_) => self.number(key),
            None => Ok(default),
        }
    }

    /// Byte offset of the first non-blank character after `"key":`.
    fn value_start(&self, key: &str) -> Option<usize> {
        let needle = format!("\"{key}\"");

        self.body.match_indices(&needle).find_map(|(at, _)| {
            let after_key = at + needle.len();
            let rest = &self.body[after_key..];
            let colon = rest.len() - rest.trim_start().len();
            if rest[colon..].starts_with(':') {
                let value = &rest[colon + 1..];
                Some(after_key + colon + 1 + (value.len() - value.trim_start().len()))
            } else {
                None
            }
        })
    }
}

fn strip_quotes(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

fn unescape(inner: &str) -> String {
    if !inner.contains('\\') {
        return inner.to_string();
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\' | '/')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
