//! Case-converting JSON codec
//!
//! Wire payloads use camelCase keys; bodies inside the pipeline use
//! snake_case. Only object keys are converted, values pass through
//! untouched.

use serde_json::{Map, Value};
use thiserror::Error;

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Text is not JSON, or a value cannot be rendered
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON codec converting object keys between snake_case and camelCase
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseConvertingCodec;

impl CaseConvertingCodec {
    /// Create codec
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode with camelCase keys
    ///
    /// # Errors
    /// Returns error if the value cannot be rendered
    pub fn serialize(&self, value: &Value) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&camelize_keys(value))?)
    }

    /// Decode and convert keys to snake_case
    ///
    /// # Errors
    /// Returns error if `text` is not JSON
    pub fn deserialize(&self, text: &str) -> Result<Value, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(snakify_keys(&value))
    }
}

/// Recursively convert object keys to camelCase
#[must_use]
pub fn camelize_keys(value: &Value) -> Value {
    convert_keys(value, to_camel_case)
}

/// Recursively convert object keys to snake_case
#[must_use]
pub fn snakify_keys(value: &Value) -> Value {
    convert_keys(value, to_snake_case)
}

fn convert_keys(value: &Value, convert: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (convert(k), convert_keys(v, convert)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| convert_keys(v, convert)).collect()),
        other => other.clone(),
    }
}

/// Convert a snake_case key to camelCase
///
/// The first segment is kept as is; every later segment is title-cased
/// (`value_2_to_3_values` becomes `value2To3Values`).
#[must_use]
pub fn to_camel_case(key: &str) -> String {
    let mut segments = key.split('_');
    let mut out = segments.next().unwrap_or_default().to_owned();
    for segment in segments {
        title_case_into(segment, &mut out);
    }
    out
}

/// Upper-case each letter that follows a non-letter, lower-case the rest
fn title_case_into(segment: &str, out: &mut String) {
    let mut after_letter = false;
    for c in segment.chars() {
        if c.is_alphabetic() {
            if after_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(c);
            after_letter = false;
        }
    }
}

/// Convert a camelCase key to snake_case
///
/// The key is split into words: a capitalised or lower-case run, an
/// acronym (an upper-case run ending before a capitalised word, a digit,
/// a symbol or the end), or a digit run. Words are lower-cased and joined
/// by underscores; anything else (including underscores) is dropped.
/// `capitalLETTERSValue` becomes `capital_letters_value`.
#[must_use]
pub fn to_snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match next_word(&chars, i) {
            Some(end) => {
                words.push(chars[i..end].iter().collect::<String>().to_lowercase());
                i = end;
            }
            None => i += 1,
        }
    }
    words.join("_")
}

/// End of the word starting at `start`, if one starts there
fn next_word(chars: &[char], start: usize) -> Option<usize> {
    let upper = |i: usize| chars.get(i).is_some_and(char::is_ascii_uppercase);
    let lower = |i: usize| chars.get(i).is_some_and(char::is_ascii_lowercase);
    let digit = |i: usize| chars.get(i).is_some_and(char::is_ascii_digit);
    let run = |mut i: usize, pred: &dyn Fn(usize) -> bool| {
        while pred(i) {
            i += 1;
        }
        i
    };

    // Capitalised or lower-case word
    if upper(start) && lower(start + 1) {
        return Some(run(start + 1, &lower));
    }
    if lower(start) {
        return Some(run(start, &lower));
    }

    // Acronym, backing off until it ends at a word boundary
    if upper(start) {
        let longest = run(start, &upper);
        let boundary = |i: usize| match chars.get(i) {
            None => true,
            Some(c) => {
                (upper(i) && lower(i + 1)) || c.is_ascii_digit() || !(c.is_alphanumeric() || *c == '_')
            }
        };
        return (start + 1..=longest).rev().find(|end| boundary(*end));
    }

    if digit(start) {
        return Some(run(start, &digit));
    }
    None
}
