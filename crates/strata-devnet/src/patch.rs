//! Configuration patching.
//!
//! Formats with a parser are patched structurally: TOML files are parsed into
//! a [`toml_edit::DocumentMut`], which keeps comments and layout, and JSON
//! documents into a [`serde_json::Value`], then mutated field by field. [`TextPatch`] covers plain text, applying an
//! ordered list of regex rules to the evolving content.
//!
//! Every patch is idempotent: re-applying it to an already patched file
//! leaves the file untouched.

use crate::error::{DevnetError, Result};
use crate::fs;
use regex::{Captures, NoExpand, Regex};
use serde_json::Value;
use std::path::Path;
use toml_edit::{DocumentMut, TableLike};

type Replacer = Box<dyn Fn(&Captures<'_>) -> std::result::Result<String, String> + Send + Sync>;

enum Replacement {
    Literal(String),
    Computed(Replacer),
}

struct Rule {
    pattern: Regex,
    replacement: Replacement,
    required: bool,
}

/// An ordered list of regex replacements.
///
/// Rules are applied one after another, each against the output of the
/// previous rule, and each replaces every match of its pattern.
#[derive(Default)]
pub struct TextPatch {
    rules: Vec<Rule>,
}

impl TextPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule replacing every match of `pattern` with `replacement`,
    /// taken literally.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn replace(mut self, pattern: &str, replacement: impl Into<String>) -> std::result::Result<Self, regex::Error> {
        self.rules.push(Rule {
            pattern: Regex::new(pattern)?,
            replacement: Replacement::Literal(replacement.into()),
            required: false,
        });
        Ok(self)
    }

    /// Adds a rule computing each replacement from the match. The closure
    /// may reject a match, which fails the whole patch.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regex.
    pub fn replace_with<F>(mut self, pattern: &str, f: F) -> std::result::Result<Self, regex::Error>
    where
        F: Fn(&Captures<'_>) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            pattern: Regex::new(pattern)?,
            replacement: Replacement::Computed(Box::new(f)),
            required: false,
        });
        Ok(self)
    }

    /// Marks the most recently added rule as required: applying the patch
    /// fails if its pattern matches nothing.
    #[must_use]
    pub fn required(mut self) -> Self {
        if let Some(rule) = self.rules.last_mut() {
            rule.required = true;
        }
        self
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the patch has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule in order.
    ///
    /// # Errors
    ///
    /// Returns a description of the first rejected match or unmatched
    /// required rule.
    pub fn apply(&self, content: &str) -> std::result::Result<String, String> {
        let mut current = content.to_string();
        for rule in &self.rules {
            if !rule.pattern.is_match(&current) {
                if rule.required {
                    return Err(format!("pattern `{}` matched nothing", rule.pattern));
                }
                continue;
            }
            current = match &rule.replacement {
                Replacement::Literal(s) => rule
                    .pattern
                    .replace_all(&current, NoExpand(s))
                    .into_owned(),
                Replacement::Computed(f) => {
                    let mut out = String::with_capacity(current.len());
                    let mut last = 0;
                    for caps in rule.pattern.captures_iter(&current) {
                        let Some(m) = caps.get(0) else { continue };
                        out.push_str(&current[last..m.start()]);
                        out.push_str(&f(&caps)?);
                        last = m.end();
                    }
                    out.push_str(&current[last..]);
                    out
                }
            };
        }
        Ok(current)
    }
}

impl std::fmt::Debug for TextPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.pattern.as_str()))
            .finish()
    }
}

/// Applies `patch` to the file at `path`. Returns whether the file changed.
///
/// # Errors
///
/// Fails if the file cannot be read or written, or the patch rejects it.
pub async fn patch_text_file(path: &Path, patch: &TextPatch) -> Result<bool> {
    let before = fs::read_to_string(path).await?;
    let after = patch.apply(&before).map_err(|e| DevnetError::patch(path, e))?;
    write_if_changed(path, &before, &after).await
}

/// Sets a string field of a TOML document, keeping the comments around an
/// existing value.
///
/// `key` is a dotted path; every parent table must already exist.
///
/// # Errors
///
/// Fails if a parent is missing or is not a table.
pub fn set_toml_string(
    doc: &mut DocumentMut,
    key: &str,
    value: impl Into<String>,
) -> std::result::Result<(), String> {
    let value = value.into();
    let (parent, leaf) = toml_parent_mut(doc, key)?;
    match parent.get_mut(leaf).and_then(|item| item.as_value_mut()) {
        Some(toml_edit::Value::String(s)) if s.value() == &value => {}
        Some(existing) => {
            let decor = existing.decor().clone();
            *existing = toml_edit::Value::from(value);
            *existing.decor_mut() = decor;
        }
        None => {
            parent.insert(leaf, toml_edit::value(value));
        }
    }
    Ok(())
}

/// Rewrites an existing string field of a TOML document through `f`.
///
/// # Errors
///
/// Fails if the field is missing, is not a string, or `f` fails.
pub fn edit_toml_string<F>(doc: &mut DocumentMut, key: &str, f: F) -> std::result::Result<(), String>
where
    F: FnOnce(&str) -> std::result::Result<String, String>,
{
    let (parent, leaf) = toml_parent_mut(doc, key)?;
    let item = parent
        .get_mut(leaf)
        .ok_or_else(|| format!("`{key}` is missing"))?;
    match item.as_value_mut() {
        Some(toml_edit::Value::String(s)) => {
            let edited = f(s.value())?;
            if &edited != s.value() {
                let decor = s.decor().clone();
                *s = toml_edit::Formatted::new(edited);
                *s.decor_mut() = decor;
            }
            Ok(())
        }
        _ => Err(format!("`{key}` is not a string")),
    }
}

fn toml_parent_mut<'a, 'k>(
    doc: &'a mut DocumentMut,
    key: &'k str,
) -> std::result::Result<(&'a mut dyn TableLike, &'k str), String> {
    let mut segments: Vec<&str> = key.split('.').collect();
    let leaf = segments.pop().unwrap_or(key);
    let mut current: &mut dyn TableLike = doc.as_table_mut();
    for segment in segments {
        current = match current.get_mut(segment) {
            Some(item) => item
                .as_table_like_mut()
                .ok_or_else(|| format!("`{segment}` in `{key}` is not a table"))?,
            None => return Err(format!("table `{segment}` in `{key}` is missing")),
        };
    }
    Ok((current, leaf))
}

/// Parses the TOML file at `path`, applies `f`, and writes it back if the
/// result differs. Comments and formatting outside the edited values are
/// kept. Returns whether the file changed.
///
/// # Errors
///
/// Fails on I/O errors, invalid TOML, or when `f` fails.
pub async fn patch_toml_file<F>(path: &Path, f: F) -> Result<bool>
where
    F: FnOnce(&mut DocumentMut) -> std::result::Result<(), String>,
{
    let before = fs::read_to_string(path).await?;
    let mut doc: DocumentMut = before.parse().map_err(|source| DevnetError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    f(&mut doc).map_err(|e| DevnetError::patch(path, e))?;
    let after = doc.to_string();
    write_if_changed(path, &before, &after).await
}

/// Replaces the value of every string field named `key`, at any depth.
/// Returns how many fields were replaced.
pub fn set_json_strings(doc: &mut Value, key: &str, value: &str) -> usize {
    match doc {
        Value::Object(map) => {
            let mut count = 0;
            for (k, v) in map.iter_mut() {
                if k == key && v.is_string() {
                    *v = Value::String(value.to_string());
                    count += 1;
                } else {
                    count += set_json_strings(v, key, value);
                }
            }
            count
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|v| set_json_strings(v, key, value))
            .sum(),
        _ => 0,
    }
}

/// Reads and parses a JSON file.
///
/// # Errors
///
/// Fails on I/O errors or invalid JSON.
pub async fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|source| DevnetError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-prints a JSON document with a trailing newline.
pub(crate) fn to_json_pretty(path: &Path, doc: &Value) -> Result<String> {
    let mut out = serde_json::to_string_pretty(doc).map_err(|source| DevnetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    out.push('\n');
    Ok(out)
}

async fn write_if_changed(path: &Path, before: &str, after: &str) -> Result<bool> {
    if before == after {
        return Ok(false);
    }
    fs::write(path, after).await?;
    Ok(true)
}
