//! Sectioned key/value reader for design files.
//!
//! The format is the classic INI dialect: `[SECTION]` headers, `key = value` or `key: value`
//! entries, whole-line comments starting with `#` or `;` in the first column, and indented
//! continuation lines. Section names are case sensitive, keys are not (they are stored
//! lowercased).

use std::collections::HashMap;

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{CompileError, Result};

/// Code prefixes that make a `;` inside a value read as a statement separator.
pub(crate) const CODE_KEYWORDS: &[&str] = &[
    "param.",
    "println!",
    "print!",
    "eprintln!",
    "return",
    "tracing::",
    "log::",
];

pub(crate) fn starts_with_code_keyword(text: &str) -> bool {
    let text = text.trim_start();
    CODE_KEYWORDS.iter().any(|kw| text.starts_with(kw))
}

/// A value read through [`Section::read_keys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    /// Collected from `key_1`, `key_2`, ... when `key` itself is absent.
    List(Vec<String>),
}

impl Value {
    /// The scalar text, or the list joined with newlines.
    pub fn into_text(self) -> String {
        match self {
            Self::Scalar(s) => s,
            Self::List(items) => items.join("\n"),
        }
    }

    /// The list items; a scalar is a one-element list.
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::Scalar(s) => vec![s],
            Self::List(items) => items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: String) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn set(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    fn append_line(&mut self, line: &str) -> bool {
        match self.entries.last_mut() {
            Some((_, value)) => {
                value.push('\n');
                value.push_str(line);
                true
            }
            None => false,
        }
    }

    /// Collects `key_1, key_2, ...` until the next index is missing.
    pub fn list(&self, key: &str) -> Vec<String> {
        (1..)
            .map_while(|n| self.get(&format!("{key}_{n}")).map(str::to_string))
            .collect()
    }

    /// Reads one optional key, falling back to the numbered-list convention.
    pub fn read_optional(&self, key: &str, diag: &mut Diagnostics) -> Option<Value> {
        let value = match self.get(key) {
            Some(v) => Value::Scalar(v.to_string()),
            None => {
                let items = self.list(key);
                if items.is_empty() {
                    return None;
                }
                Value::List(items)
            }
        };
        match &value {
            Value::Scalar(v) => self.check_separator(key, v, diag),
            Value::List(items) => {
                for (n, item) in items.iter().enumerate() {
                    self.check_separator(&format!("{key}_{}", n + 1), item, diag);
                }
            }
        }
        Some(value)
    }

    /// Reads the required keys in order.
    pub fn read_keys(
        &self,
        file: &str,
        keys: &[&str],
        diag: &mut Diagnostics,
    ) -> Result<Vec<Value>> {
        keys.iter()
            .map(|key| {
                self.read_optional(key, diag)
                    .ok_or_else(|| CompileError::MissingKey {
                        file: file.to_string(),
                        section: self.name.clone(),
                        key: (*key).to_string(),
                    })
            })
            .collect()
    }

    fn check_separator(&self, key: &str, value: &str, diag: &mut Diagnostics) {
        let Some(pos) = value.find(';') else {
            return;
        };
        let rest = value[pos + 1..].trim();
        if rest.is_empty() || starts_with_code_keyword(rest) {
            return;
        }
        diag.warn(
            WarningKind::AmbiguousSeparator,
            format!(
                "[{}] {key}: ';' before '{rest}' is neither a comment nor known code, check the value",
                self.name
            ),
        );
    }
}

/// A parsed design file.
#[derive(Debug, Clone)]
pub struct DesignFile {
    label: String,
    text: String,
    sections: Vec<Section>,
    index: HashMap<String, usize>,
}

impl DesignFile {
    pub fn parse(label: &str, text: &str) -> Result<Self> {
        let mut file = Self {
            label: label.to_string(),
            text: text.to_string(),
            sections: Vec::new(),
            index: HashMap::new(),
        };
        let mut current: Option<usize> = None;

        for (n, line) in text.lines().enumerate() {
            let line_no = n + 1;
            if line.trim().is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with(char::is_whitespace) {
                if let Some(idx) = current {
                    if file.sections[idx].append_line(line.trim()) {
                        continue;
                    }
                }
            }

            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(file.syntax(line_no, "unterminated section header"));
                };
                let name = name.trim().to_string();
                // Repeated headers merge into the first occurrence.
                let idx = match file.index.get(&name) {
                    Some(&idx) => idx,
                    None => {
                        file.sections.push(Section::new(name.clone()));
                        file.index.insert(name, file.sections.len() - 1);
                        file.sections.len() - 1
                    }
                };
                current = Some(idx);
                continue;
            }

            let Some(idx) = current else {
                return Err(file.syntax(line_no, "entry outside of any section"));
            };
            let Some(split) = trimmed.find([':', '=']) else {
                return Err(file.syntax(line_no, "expected 'key = value'"));
            };
            let key = trimmed[..split].trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(file.syntax(line_no, "empty key"));
            }
            let value = trimmed[split + 1..].trim().to_string();
            file.sections[idx].set(key, value);
        }

        Ok(file)
    }

    fn syntax(&self, line: usize, message: &str) -> CompileError {
        CompileError::Syntax {
            file: self.label.clone(),
            line,
            message: message.to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.index.get(name).map(|&idx| &self.sections[idx])
    }

    pub fn require_section(&self, name: &str) -> Result<&Section> {
        self.section(name).ok_or_else(|| CompileError::MissingSection {
            file: self.label.clone(),
            section: name.to_string(),
        })
    }

    /// Counts raw header lines of the form `[PREFIX<digit>...`.
    pub fn count_headers(&self, prefix: &str) -> usize {
        let open = format!("[{prefix}");
        self.text
            .lines()
            .filter_map(|line| line.trim_start().strip_prefix(open.as_str()))
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .count()
    }
}
