//! Key to object path mapping
//!
//! A template holds exactly one `%s`, replaced by the key. `%%` stands for
//! a literal percent sign. Any other `%` verb is rejected at parse time so
//! a bad template fails when the client is built, not on first write.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("filename format {0:?} has no %s placeholder")]
    MissingPlaceholder(String),
    #[error("filename format {0:?} has more than one %s placeholder")]
    MultiplePlaceholders(String),
    #[error("filename format {template:?} has unsupported verb %{verb}")]
    UnsupportedVerb { template: String, verb: String },
}

/// Parsed filename template, split around its placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameFormat {
    template: String,
    prefix: String,
    suffix: String,
}

impl FilenameFormat {
    pub fn parse(template: &str) -> Result<Self, FormatError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut seen_placeholder = false;
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            let literal = if c == '%' {
                match chars.next() {
                    Some('s') if seen_placeholder => {
                        return Err(FormatError::MultiplePlaceholders(template.to_string()));
                    }
                    Some('s') => {
                        seen_placeholder = true;
                        continue;
                    }
                    Some('%') => '%',
                    other => {
                        return Err(FormatError::UnsupportedVerb {
                            template: template.to_string(),
                            verb: other.map(String::from).unwrap_or_default(),
                        });
                    }
                }
            } else {
                c
            };

            if seen_placeholder {
                suffix.push(literal);
            } else {
                prefix.push(literal);
            }
        }

        if !seen_placeholder {
            return Err(FormatError::MissingPlaceholder(template.to_string()));
        }

        Ok(FilenameFormat {
            template: template.to_string(),
            prefix,
            suffix,
        })
    }

    /// Object path for `key`
    pub fn apply(&self, key: &str) -> String {
        let mut path = String::with_capacity(self.prefix.len() + key.len() + self.suffix.len());
        path.push_str(&self.prefix);
        path.push_str(key);
        path.push_str(&self.suffix);
        path
    }

    /// Key stored at `path`, if the path follows this format
    pub fn key_of<'p>(&self, path: &'p str) -> Option<&'p str> {
        path.strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())
    }

    /// Path prefix shared by every key starting with `key_prefix`
    pub fn path_prefix(&self, key_prefix: &str) -> String {
        format!("{}{}", self.prefix, key_prefix)
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for FilenameFormat {
    fn default() -> Self {
        FilenameFormat {
            template: "%s.json".to_string(),
            prefix: String::new(),
            suffix: ".json".to_string(),
        }
    }
}

impl FromStr for FilenameFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FilenameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
