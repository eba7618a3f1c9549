//! Hyperparameter option strings
//!
//! Methods are configured with colon-separated `Key=Value` pairs and
//! boolean switches (`Flag` enables, `!Flag` disables), e.g.
//! `NTrees=850:MinNodeSize=2.5%:UseBaggedBoost`. Keys are matched
//! case-insensitively. The global `H` and `V` help/verbosity switches are
//! accepted and dropped at parse time; diagnostics go through `tracing`
//! instead.
//!
//! Parsing is strict in both directions: a duplicated key is rejected
//! immediately, and any key the consuming method never reads is rejected
//! by [`OptionMap::ensure_all_consumed`].

use crate::{Error, Result};
use std::cell::Cell;

#[derive(Debug)]
enum OptionValue {
    Flag(bool),
    Text(String),
}

#[derive(Debug)]
struct OptionEntry {
    key: String,
    lower: String,
    value: OptionValue,
    consumed: Cell<bool>,
}

/// A parsed option string with consumed-key bookkeeping
#[derive(Debug)]
pub(crate) struct OptionMap {
    owner: String,
    entries: Vec<OptionEntry>,
}

impl OptionMap {
    /// Parse a raw option string on behalf of `owner` (used in messages)
    ///
    /// # Errors
    /// Returns error on empty segments, empty keys or values, and
    /// duplicated keys
    pub fn parse(owner: &str, raw: &str) -> Result<Self> {
        let mut entries: Vec<OptionEntry> = Vec::new();

        for segment in raw.split(':') {
            let segment = segment.trim();
            if segment.is_empty() {
                if raw.trim().is_empty() {
                    continue;
                }
                return Err(Error::Config(format!(
                    "Method '{owner}': empty segment in option string '{raw}'"
                )));
            }

            let (key, value) = match segment.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim();
                    let value = value.trim();
                    if key.is_empty() || value.is_empty() {
                        return Err(Error::Config(format!(
                            "Method '{owner}': malformed option segment '{segment}'"
                        )));
                    }
                    (key.to_string(), OptionValue::Text(value.to_string()))
                }
                None => match segment.strip_prefix('!') {
                    Some(key) if !key.is_empty() => (key.to_string(), OptionValue::Flag(false)),
                    Some(_) => {
                        return Err(Error::Config(format!(
                            "Method '{owner}': malformed option segment '{segment}'"
                        )))
                    }
                    None => (segment.to_string(), OptionValue::Flag(true)),
                },
            };

            let lower = key.to_ascii_lowercase();
            // Help and verbosity switches are framework-wide, not method
            // hyperparameters.
            if lower == "h" || lower == "v" {
                continue;
            }
            if entries.iter().any(|e| e.lower == lower) {
                return Err(Error::Config(format!(
                    "Method '{owner}': duplicate option '{key}'"
                )));
            }
            entries.push(OptionEntry {
                key,
                lower,
                value,
                consumed: Cell::new(false),
            });
        }

        Ok(Self {
            owner: owner.to_string(),
            entries,
        })
    }

    fn find(&self, key: &str) -> Option<&OptionEntry> {
        let lower = key.to_ascii_lowercase();
        let entry = self.entries.iter().find(|e| e.lower == lower)?;
        entry.consumed.set(true);
        Some(entry)
    }

    /// String value of a `Key=Value` option
    ///
    /// # Errors
    /// Returns error if the key is present as a bare switch
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.find(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                OptionValue::Text(text) => Ok(Some(text.clone())),
                OptionValue::Flag(_) => Err(Error::Config(format!(
                    "Method '{}': option '{}' expects a value",
                    self.owner, entry.key
                ))),
            },
        }
    }

    /// Boolean option, either a bare switch or `Key=True`/`Key=False`
    ///
    /// # Errors
    /// Returns error if the value is not a recognizable boolean
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.find(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                OptionValue::Flag(enabled) => Ok(Some(*enabled)),
                OptionValue::Text(text) => match text.to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" => Ok(Some(true)),
                    "false" | "f" | "0" => Ok(Some(false)),
                    _ => Err(Error::Config(format!(
                        "Method '{}': option '{}' has non-boolean value '{text}'",
                        self.owner, entry.key
                    ))),
                },
            },
        }
    }

    /// Unsigned integer option
    ///
    /// # Errors
    /// Returns error if the value does not parse as an unsigned integer
    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.parse_value(key, "an unsigned integer", str::parse::<usize>)
    }

    /// Unsigned 64-bit option (seeds)
    ///
    /// # Errors
    /// Returns error if the value does not parse
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.parse_value(key, "an unsigned integer", str::parse::<u64>)
    }

    /// Floating point option
    ///
    /// # Errors
    /// Returns error if the value does not parse as a number
    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.parse_value(key, "a number", str::parse::<f64>)
    }

    /// Percentage option; `2.5%` and `2.5` both yield the fraction `0.025`
    ///
    /// # Errors
    /// Returns error if the value does not parse as a number
    pub fn get_percent(&self, key: &str) -> Result<Option<f64>> {
        let parsed = self.parse_value(key, "a percentage", |text| {
            text.strip_suffix('%').unwrap_or(text).trim().parse::<f64>()
        })?;
        Ok(parsed.map(|v| v / 100.0))
    }

    fn parse_value<T, E, F>(&self, key: &str, expected: &str, parse: F) -> Result<Option<T>>
    where
        F: Fn(&str) -> std::result::Result<T, E>,
    {
        match self.find(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                OptionValue::Flag(_) => Err(Error::Config(format!(
                    "Method '{}': option '{}' expects a value",
                    self.owner, entry.key
                ))),
                OptionValue::Text(text) => parse(text).map(Some).map_err(|_| {
                    Error::Config(format!(
                        "Method '{}': option '{}' expects {expected}, got '{text}'",
                        self.owner, entry.key
                    ))
                }),
            },
        }
    }

    /// Reject any option no getter ever consumed
    ///
    /// # Errors
    /// Returns error listing the unknown keys
    pub fn ensure_all_consumed(&self) -> Result<()> {
        let unknown: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| !e.consumed.get())
            .map(|e| e.key.as_str())
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Method '{}': unknown option(s): {}",
                self.owner,
                unknown.join(", ")
            )))
        }
    }
}
