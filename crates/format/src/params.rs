use std::collections::HashMap;
use std::str::FromStr;

use rowweld_common::{Result, WeldError};

/// On-the-wire row formats the codecs understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    JsonLines,
    /// Length-prefixed binary frames; the shard storage format.
    Binary,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::JsonLines => "json",
            Format::Binary => "bin",
        }
    }
}

impl FromStr for Format {
    type Err = WeldError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(Format::Csv),
            "json" | "jsonl" => Ok(Format::JsonLines),
            "bin" | "binary" => Ok(Format::Binary),
            other => Err(WeldError::InvalidConfig(format!(
                "unknown format '{other}' (expected csv, json, or bin)"
            ))),
        }
    }
}

/// Infers a format from the path when none was given explicitly.
pub fn sniff_format(path: &str) -> Result<Format> {
    if path.contains(".csv") {
        Ok(Format::Csv)
    } else if path.contains(".json") {
        Ok(Format::JsonLines)
    } else if path.contains(".bin") {
        Ok(Format::Binary)
    } else {
        Err(WeldError::InvalidConfig(format!(
            "cannot infer format from path '{path}', pass --format"
        )))
    }
}

/// Free-form codec options, e.g. `delimiter=|` or `header=false`.
pub type FormatParams = HashMap<String, String>;

/// Parses `key=value` pairs as passed on the command line.
pub fn parse_fmtparams(pairs: &[String]) -> Result<FormatParams> {
    let mut params = FormatParams::new();
    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            WeldError::InvalidConfig(format!("format param '{pair}' is not in key=value form"))
        })?;
        params.insert(key.to_string(), value.to_string());
    }
    Ok(params)
}

/// Reads a single-byte param such as `delimiter` or `quotechar`.
pub(crate) fn byte_param(params: &FormatParams, key: &str, default: u8) -> Result<u8> {
    match params.get(key) {
        None => Ok(default),
        Some(v) if v.len() == 1 => Ok(v.as_bytes()[0]),
        Some(v) => Err(WeldError::InvalidConfig(format!(
            "param '{key}' must be a single character, got '{v}'"
        ))),
    }
}

pub(crate) fn bool_param(params: &FormatParams, key: &str, default: bool) -> Result<bool> {
    match params.get(key) {
        None => Ok(default),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(WeldError::InvalidConfig(format!(
                "param '{key}' must be true or false, got '{other}'"
            ))),
        },
    }
}
