//! Output parser engine.
//!
//! Every plugin is an instantiation of this engine with a different
//! regex set and a different target record shape. Two modes exist:
//!
//! - composite summary: one pattern against a line indexed from the end
//!   of the output (diagnostic tools print a trailing summary line),
//!   with typed getters that report a per-field error key on coercion
//!   failure;
//! - independent field table: an ordered list of [`FieldSpec`]s searched
//!   separately against one text blob, where a missing field is `None`
//!   (metrics are individually optional) but a field that matches and
//!   fails coercion aborts the whole record.
//!
//! Nothing in this module panics on malformed input and nothing ever
//! produces a partially populated success.

use netgauge_common::units::{
    remap_symbol, NetworkUnit, SignalFrequencyUnit, SignalPowerUnit, UnknownUnit, WIFI_RATE_REMAPS,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

/// A classified parse failure: the error key to attach to the result
/// and the raw output that provoked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub key: String,
    pub traceback: Option<String>,
}

impl ParseFailure {
    pub fn new(key: impl Into<String>, traceback: Option<&str>) -> Self {
        Self {
            key: key.into(),
            traceback: traceback.map(str::to_string),
        }
    }
}

/// The `index`th non-empty line counted from the end of `text`.
/// Index 0 is the trailing summary line most tools print.
pub fn line_from_end(text: &str, index: usize) -> Option<&str> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if index < lines.len() {
        Some(lines[lines.len() - 1 - index])
    } else {
        None
    }
}

/// A successful composite match with typed, fallible field access.
#[derive(Debug)]
pub struct SummaryMatch<'t> {
    caps: regex::Captures<'t>,
    raw: &'t str,
}

/// Match `pattern` against `line`, demanding that every named group in
/// the pattern participated. A pattern that matches but leaves a named
/// group empty-handed would otherwise turn into a half-populated
/// record, so it is rejected as `{namespace}-regex` just like a miss.
pub fn match_summary<'t>(
    pattern: &Regex,
    line: &'t str,
    raw: &'t str,
    namespace: &str,
) -> Result<SummaryMatch<'t>, ParseFailure> {
    let regex_key = format!("{namespace}-regex");
    let caps = pattern
        .captures(line)
        .ok_or_else(|| ParseFailure::new(regex_key.clone(), Some(raw)))?;

    for name in pattern.capture_names().flatten() {
        if caps.name(name).is_none() {
            return Err(ParseFailure::new(regex_key, Some(raw)));
        }
    }

    Ok(SummaryMatch { caps, raw })
}

impl<'t> SummaryMatch<'t> {
    fn group(&self, name: &str) -> &str {
        self.caps.name(name).map(|m| m.as_str()).unwrap_or("")
    }

    /// Locale-invariant float coercion.
    pub fn float(&self, name: &str, error_key: &str) -> Result<f64, ParseFailure> {
        self.group(name)
            .trim()
            .parse::<f64>()
            .map_err(|_| ParseFailure::new(error_key, Some(self.raw)))
    }

    pub fn uint(&self, name: &str, error_key: &str) -> Result<u32, ParseFailure> {
        self.group(name)
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseFailure::new(error_key, Some(self.raw)))
    }

    /// Unit coercion: apply the plugin's remap table to the captured
    /// symbol first, then construct the enum.
    pub fn unit<U>(
        &self,
        name: &str,
        remaps: &[(&str, &str)],
        error_key: &str,
    ) -> Result<U, ParseFailure>
    where
        U: FromStr<Err = UnknownUnit>,
    {
        remap_symbol(self.group(name), remaps)
            .parse::<U>()
            .map_err(|_| ParseFailure::new(error_key, Some(self.raw)))
    }
}

/// Statically declared coercion for one independently matched field.
/// This is the compile-time per-field coercion table: the field's name
/// selects a pattern, the kind selects the coercion, and
/// `{namespace}-{name}` is the error key when the coercion fails.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    Float,
    Int,
    /// Network rate unit symbol, normalized through the wifi vendor
    /// remap table before construction.
    NetworkUnit,
    SignalPowerUnit,
    SignalFrequencyUnit,
    /// A multi-line `Bit Rates:` block, normalized into an ordered list.
    BitrateList,
}

pub struct FieldSpec {
    pub name: &'static str,
    pub pattern: &'static Lazy<Regex>,
    pub kind: FieldKind,
}

/// A coerced field value out of the independent-field mode.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Float(f64),
    Int(i64),
    Network(NetworkUnit),
    SignalPower(SignalPowerUnit),
    SignalFrequency(SignalFrequencyUnit),
    List(Vec<String>),
}

/// Ordered field results; order follows the `FieldSpec` slice so the
/// first malformed field in the declared order decides the reported key.
#[derive(Debug)]
pub struct FieldValues(Vec<(&'static str, Option<FieldValue>)>);

impl FieldValues {
    pub fn all_none(&self) -> bool {
        self.0.iter().all(|(_, v)| v.is_none())
    }

    fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name) {
            Some(FieldValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(FieldValue::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(FieldValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn network_unit(&self, name: &str) -> Option<NetworkUnit> {
        match self.get(name) {
            Some(FieldValue::Network(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn signal_power_unit(&self, name: &str) -> Option<SignalPowerUnit> {
        match self.get(name) {
            Some(FieldValue::SignalPower(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn signal_frequency_unit(&self, name: &str) -> Option<SignalFrequencyUnit> {
        match self.get(name) {
            Some(FieldValue::SignalFrequency(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        match self.get(name) {
            Some(FieldValue::List(l)) => Some(l.clone()),
            _ => None,
        }
    }
}

/// Search every spec independently against `text`.
///
/// A spec whose pattern finds nothing (or captures an empty string)
/// yields `None` for that field. A capture that fails its declared
/// coercion fails the whole record, fail-fast, with key
/// `{namespace}-{field}` and the blob as traceback.
pub fn scan_fields(
    text: &str,
    specs: &[FieldSpec],
    namespace: &str,
) -> Result<FieldValues, ParseFailure> {
    let mut values = Vec::with_capacity(specs.len());
    for spec in specs {
        let captured = spec
            .pattern
            .captures(text)
            .and_then(|caps| caps.name(spec.name).map(|m| m.as_str().to_string()));

        let value = match captured {
            None => None,
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(coerce(&raw, spec.kind).map_err(|_| {
                ParseFailure::new(format!("{namespace}-{}", spec.name), Some(text))
            })?),
        };
        values.push((spec.name, value));
    }
    Ok(FieldValues(values))
}

fn coerce(raw: &str, kind: FieldKind) -> Result<FieldValue, ()> {
    match kind {
        FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Float => raw.parse::<f64>().map(FieldValue::Float).map_err(|_| ()),
        FieldKind::Int => raw.parse::<i64>().map(FieldValue::Int).map_err(|_| ()),
        FieldKind::NetworkUnit => remap_symbol(raw, WIFI_RATE_REMAPS)
            .parse::<NetworkUnit>()
            .map(FieldValue::Network)
            .map_err(|_| ()),
        FieldKind::SignalPowerUnit => raw
            .parse::<SignalPowerUnit>()
            .map(FieldValue::SignalPower)
            .map_err(|_| ()),
        FieldKind::SignalFrequencyUnit => raw
            .parse::<SignalFrequencyUnit>()
            .map(FieldValue::SignalFrequency)
            .map_err(|_| ()),
        FieldKind::BitrateList => Ok(FieldValue::List(normalize_bitrates(raw))),
    }
}

/// Normalize a multi-line `Bit Rates:` block into an ordered list of
/// rate strings: `["1Mbit/s", "2Mbit/s", ...]`. Input order is kept.
fn normalize_bitrates(raw: &str) -> Vec<String> {
    let mut flattened = raw.replace('\n', ";").replace("Bit Rates:", "");
    flattened.retain(|c| c != ' ');
    let flattened = flattened.replace("Mb/s", "Mbit/s");
    flattened
        .split(';')
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
