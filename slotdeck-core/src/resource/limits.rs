//! Per-image resource-limit normalization
//!
//! Images declare `{key, min, max}` entries for each slot they care about.
//! Normalization classifies the key, annotates byte magnitudes with display
//! units and turns a missing or zero `max` into [`LimitValue::Unlimited`].
//! The unlimited glyph is applied only when fields are rendered.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::slots::{AcceleratorKind, SlotKind};
use crate::units::{add_unit, mark_if_unlimited, symbolic_unit, Quantity, UNLIMITED};

/// A raw `{key, min, max}` entry as returned by the image listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimitEntry {
    pub key: String,

    #[serde(default)]
    pub min: Option<Quantity>,

    #[serde(default)]
    pub max: Option<Quantity>,
}

impl ResourceLimitEntry {
    pub fn new(key: &str, min: impl Into<Quantity>, max: Option<Quantity>) -> Self {
        Self {
            key: key.to_string(),
            min: Some(min.into()),
            max,
        }
    }
}

/// One normalized bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitValue {
    /// Unit-annotated display amount (`"1"`, `"4GiB"`)
    Amount(String),
    Unlimited,
}

impl LimitValue {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, LimitValue::Unlimited)
    }

    /// Stored amount, `None` when unlimited
    pub fn amount(&self) -> Option<&str> {
        match self {
            LimitValue::Amount(s) => Some(s),
            LimitValue::Unlimited => None,
        }
    }

    /// Short-suffix form for API payloads (`"4GiB"` becomes `"4g"`)
    pub fn to_payload(&self) -> String {
        match self {
            LimitValue::Amount(s) => symbolic_unit(s),
            LimitValue::Unlimited => "Infinity".to_string(),
        }
    }
}

impl fmt::Display for LimitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitValue::Amount(s) => write!(f, "{}", mark_if_unlimited(&Quantity::from(s.as_str()))),
            LimitValue::Unlimited => f.write_str(UNLIMITED),
        }
    }
}

/// Normalized min/max for one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitPair {
    pub min: LimitValue,
    pub max: LimitValue,
}

impl LimitPair {
    fn from_entry(entry: &ResourceLimitEntry) -> Self {
        let min = match &entry.min {
            Some(q) => LimitValue::Amount(add_unit(&q.to_string())),
            None => LimitValue::Amount("0".to_string()),
        };
        let max = match &entry.max {
            None => LimitValue::Unlimited,
            Some(q) if q.is_zero() => LimitValue::Unlimited,
            Some(Quantity::Number(n)) if n.is_infinite() => LimitValue::Unlimited,
            Some(q) => LimitValue::Amount(add_unit(&q.to_string())),
        };
        Self { min, max }
    }
}

/// Normalized limits of one image, keyed by slot kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    limits: BTreeMap<SlotKind, LimitPair>,
}

impl ResourceLimits {
    /// Normalize raw entries; a repeated key keeps the last entry
    pub fn normalize(entries: &[ResourceLimitEntry]) -> Self {
        let limits = entries
            .iter()
            .map(|entry| (SlotKind::parse(&entry.key), LimitPair::from_entry(entry)))
            .collect();
        Self { limits }
    }

    pub fn get(&self, kind: &SlotKind) -> Option<&LimitPair> {
        self.limits.get(kind)
    }

    pub fn accelerator(&self, kind: AcceleratorKind) -> Option<&LimitPair> {
        self.limits.get(&SlotKind::Accelerator(kind))
    }

    /// Accelerator families this image declares limits for
    pub fn accelerators(&self) -> impl Iterator<Item = (AcceleratorKind, &LimitPair)> {
        self.limits.iter().filter_map(|(kind, pair)| match kind {
            SlotKind::Accelerator(acc) => Some((*acc, pair)),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKind, &LimitPair)> {
        self.limits.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    /// Rendered `{canonicalKey}_limit_min` / `{canonicalKey}_limit_max` fields
    pub fn fields(&self) -> Vec<(String, String)> {
        self.limits
            .iter()
            .flat_map(|(kind, pair)| {
                let key = kind.canonical_key();
                [
                    (format!("{key}_limit_min"), pair.min.to_string()),
                    (format!("{key}_limit_max"), pair.max.to_string()),
                ]
            })
            .collect()
    }

    /// Rendered value of a single derived field
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields()
            .into_iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

impl Serialize for ResourceLimits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.fields();
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
