//! Resource preset validation and payload composition
//!
//! A preset is a named bundle of cpu, memory, shared memory and at most one
//! CUDA accelerator amount. Dialog input arrives as raw strings; [`compose`]
//! validates it in a fixed order and builds the payload the API expects.
//! Memory given as a bare number is read as GiB, the unit the preset dialog
//! uses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ValidationError;
use crate::resource::slots::{AcceleratorMode, CUDA_SHARES};
use crate::units::{add_unit, format_number, mark_if_unlimited, mentions_unlimited, BinarySize, Quantity};

/// Payload value of an unlimited cpu or accelerator amount
const UNLIMITED_PAYLOAD: &str = "Infinity";

/// Raw preset form input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetFields {
    pub name: String,
    pub cpu: String,
    pub mem: String,
    #[serde(default)]
    pub shared_memory: Option<String>,
    #[serde(default)]
    pub accelerator: Option<String>,
}

/// Validated preset ready to submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetPayload {
    pub name: String,
    pub resource_slots: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_memory: Option<String>,
}

impl PresetPayload {
    /// Input object for the add/modify calls
    ///
    /// The API takes `resource_slots` as a JSON-encoded string.
    pub fn to_api_input(&self) -> serde_json::Result<serde_json::Value> {
        let mut input = serde_json::Map::new();
        input.insert(
            "resource_slots".to_string(),
            serde_json::Value::String(serde_json::to_string(&self.resource_slots)?),
        );
        if let Some(shmem) = &self.shared_memory {
            input.insert("shared_memory".to_string(), serde_json::Value::String(shmem.clone()));
        }
        Ok(serde_json::Value::Object(input))
    }
}

/// A preset as listed by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetRaw {
    pub name: String,
    #[serde(default)]
    pub resource_slots: BTreeMap<String, Quantity>,
    #[serde(default)]
    pub shared_memory: Option<Quantity>,
}

impl PresetRaw {
    /// Slot amounts as shown in the preset table
    ///
    /// Memory gets its display unit; unlimited markers render as the glyph.
    pub fn display_slots(&self) -> BTreeMap<String, String> {
        self.resource_slots
            .iter()
            .map(|(key, value)| {
                let rendered = mark_if_unlimited(value).to_string();
                let rendered = if key == "mem" { add_unit(&rendered) } else { rendered };
                (key.clone(), rendered)
            })
            .collect()
    }

    pub fn display_shared_memory(&self) -> Option<String> {
        self.shared_memory
            .as_ref()
            .map(|shmem| add_unit(&mark_if_unlimited(shmem).to_string()))
    }
}

impl From<&PresetPayload> for PresetRaw {
    fn from(payload: &PresetPayload) -> Self {
        Self {
            name: payload.name.clone(),
            resource_slots: payload
                .resource_slots
                .iter()
                .map(|(k, v)| (k.clone(), Quantity::from(v.as_str())))
                .collect(),
            shared_memory: payload.shared_memory.as_deref().map(Quantity::from),
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(value)
}

fn invalid(field: &'static str, value: &str) -> ValidationError {
    ValidationError::InvalidQuantity {
        field,
        value: value.to_string(),
    }
}

fn parse_cpu(raw: &str) -> Result<String, ValidationError> {
    let value = required(raw, "cpu")?;
    if mentions_unlimited(value) {
        return Ok(UNLIMITED_PAYLOAD.to_string());
    }
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok(format_number(n)),
        _ => Err(invalid("cpu", value)),
    }
}

/// Parse a memory amount; bare numbers are GiB
fn parse_memory(raw: &str, field: &'static str) -> Result<BinarySize, ValidationError> {
    let value = required(raw, field)?;
    if mentions_unlimited(value) {
        return Ok(BinarySize::Unlimited);
    }
    let expr = if value.parse::<f64>().is_ok() {
        format!("{value}g")
    } else {
        value.to_string()
    };
    expr.parse::<BinarySize>().map_err(|_| invalid(field, value))
}

/// Accelerator slot entry, or `None` when it is empty, zero or unsupported
fn parse_accelerator(
    raw: Option<&str>,
    mode: AcceleratorMode,
) -> Result<Option<(&'static str, String)>, ValidationError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let Some(key) = mode.request_key() else {
        debug!("Cluster has no CUDA slot; dropping accelerator amount {}", value);
        return Ok(None);
    };
    if mentions_unlimited(value) {
        return Ok(Some((key, UNLIMITED_PAYLOAD.to_string())));
    }

    let amount: f64 = value.parse().map_err(|_| invalid(key, value))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(invalid(key, value));
    }
    if amount == 0.0 {
        return Ok(None);
    }

    let rendered = match key {
        CUDA_SHARES => format!("{amount:?}"),
        _ => {
            if amount.fract() != 0.0 {
                return Err(invalid(key, value));
            }
            format!("{}", amount as u64)
        }
    };
    Ok(Some((key, rendered)))
}

/// Validate form input and build the create payload
///
/// Checks run in order: name, numeric coercion, shared memory below memory,
/// then the accelerator amount for the cluster's accounting `mode`.
pub fn compose(fields: &PresetFields, mode: AcceleratorMode) -> Result<PresetPayload, ValidationError> {
    let name = required(&fields.name, "name")?.to_string();

    let cpu = parse_cpu(&fields.cpu)?;
    let mem = parse_memory(&fields.mem, "mem")?;
    let shared_memory = match fields.shared_memory.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_memory(raw, "shared_memory")?),
        _ => None,
    };

    if let Some(shmem) = shared_memory {
        if shmem >= mem {
            return Err(ValidationError::SharedMemoryNotBelowMemory {
                shared_memory: shmem.to_short(),
                memory: mem.to_short(),
            });
        }
    }

    let mut resource_slots = BTreeMap::new();
    resource_slots.insert("cpu".to_string(), cpu);
    resource_slots.insert("mem".to_string(), mem.to_short());
    if let Some((key, amount)) = parse_accelerator(fields.accelerator.as_deref(), mode)? {
        resource_slots.insert(key.to_string(), amount);
    }

    Ok(PresetPayload {
        name,
        resource_slots,
        shared_memory: shared_memory.map(|s| s.to_short()),
    })
}

/// Validate form input for an existing preset
///
/// The preset keeps `name`; whatever the form says about the name is ignored.
pub fn modify(name: &str, fields: &PresetFields, mode: AcceleratorMode) -> Result<PresetPayload, ValidationError> {
    let fields = PresetFields {
        name: name.to_string(),
        ..fields.clone()
    };
    compose(&fields, mode)
}
