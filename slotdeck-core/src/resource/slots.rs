//! Resource-slot keys and cluster capabilities
//!
//! Slot keys travel through the API in dotted form (`cuda.device`,
//! `atom.device+`). Each known accelerator family gets its own variant so
//! the rest of the crate never matches on raw strings; unknown keys are kept
//! verbatim in [`SlotKind::Other`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Slot key for whole-device CUDA accounting
pub const CUDA_DEVICE: &str = "cuda.device";

/// Slot key for fractional CUDA accounting
pub const CUDA_SHARES: &str = "cuda.shares";

/// Accelerator device families with their own min/max limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AcceleratorKind {
    CudaDevice,
    CudaShares,
    RocmDevice,
    TpuDevice,
    IpuDevice,
    AtomDevice,
    AtomPlusDevice,
    WarboyDevice,
    HyperaccelLpuDevice,
}

impl AcceleratorKind {
    /// Every known family, in display order
    pub const ALL: [AcceleratorKind; 9] = [
        AcceleratorKind::CudaDevice,
        AcceleratorKind::CudaShares,
        AcceleratorKind::RocmDevice,
        AcceleratorKind::TpuDevice,
        AcceleratorKind::IpuDevice,
        AcceleratorKind::AtomDevice,
        AcceleratorKind::AtomPlusDevice,
        AcceleratorKind::WarboyDevice,
        AcceleratorKind::HyperaccelLpuDevice,
    ];

    /// Dotted key used by the API
    pub fn slot_key(&self) -> &'static str {
        match self {
            AcceleratorKind::CudaDevice => CUDA_DEVICE,
            AcceleratorKind::CudaShares => CUDA_SHARES,
            AcceleratorKind::RocmDevice => "rocm.device",
            AcceleratorKind::TpuDevice => "tpu.device",
            AcceleratorKind::IpuDevice => "ipu.device",
            AcceleratorKind::AtomDevice => "atom.device",
            AcceleratorKind::AtomPlusDevice => "atom.device+",
            AcceleratorKind::WarboyDevice => "warboy.device",
            AcceleratorKind::HyperaccelLpuDevice => "hyperaccel-lpu.device",
        }
    }

    /// Underscore identifier used for derived field names
    pub fn canonical_key(&self) -> &'static str {
        match self {
            AcceleratorKind::CudaDevice => "cuda_device",
            AcceleratorKind::CudaShares => "cuda_shares",
            AcceleratorKind::RocmDevice => "rocm_device",
            AcceleratorKind::TpuDevice => "tpu_device",
            AcceleratorKind::IpuDevice => "ipu_device",
            AcceleratorKind::AtomDevice => "atom_device",
            AcceleratorKind::AtomPlusDevice => "atom_plus_device",
            AcceleratorKind::WarboyDevice => "warboy_device",
            AcceleratorKind::HyperaccelLpuDevice => "hyperaccel_lpu_device",
        }
    }

    /// Look up a family by its dotted key
    pub fn from_slot_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.slot_key() == key)
    }
}

/// A resource-slot key, classified
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotKind {
    Cpu,
    Mem,
    Accelerator(AcceleratorKind),
    Other(String),
}

impl SlotKind {
    /// Classify a dotted API key
    pub fn parse(key: &str) -> Self {
        match key {
            "cpu" => SlotKind::Cpu,
            "mem" => SlotKind::Mem,
            _ => match AcceleratorKind::from_slot_key(key) {
                Some(kind) => SlotKind::Accelerator(kind),
                None => SlotKind::Other(key.to_string()),
            },
        }
    }

    /// Dotted key used by the API
    pub fn slot_key(&self) -> &str {
        match self {
            SlotKind::Cpu => "cpu",
            SlotKind::Mem => "mem",
            SlotKind::Accelerator(kind) => kind.slot_key(),
            SlotKind::Other(key) => key,
        }
    }

    /// Identifier used as the prefix of derived `_limit_min`/`_limit_max`
    /// fields. Unknown keys pass through unchanged.
    pub fn canonical_key(&self) -> &str {
        match self {
            SlotKind::Accelerator(kind) => kind.canonical_key(),
            other => other.slot_key(),
        }
    }

    /// Whether amounts of this slot are byte sizes
    pub fn is_memory(&self) -> bool {
        matches!(self, SlotKind::Mem)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot_key())
    }
}

impl Serialize for SlotKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.slot_key())
    }
}

impl<'de> Deserialize<'de> for SlotKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(SlotKind::parse(&key))
    }
}

/// How the cluster accounts for CUDA accelerators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratorMode {
    /// No CUDA slot is advertised
    None,
    /// Whole devices (`cuda.device`)
    DeviceCount,
    /// Fractional shares (`cuda.shares`)
    Fractional,
    /// Both keys are advertised
    Both,
}

impl AcceleratorMode {
    /// Slot key new accelerator requests should use, if any
    ///
    /// Fractional accounting is preferred when the cluster offers both.
    pub fn request_key(&self) -> Option<&'static str> {
        match self {
            AcceleratorMode::None => None,
            AcceleratorMode::DeviceCount => Some(CUDA_DEVICE),
            AcceleratorMode::Fractional | AcceleratorMode::Both => Some(CUDA_SHARES),
        }
    }
}

/// Slot keys advertised by the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSlots {
    keys: BTreeSet<String>,
}

impl ClusterSlots {
    /// Build from a list of dotted keys
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from the `key -> unit` mapping returned by the API
    pub fn from_slot_map(slots: &BTreeMap<String, String>) -> Self {
        Self::from_keys(slots.keys().cloned())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn has_cuda_device(&self) -> bool {
        self.contains(CUDA_DEVICE)
    }

    pub fn has_cuda_shares(&self) -> bool {
        self.contains(CUDA_SHARES)
    }

    /// Active CUDA accounting mode
    pub fn mode(&self) -> AcceleratorMode {
        match (self.has_cuda_device(), self.has_cuda_shares()) {
            (false, false) => AcceleratorMode::None,
            (true, false) => AcceleratorMode::DeviceCount,
            (false, true) => AcceleratorMode::Fractional,
            (true, true) => AcceleratorMode::Both,
        }
    }

    /// Accelerator families the cluster can schedule
    pub fn accelerators(&self) -> Vec<AcceleratorKind> {
        self.keys
            .iter()
            .filter_map(|key| AcceleratorKind::from_slot_key(key))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_kind_parse() {
        assert_eq!(SlotKind::parse("cpu"), SlotKind::Cpu);
        assert_eq!(SlotKind::parse("mem"), SlotKind::Mem);
        assert_eq!(
            SlotKind::parse("atom.device+"),
            SlotKind::Accelerator(AcceleratorKind::AtomPlusDevice)
        );
        assert_eq!(
            SlotKind::parse("bogus.device"),
            SlotKind::Other("bogus.device".to_string())
        );
    }

    #[test]
    fn test_canonical_keys() {
        let expected = [
            ("cuda.device", "cuda_device"),
            ("cuda.shares", "cuda_shares"),
            ("rocm.device", "rocm_device"),
            ("tpu.device", "tpu_device"),
            ("ipu.device", "ipu_device"),
            ("atom.device", "atom_device"),
            ("atom.device+", "atom_plus_device"),
            ("warboy.device", "warboy_device"),
            ("hyperaccel-lpu.device", "hyperaccel_lpu_device"),
            ("cpu", "cpu"),
            ("mem", "mem"),
        ];
        for (dotted, canonical) in expected {
            assert_eq!(SlotKind::parse(dotted).canonical_key(), canonical, "{dotted}");
        }
    }

    #[test]
    fn test_slot_key_round_trip() {
        for kind in AcceleratorKind::ALL {
            assert_eq!(AcceleratorKind::from_slot_key(kind.slot_key()), Some(kind));
        }
    }

    #[test]
    fn test_cluster_mode() {
        assert_eq!(ClusterSlots::from_keys(["cpu", "mem"]).mode(), AcceleratorMode::None);
        assert_eq!(
            ClusterSlots::from_keys(["cpu", CUDA_DEVICE]).mode(),
            AcceleratorMode::DeviceCount
        );
        assert_eq!(
            ClusterSlots::from_keys([CUDA_SHARES]).mode(),
            AcceleratorMode::Fractional
        );
        assert_eq!(
            ClusterSlots::from_keys([CUDA_SHARES, CUDA_DEVICE]).mode(),
            AcceleratorMode::Both
        );
    }

    #[test]
    fn test_cluster_from_slot_map() {
        let mut map = BTreeMap::new();
        map.insert("cpu".to_string(), "count".to_string());
        map.insert("rocm.device".to_string(), "count".to_string());
        let slots = ClusterSlots::from_slot_map(&map);
        assert!(slots.contains("rocm.device"));
        assert_eq!(slots.accelerators(), vec![AcceleratorKind::RocmDevice]);
    }

    #[test]
    fn test_slot_kind_serde() {
        let kind: SlotKind = serde_json::from_str("\"warboy.device\"").unwrap();
        assert_eq!(kind, SlotKind::Accelerator(AcceleratorKind::WarboyDevice));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"warboy.device\"");
    }
}
