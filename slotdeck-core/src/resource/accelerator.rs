//! Accelerator reconciliation against cluster capabilities
//!
//! A request may carry `cuda.device`, `cuda.shares` and the legacy `gpu` /
//! `fgpu` aliases. Before submission the request is reconciled with the
//! slots the cluster advertises: fields the cluster cannot honor are dropped
//! silently rather than reported.

use std::collections::BTreeMap;
use tracing::debug;

use super::slots::{ClusterSlots, CUDA_DEVICE, CUDA_SHARES};
use crate::units::format_number;

/// Legacy whole-device alias
pub const GPU: &str = "gpu";

/// Legacy fractional alias
pub const FGPU: &str = "fgpu";

/// Requested amounts keyed by dotted slot key (plus `gpu`/`fgpu`)
pub type SlotRequest = BTreeMap<String, String>;

/// Memory margin added to `m`-suffixed install requests, in MiB
pub const INSTALL_MEMORY_MARGIN_MIB: f64 = 256.0;

/// Memory margin added to `g`-suffixed install requests, in GiB
pub const INSTALL_MEMORY_MARGIN_GIB: f64 = 0.5;

fn strip(request: &mut SlotRequest, keys: &[&str]) {
    for key in keys {
        if let Some(value) = request.remove(*key) {
            debug!("Dropping unsupported accelerator field {}={}", key, value);
        }
    }
}

/// Reconcile an accelerator request with the cluster's slot keys
///
/// 1. `cuda.device` and `cuda.shares` both present: `gpu = 0`,
///    `fgpu = cuda.shares`.
/// 2. Only `cuda.device`: `gpu = cuda.device`.
/// 3. If either branch ran but the cluster has no CUDA slot at all, every
///    GPU field is removed.
/// 4. Cluster with both keys: `gpu`/`fgpu` survive only together, otherwise
///    `gpu` and `cuda.device` go.
/// 5. Cluster with only `cuda.device`: `fgpu` and `cuda.shares` go.
/// 6. Cluster with only `cuda.shares`: `gpu` and `cuda.device` go.
///
/// The result depends only on which keys the cluster advertises, never on
/// their order.
pub fn reconcile(requested: &SlotRequest, cluster: &ClusterSlots) -> SlotRequest {
    let mut request = requested.clone();

    // Set by both accelerator branches, not only the fractional one.
    let uses_fractional = match (
        request.get(CUDA_DEVICE).cloned(),
        request.get(CUDA_SHARES).cloned(),
    ) {
        (Some(_), Some(shares)) => {
            request.insert(GPU.to_string(), "0".to_string());
            request.insert(FGPU.to_string(), shares);
            true
        }
        (Some(device), None) => {
            request.insert(GPU.to_string(), device);
            true
        }
        _ => false,
    };

    let has_device = cluster.has_cuda_device();
    let has_shares = cluster.has_cuda_shares();

    if uses_fractional && !has_device && !has_shares {
        strip(&mut request, &[GPU, FGPU, CUDA_SHARES, CUDA_DEVICE]);
    }

    match (has_device, has_shares) {
        (true, true) => {
            if !(request.contains_key(GPU) && request.contains_key(FGPU)) {
                strip(&mut request, &[GPU, CUDA_DEVICE]);
            }
        }
        (true, false) => strip(&mut request, &[FGPU, CUDA_SHARES]),
        (false, true) => strip(&mut request, &[GPU, CUDA_DEVICE]),
        (false, false) => {}
    }

    request
}

/// Add the per-container overhead margin to an install memory request
///
/// `"4g"` becomes `"4.5g"` and `"512m"` becomes `"768m"`. Other forms are
/// returned unchanged.
pub fn pad_memory(mem: &str) -> String {
    let trimmed = mem.trim();
    let Some(suffix) = trimmed.chars().last() else {
        return mem.to_string();
    };
    let margin = match suffix {
        'g' | 'G' => INSTALL_MEMORY_MARGIN_GIB,
        'm' | 'M' => INSTALL_MEMORY_MARGIN_MIB,
        _ => return mem.to_string(),
    };
    match trimmed[..trimmed.len() - 1].parse::<f64>() {
        Ok(magnitude) => format!("{}{suffix}", format_number(magnitude + margin)),
        Err(_) => mem.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(pairs: &[(&str, &str)]) -> SlotRequest {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_device_only_cluster_drops_fgpu() {
        let cluster = ClusterSlots::from_keys([CUDA_DEVICE]);
        let result = reconcile(&request(&[("gpu", "2"), ("fgpu", "0.5")]), &cluster);
        assert_eq!(result, request(&[("gpu", "2")]));
    }

    #[test]
    fn test_shares_only_cluster_drops_device_fields() {
        let cluster = ClusterSlots::from_keys([CUDA_SHARES]);
        let result = reconcile(
            &request(&[("cpu", "1"), ("cuda.device", "1"), ("cuda.shares", "0.5")]),
            &cluster,
        );
        assert_eq!(
            result,
            request(&[("cpu", "1"), ("cuda.shares", "0.5"), ("fgpu", "0.5")])
        );
    }

    #[test]
    fn test_device_request_sets_gpu() {
        let cluster = ClusterSlots::from_keys([CUDA_DEVICE]);
        let result = reconcile(&request(&[("cuda.device", "2")]), &cluster);
        assert_eq!(result, request(&[("cuda.device", "2"), ("gpu", "2")]));
    }

    #[test]
    fn test_cluster_without_gpu_strips_everything() {
        let cluster = ClusterSlots::from_keys(["cpu", "mem"]);
        let result = reconcile(
            &request(&[("cpu", "2"), ("cuda.device", "1"), ("fgpu", "1")]),
            &cluster,
        );
        assert_eq!(result, request(&[("cpu", "2")]));
    }

    #[test]
    fn test_shares_only_request_is_not_stripped_without_gpu_cluster() {
        // Only cuda.device / both trigger the accelerator branch.
        let cluster = ClusterSlots::from_keys(["cpu"]);
        let result = reconcile(&request(&[("cuda.shares", "0.5")]), &cluster);
        assert_eq!(result, request(&[("cuda.shares", "0.5")]));
    }

    #[test]
    fn test_both_modes_keep_pair() {
        let cluster = ClusterSlots::from_keys([CUDA_DEVICE, CUDA_SHARES]);
        let result = reconcile(
            &request(&[("cuda.device", "1"), ("cuda.shares", "0.5")]),
            &cluster,
        );
        assert_eq!(result.get(GPU).map(String::as_str), Some("0"));
        assert_eq!(result.get(FGPU).map(String::as_str), Some("0.5"));
        assert!(result.contains_key(CUDA_DEVICE));
    }

    #[test]
    fn test_both_modes_drop_lone_gpu() {
        let cluster = ClusterSlots::from_keys([CUDA_SHARES, CUDA_DEVICE]);
        let result = reconcile(&request(&[("cuda.device", "1")]), &cluster);
        assert!(result.is_empty());
    }

    #[test]
    fn test_input_is_not_mutated() {
        let cluster = ClusterSlots::from_keys([CUDA_SHARES]);
        let original = request(&[("gpu", "1")]);
        let _ = reconcile(&original, &cluster);
        assert_eq!(original, request(&[("gpu", "1")]));
    }

    #[test]
    fn test_pad_memory() {
        assert_eq!(pad_memory("4g"), "4.5g");
        assert_eq!(pad_memory("1.5g"), "2g");
        assert_eq!(pad_memory("512m"), "768m");
        assert_eq!(pad_memory("64M"), "320M");
        assert_eq!(pad_memory("1024"), "1024");
        assert_eq!(pad_memory(""), "");
        assert_eq!(pad_memory("lots-of-mem"), "lots-of-mem");
    }
}
