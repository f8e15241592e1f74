//! Resource slots, per-image limits and accelerator reconciliation

pub mod accelerator;
pub mod install;
pub mod limits;
pub mod slots;

pub use accelerator::{reconcile, SlotRequest};
pub use install::{InstallConfig, InstallRequest};
pub use limits::{LimitPair, LimitValue, ResourceLimitEntry, ResourceLimits};
pub use slots::{AcceleratorKind, AcceleratorMode, ClusterSlots, SlotKind};
