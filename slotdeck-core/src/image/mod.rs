//! Container image catalog records
//!
//! Raw images come from the API listing as loosely structured
//! `registry/name:tag` triples with labels and resource limits attached.
//! [`tag::parse_image`] turns each one into an [`ImageRecord`] with the
//! derived display fields the console shows.
//!
//! ```text
//! RawImage ──► allow-list filter ──► parse_image ──► ImageRecord
//!                (registry)           │    │
//!                                     │    └── ResourceLimits::normalize
//!                                     └── AliasTables::humanize
//! ```

pub mod reference;
pub mod tag;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resource::limits::{ResourceLimitEntry, ResourceLimits};

pub use reference::{ImageReference, KnownRegistries, ReferenceError};
pub use tag::{parse_image, parse_images};

/// Label naming the image a customized image was built from
pub const CUSTOMIZED_IMAGE_NAME_LABEL: &str = "ai.backend.customized-image.name";

/// A `{key, value}` label pair as listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

/// An image as returned by the API listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    pub registry: String,

    pub name: String,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub architecture: String,

    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub installed: bool,

    #[serde(default)]
    pub labels: Vec<KvPair>,

    #[serde(default, alias = "resourceLimits")]
    pub resource_limits: Vec<ResourceLimitEntry>,

    #[serde(default, alias = "supportedAccelerators")]
    pub supported_accelerators: Vec<String>,
}

impl RawImage {
    /// `registry/name:tag` of this listing entry
    pub fn reference(&self) -> String {
        format!(
            "{}/{}:{}",
            self.registry,
            self.name,
            self.tag.as_deref().unwrap_or("latest")
        )
    }
}

/// Customization marker derived from tag tokens past the base image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConstraint {
    /// Humanized tag tail, `None` when the marker directly follows the
    /// base image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// Value of the customized-image name label, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customized: Option<String>,
}

/// A normalized catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub registry: String,
    pub name: String,
    pub tag: Option<String>,
    pub architecture: String,
    pub digest: Option<String>,
    pub installed: bool,
    pub labels: BTreeMap<String, String>,
    pub supported_accelerators: Vec<String>,

    /// First path segment of `name`, empty when there is none
    pub namespace: String,

    /// Humanized language / runtime name
    pub lang: String,

    /// Version token of the tag
    pub base_version: String,

    /// Humanized base-image tokens
    pub base_image: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ImageConstraint>,

    /// Normalized limits, serialized as `<kind>_limit_min/max` fields
    #[serde(flatten)]
    pub resource_limits: ResourceLimits,
}

impl ImageRecord {
    /// `registry/name:tag` used when installing this image
    pub fn reference(&self) -> String {
        format!(
            "{}/{}:{}",
            self.registry,
            self.name,
            self.tag.as_deref().unwrap_or("latest")
        )
    }

    /// Whether this record is the image a parsed reference points at
    pub fn matches(&self, reference: &ImageReference) -> bool {
        self.registry == reference.registry()
            && self.name == reference.name()
            && self.tag.as_deref().unwrap_or("latest") == reference.tag()
            && self.architecture == reference.architecture()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}
