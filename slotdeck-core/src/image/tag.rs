//! Image tag and name parsing
//!
//! Image names look like `namespace/lang` or `namespace/base-lang` and tags
//! like `version-base-customization...`. Neither is validated: anything that
//! does not fit the expected shape degrades to partial fields so one odd
//! image never breaks the whole catalog.

use std::collections::BTreeMap;
use tracing::debug;

use super::reference::normalize_architecture;
use super::{ImageConstraint, ImageRecord, RawImage, CUSTOMIZED_IMAGE_NAME_LABEL};
use crate::alias::AliasTables;
use crate::registry::AllowList;
use crate::resource::limits::ResourceLimits;

/// Tag token that ends the customization tail
pub const CUSTOMIZED_MARKER: &str = "customized_";

/// Language token whose images encode the version in the name
const R_LANG: &str = "r";

/// Fields derived from the tag alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFields {
    pub base_version: String,

    /// Raw (not humanized) base-image token
    pub base_image: Option<String>,

    pub constraint: Option<ImageConstraint>,
}

/// Split a tag into version, base image and customization constraint
pub fn parse_tag(
    tag: Option<&str>,
    labels: &BTreeMap<String, String>,
    aliases: &AliasTables,
) -> TagFields {
    let Some(tag) = tag else {
        return TagFields {
            base_version: String::new(),
            base_image: None,
            constraint: None,
        };
    };

    let tokens: Vec<&str> = tag.split('-').collect();
    if tokens.len() < 2 {
        return TagFields {
            base_version: tag.to_string(),
            base_image: None,
            constraint: None,
        };
    }

    let constraint = if tokens.len() > 2 {
        let tail = &tokens[2..];
        let end = tail
            .iter()
            .position(|token| *token == CUSTOMIZED_MARKER)
            .unwrap_or(tail.len());
        Some(ImageConstraint {
            base: (end > 0).then(|| aliases.humanize(&tail[..end].join("-"))),
            customized: labels.get(CUSTOMIZED_IMAGE_NAME_LABEL).cloned(),
        })
    } else {
        None
    };

    TagFields {
        base_version: tokens[0].to_string(),
        base_image: Some(tokens[1].to_string()),
        constraint,
    }
}

/// Split an image name into `(namespace, lang)`
///
/// With two or more segments the first is the namespace and the rest are
/// concatenated without a separator.
pub fn parse_name(name: &str) -> (String, String) {
    let segments: Vec<&str> = name.split('/').collect();
    if segments.len() >= 2 {
        (segments[0].to_string(), segments[1..].concat())
    } else {
        (String::new(), name.to_string())
    }
}

/// Resolve the display language and base-image list
///
/// `base-lang` names move `base` into the base-image list, except for the
/// R runtime (`r-...`), whose language stays `r`.
pub fn resolve_lang(
    lang: &str,
    base_image: Option<&str>,
    aliases: &AliasTables,
) -> (String, Vec<String>) {
    let mut bases: Vec<String> = base_image.map(|b| aliases.humanize(b)).into_iter().collect();

    let parts: Vec<&str> = lang.split('-').collect();
    let lang = if parts.len() > 1 {
        if parts[0] == R_LANG {
            bases.push(aliases.humanize(R_LANG));
            R_LANG
        } else {
            bases.push(aliases.humanize(parts[0]));
            parts[1]
        }
    } else {
        lang
    };

    (aliases.humanize(lang), bases)
}

/// Build the catalog record for one raw image
pub fn parse_image(raw: &RawImage, aliases: &AliasTables) -> ImageRecord {
    let labels: BTreeMap<String, String> = raw
        .labels
        .iter()
        .map(|pair| (pair.key.clone(), pair.value.clone()))
        .collect();

    if raw.tag.as_deref().map_or(true, str::is_empty) {
        debug!("Image {}/{} has no tag; base version left empty", raw.registry, raw.name);
    }

    let tag = parse_tag(raw.tag.as_deref(), &labels, aliases);
    let (namespace, lang) = parse_name(&raw.name);
    let (lang, base_image) = resolve_lang(&lang, tag.base_image.as_deref(), aliases);

    ImageRecord {
        registry: raw.registry.clone(),
        name: raw.name.clone(),
        tag: raw.tag.clone(),
        architecture: normalize_architecture(&raw.architecture),
        digest: raw.digest.clone(),
        installed: raw.installed,
        labels,
        supported_accelerators: raw
            .supported_accelerators
            .iter()
            .filter(|acc| !acc.is_empty())
            .cloned()
            .collect(),
        namespace,
        lang,
        base_version: tag.base_version,
        base_image,
        constraint: tag.constraint,
        resource_limits: ResourceLimits::normalize(&raw.resource_limits),
    }
}

/// Filter by allow-list, then parse every remaining image
///
/// Each record is built independently of the others.
pub fn parse_images(raw: &[RawImage], allowed: &AllowList, aliases: &AliasTables) -> Vec<ImageRecord> {
    let records: Vec<ImageRecord> = allowed
        .filter(raw)
        .map(|image| parse_image(image, aliases))
        .collect();
    debug!(
        "Parsed {} of {} images from allow-listed registries",
        records.len(),
        raw.len()
    );
    records
}
