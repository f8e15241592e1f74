//! Image reference strings (`registry/name:tag`)
//!
//! Parses the reference strings users type or paste, e.g. when picking an
//! image to install. Registry detection needs the list of known registries:
//! without it, `myregistry.org/lua` is read as an image name on the default
//! registry.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Registry assumed when a reference names none
pub const DEFAULT_REGISTRY: &str = "index.docker.io";

/// Repository prefixed to bare names on the default registry
pub const DEFAULT_REPOSITORY: &str = "lablup";

/// Architecture assumed when none is given
pub const DEFAULT_ARCHITECTURE: &str = "x86_64";

static TAG_SLUG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9\-._]*[A-Za-z0-9])?$").expect("valid tag regex")
});

/// Reference parsing failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReferenceError {
    #[error("invalid image name: {0}")]
    InvalidImageName(String),

    #[error("invalid image tag '{tag}' in '{reference}'")]
    InvalidImageTag { tag: String, reference: String },
}

/// Map architecture spellings to the names the scheduler uses
pub fn normalize_architecture(arch: &str) -> String {
    let canonical = match arch {
        "arm64" | "aarch64" => "aarch64",
        "x86_64" | "x64" | "amd64" => "x86_64",
        "x86" | "x32" | "i686" | "386" => "x86",
        other => other,
    };
    canonical.to_string()
}

/// Which registry names are accepted as the leading path segment
#[derive(Debug, Clone, Copy)]
pub enum KnownRegistries<'a> {
    /// Only these hostnames (plus the default registry and IP addresses)
    Listed(&'a [String]),
    /// Any leading segment is a registry
    Any,
}

fn host_is_ip_address(value: &str) -> bool {
    let host = if let Some(rest) = value.strip_prefix('[') {
        match rest.split_once(']') {
            Some((host, _)) => host,
            None => return false,
        }
    } else if value.matches(':').count() > 1 {
        value
    } else {
        value.split(':').next().unwrap_or(value)
    };
    host.parse::<IpAddr>().is_ok()
}

/// Whether `value` names a registry
pub fn is_known_registry(value: &str, known: KnownRegistries<'_>) -> bool {
    if value == DEFAULT_REGISTRY {
        return true;
    }
    match known {
        KnownRegistries::Any => true,
        KnownRegistries::Listed(list) => {
            list.iter().any(|known| known == value) || host_is_ip_address(value)
        }
    }
}

/// A parsed image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: String,
    name: String,
    tag: String,
    architecture: String,
}

impl ImageReference {
    /// Parse a reference string
    pub fn parse(
        value: &str,
        known: KnownRegistries<'_>,
        architecture: &str,
    ) -> Result<Self, ReferenceError> {
        if value.contains("://") || value.starts_with("//") {
            return Err(ReferenceError::InvalidImageName(value.to_string()));
        }

        let (registry, (name, tag)) = match value.split_once('/') {
            None => (
                DEFAULT_REGISTRY.to_string(),
                Self::split_name_tag(value, true)?,
            ),
            Some((head, rest)) if is_known_registry(head, known) => {
                let using_default = head == "docker.io" || head.ends_with(".docker.io");
                (head.to_string(), Self::split_name_tag(rest, using_default)?)
            }
            Some(_) => (
                DEFAULT_REGISTRY.to_string(),
                Self::split_name_tag(value, true)?,
            ),
        };

        if !TAG_SLUG.is_match(&tag) {
            return Err(ReferenceError::InvalidImageTag {
                tag,
                reference: value.to_string(),
            });
        }

        Ok(Self {
            registry,
            name,
            tag,
            architecture: normalize_architecture(architecture),
        })
    }

    fn split_name_tag(s: &str, using_default_registry: bool) -> Result<(String, String), ReferenceError> {
        let (image, tag) = match s.rsplit_once(':') {
            Some((image, tag)) => (image, tag),
            None => (s, "latest"),
        };
        if image.is_empty() {
            return Err(ReferenceError::InvalidImageName(
                "Empty image repository/name".to_string(),
            ));
        }
        let image = if !image.contains('/') && using_default_registry {
            format!("{DEFAULT_REPOSITORY}/{image}")
        } else {
            image.to_string()
        };
        Ok((image, tag.to_string()))
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// `registry/name:tag`
    pub fn canonical(&self) -> String {
        format!("{}/{}:{}", self.registry, self.name, self.tag)
    }

    /// `name:tag`, without the registry
    pub fn short(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
