//! Container registry catalog
//!
//! Registries are configured cluster-wide, but each domain decides which of
//! them are visible through an allow-list of hostnames. The allow-list is the
//! only source of truth for "enabled": entries never store it themselves.
//! It is passed around explicitly as an [`AllowList`] value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::error::ValidationError;
use crate::image::RawImage;

/// Hostnames enabled for image discovery in one domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList(Vec<String>);

impl AllowList {
    pub fn from_hostnames<I, S>(hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(hostnames.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, hostname: &str) -> bool {
        self.0.iter().any(|h| h == hostname)
    }

    pub fn hostnames(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Images whose registry is allow-listed
    pub fn filter<'a>(&'a self, images: &'a [RawImage]) -> impl Iterator<Item = &'a RawImage> + 'a {
        images.iter().filter(move |image| self.contains(&image.registry))
    }

    /// Allow-list after enabling or disabling `hostname`
    ///
    /// Enabling an already listed hostname changes nothing. Disabling removes
    /// only the first occurrence.
    pub fn toggled(&self, hostname: &str, enabled: bool) -> Self {
        if enabled {
            let mut next = self.clone();
            if !next.contains(hostname) {
                next.0.push(hostname.to_string());
            }
            next
        } else {
            self.without(hostname)
        }
    }

    /// Allow-list with the first occurrence of `hostname` removed
    pub fn without(&self, hostname: &str) -> Self {
        let mut next = self.clone();
        if let Some(index) = next.0.iter().position(|h| h == hostname) {
            next.0.remove(index);
        }
        next
    }
}

/// Registry flavor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryType {
    #[default]
    Docker,
    Harbor,
    Harbor2,
}

impl RegistryType {
    /// Harbor flavors scope images by project
    pub fn requires_project(&self) -> bool {
        matches!(self, RegistryType::Harbor | RegistryType::Harbor2)
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryType::Docker => "docker",
            RegistryType::Harbor => "harbor",
            RegistryType::Harbor2 => "harbor2",
        };
        f.write_str(name)
    }
}

/// Registry configuration object as stored by the API
///
/// The URL lives under the empty key; `url` is accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(rename = "", alias = "url")]
    pub url: String,

    #[serde(default, rename = "type")]
    pub registry_type: RegistryType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// One value of the registry listing: a bare URL or a config object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRegistry {
    Url(String),
    Config(RegistryConfig),
}

impl RawRegistry {
    fn into_config(self) -> RegistryConfig {
        match self {
            RawRegistry::Url(url) => RegistryConfig {
                url,
                ..Default::default()
            },
            RawRegistry::Config(config) => config,
        }
    }
}

/// A registry as shown in the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub hostname: String,
    pub url: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(rename = "type")]
    pub registry_type: RegistryType,
    pub project: Option<String>,
    pub enabled: bool,
}

impl RegistryEntry {
    /// Entry for a new docker registry, not yet enabled
    pub fn new(hostname: &str, url: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            url: url.to_string(),
            username: None,
            password: None,
            registry_type: RegistryType::Docker,
            project: None,
            enabled: false,
        }
    }

    /// Check hostname, URL scheme and the project rule
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hostname.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "hostname" });
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ValidationError::InvalidRegistryUrl {
                url: self.url.clone(),
            });
        }

        let has_project = self
            .project
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if self.registry_type.requires_project() && !has_project {
            return Err(ValidationError::ProjectRequired {
                hostname: self.hostname.clone(),
                registry_type: self.registry_type.to_string(),
            });
        }
        if !self.registry_type.requires_project() && has_project {
            return Err(ValidationError::ProjectNotAllowed {
                hostname: self.hostname.clone(),
            });
        }
        Ok(())
    }

    /// Config object to send back to the API
    pub fn to_config(&self) -> RegistryConfig {
        RegistryConfig {
            url: self.url.clone(),
            registry_type: self.registry_type,
            username: self.username.clone(),
            password: self.password.clone(),
            project: self
                .project
                .clone()
                .filter(|_| self.registry_type.requires_project()),
        }
    }
}

/// Turn the raw `hostname -> config` listing into catalog entries
///
/// Hostnames are URL-decoded for display; `enabled` comes from `allowed`.
pub fn parse_list(raw: BTreeMap<String, RawRegistry>, allowed: &AllowList) -> Vec<RegistryEntry> {
    raw.into_iter()
        .map(|(key, value)| {
            let hostname = match urlencoding::decode(&key) {
                Ok(decoded) => decoded.into_owned(),
                Err(e) => {
                    debug!("Keeping undecodable registry hostname '{}': {}", key, e);
                    key
                }
            };
            let config = value.into_config();
            RegistryEntry {
                enabled: allowed.contains(&hostname),
                hostname,
                url: config.url,
                username: config.username,
                password: config.password,
                registry_type: config.registry_type,
                project: config.project,
            }
        })
        .collect()
}
