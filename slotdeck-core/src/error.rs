//! Error types for validation and console operations
//!
//! Parsing never fails: malformed tags degrade to partial fields and
//! unsupported accelerators are stripped. Only validation produces errors,
//! and every validation error carries a message key the view layer can
//! translate.

use thiserror::Error;

use crate::image::ReferenceError;

/// Validation failures reported back to the caller
///
/// A validation error rejects a single operation and never touches prior
/// state. Use [`ValidationError::message_key`] to look up the user-facing
/// text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or blank
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// A numeric field could not be coerced
    #[error("invalid value for {field}: '{value}'")]
    InvalidQuantity { field: &'static str, value: String },

    /// Shared memory must be strictly smaller than memory
    #[error("shared memory ({shared_memory}) must be smaller than memory ({memory})")]
    SharedMemoryNotBelowMemory {
        shared_memory: String,
        memory: String,
    },

    /// Harbor registries need a project name
    #[error("registry '{hostname}' of type {registry_type} requires a project")]
    ProjectRequired {
        hostname: String,
        registry_type: String,
    },

    /// Plain docker registries must not carry a project name
    #[error("registry '{hostname}' of type docker must not set a project")]
    ProjectNotAllowed { hostname: String },

    /// Registry URL has no http(s) scheme
    #[error("registry URL must start with http:// or https:// (got '{url}')")]
    InvalidRegistryUrl { url: String },
}

impl ValidationError {
    /// Localization key for the user-facing message
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationError::MissingField { field } => match *field {
                "name" => "resourcePreset.NoPresetName",
                "hostname" => "registry.HostnameIsEmpty",
                _ => "resourcePreset.RequiredFieldMissing",
            },
            ValidationError::InvalidQuantity { .. } => "resourcePreset.InvalidValue",
            ValidationError::SharedMemoryNotBelowMemory { .. } => {
                "resourcePreset.MemoryShouldBeLargerThanSHMEM"
            }
            ValidationError::ProjectRequired { .. } => "registry.ProjectNameIsRequired",
            ValidationError::ProjectNotAllowed { .. } => "registry.ProjectNameNotAllowed",
            ValidationError::InvalidRegistryUrl { .. } => "registry.DescURLStartString",
        }
    }

    /// Whether this error is a constraint violation (as opposed to a
    /// malformed input value)
    pub fn is_constraint_violation(&self) -> bool {
        !matches!(self, ValidationError::InvalidQuantity { .. })
    }
}

/// Errors surfaced by [`crate::console::Console`] operations
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Input rejected before anything was sent to the API
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An image reference string could not be parsed
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// The API collaborator failed
    #[error("API request failed: {0:#}")]
    Api(#[from] anyhow::Error),

    /// A lookup by name found nothing
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
}

impl ConsoleError {
    /// Validation error carried by this failure, if any
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ConsoleError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Result alias for console operations
pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;
