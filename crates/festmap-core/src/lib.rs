//! Domain core for the festival map: document model, validation, geo
//! matching and the merge engine.
//!
//! Nothing in this crate performs I/O apart from reading environment
//! variables in [`load_app_config`].

pub mod app_config;
pub mod canonical;
pub mod config;
pub mod document;
pub mod geo;
pub mod merge;
pub mod types;
pub mod validate;

pub use app_config::{AppConfig, Environment};
pub use canonical::{canonical_json_bytes, content_fingerprint};
pub use config::{load_app_config, load_app_config_from_env};
pub use document::{decode_map_document, parse_map_document, DocumentError};
pub use geo::{is_same_location, MATCH_DISTANCE_DEGREES};
pub use merge::{merge, merge_at, MergeResult, MergeStats};
pub use types::{Location, MapDocument, Metadata, MERGE_FORMAT_VERSION};
pub use validate::{validate_location, validate_map_structure, ValidationError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
