//! Slot manifest loading
//!
//! The chart manifest declares its slots once; they are validated against a
//! JSON schema generated from [`SlotConfig`] and are read-only afterwards.
//! A manifest that fails validation degrades to an empty slot set and keeps
//! the formatted error for display instead of aborting.

use crate::error::ManifestError;
use crate::types::SlotConfig;
use jsonschema::JSONSchema;
use std::collections::HashSet;

/// Result of loading a manifest: usable configs plus any validation error
#[derive(Debug, Clone, Default)]
pub struct ManifestLoad {
    /// Validated slot configs (empty when validation failed)
    pub configs: Vec<SlotConfig>,
    /// Formatted validation error, if any
    pub error: Option<String>,
}

impl ManifestLoad {
    /// Whether the manifest loaded cleanly
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// JSON schema for the `slots` array, generated from [`SlotConfig`]
#[must_use]
pub fn slots_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(Vec<SlotConfig>);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Bool(true))
}

/// Validate a `slots` array and deserialize it
///
/// # Errors
/// - [`ManifestError::Validation`] for schema violations or duplicate names
/// - [`ManifestError::Schema`] if the generated schema does not compile
pub fn parse_slots(slots: &serde_json::Value) -> Result<Vec<SlotConfig>, ManifestError> {
    let schema = slots_schema();
    let compiled =
        JSONSchema::compile(&schema).map_err(|e| ManifestError::Schema(e.to_string()))?;

    if let Err(errors) = compiled.validate(slots) {
        let formatted = errors
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect::<Vec<_>>();
        return Err(ManifestError::Validation(formatted));
    }

    let configs: Vec<SlotConfig> = serde_json::from_value(slots.clone())?;

    let mut seen = HashSet::new();
    let duplicates = configs
        .iter()
        .enumerate()
        .filter(|(_, c)| !seen.insert(c.name.as_str()))
        .map(|(i, c)| format!("/{i}/name: duplicate slot name '{}'", c.name))
        .collect::<Vec<_>>();
    if !duplicates.is_empty() {
        return Err(ManifestError::Validation(duplicates));
    }

    Ok(configs)
}

/// Parse a full manifest document (`{"slots": [...], ...}`)
///
/// # Errors
/// Any [`ManifestError`]; see [`parse_slots`].
pub fn parse_manifest(text: &str) -> Result<Vec<SlotConfig>, ManifestError> {
    let manifest: serde_json::Value = serde_json::from_str(text)?;
    let slots = manifest.get("slots").ok_or(ManifestError::MissingSlots)?;
    parse_slots(slots)
}

/// Load a manifest, degrading to an empty slot set on failure
#[must_use]
pub fn load_manifest(text: &str) -> ManifestLoad {
    match parse_manifest(text) {
        Ok(configs) => {
            tracing::debug!(slots = configs.len(), "slot manifest loaded");
            ManifestLoad {
                configs,
                error: None,
            }
        }
        Err(e) => {
            let message = match &e {
                ManifestError::Validation(_) => e.to_string(),
                other => format!("Failed to load slot configurations from manifest: {other}"),
            };
            tracing::error!(error = %message, "slot manifest rejected");
            ManifestLoad {
                configs: Vec::new(),
                error: Some(message),
            }
        }
    }
}
