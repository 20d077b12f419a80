//! Core slot types
//!
//! Defines the data model shared by the store, the query builders and the
//! bridge wire format:
//! - [`SlotConfig`] - manifest-declared slot definition (read-only)
//! - [`Slot`] - a named drop target and its current columns
//! - [`ColumnRef`] - a dataset column placed into a slot
//!
//! Field names serialize in camelCase because these values cross the sandbox
//! boundary verbatim.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slot data type as declared in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    /// Grouping slot (becomes a query dimension)
    Categorical,
    /// Value slot (becomes a query measure)
    Numeric,
    /// Accepts both kinds of columns
    Mixed,
}

impl SlotType {
    /// Whether columns in this slot are aggregated measures
    #[inline]
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Numeric)
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Categorical => f.write_str("categorical"),
            Self::Numeric => f.write_str("numeric"),
            Self::Mixed => f.write_str("mixed"),
        }
    }
}

/// Static slot definition loaded from the chart manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotConfig {
    /// Unique slot name (e.g. `category`, `measure`, `legend`)
    pub name: String,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Slot data type
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// Whether the chart cannot query without this slot
    #[serde(default)]
    pub is_required: bool,
    /// Display / evaluation order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Column types this slot accepts (any when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptable_column_types: Option<Vec<String>>,
    /// Whether more than one column may be dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_accept_multiple_columns: Option<bool>,
    /// Whether the slot label is rotated in the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<bool>,
    /// Free-form slot options passed through to the chart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl SlotConfig {
    /// Create a slot config with the given name and type
    #[must_use]
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            label: None,
            slot_type,
            is_required: false,
            order: None,
            acceptable_column_types: None,
            can_accept_multiple_columns: None,
            rotate: None,
            options: None,
        }
    }

    /// Mark slot as required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// With display label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// With display order
    #[inline]
    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Allow multiple columns
    #[inline]
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.can_accept_multiple_columns = Some(true);
        self
    }

    /// Restrict accepted column types
    #[must_use]
    pub fn accepting<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptable_column_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the slot accepts more than one column
    #[inline]
    #[must_use]
    pub fn accepts_multiple(&self) -> bool {
        self.can_accept_multiple_columns.unwrap_or(false)
    }

    /// Whether a column of the given type may be dropped here
    #[must_use]
    pub fn accepts_column_type(&self, column_type: &str) -> bool {
        match &self.acceptable_column_types {
            Some(types) => types.iter().any(|t| t == column_type),
            None => true,
        }
    }
}

/// Reference to a backend dataset column plus per-use metadata
///
/// Immutable once placed; a new drop replaces the whole value. Keys the
/// builder does not model are kept in `extra` and round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRef {
    /// Backend column id
    pub column_id: String,
    /// Backend dataset id
    pub dataset_id: String,
    /// Column type (`numeric`, `hierarchy`, `datetime`, ...)
    #[serde(rename = "type", default)]
    pub column_type: String,
    /// Column subtype
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Presentation format (d3 format string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Display label (plain string or i18n map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<serde_json::Value>,
    /// Hierarchy / datetime level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Lowest available level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowest_level: Option<u32>,
    /// Currency symbol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Aggregation applied when used as a measure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_func: Option<String>,
    /// Any other keys carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ColumnRef {
    /// Create a column reference
    #[must_use]
    pub fn new(dataset_id: impl Into<String>, column_id: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            dataset_id: dataset_id.into(),
            ..Self::default()
        }
    }

    /// With column type
    #[inline]
    #[must_use]
    pub fn with_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }

    /// With aggregation function
    #[inline]
    #[must_use]
    pub fn with_aggregation(mut self, aggregation: impl Into<String>) -> Self {
        self.aggregation_func = Some(aggregation.into());
        self
    }

    /// With presentation format
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// With level
    #[inline]
    #[must_use]
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// With label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<serde_json::Value>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A named drop target and its current contents
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Slot {
    /// Slot name, matches a [`SlotConfig`]
    pub name: String,
    /// Columns currently placed in the slot
    #[serde(default)]
    pub content: Vec<ColumnRef>,
}

impl Slot {
    /// Create an empty slot
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Vec::new(),
        }
    }

    /// Create a slot with content
    #[must_use]
    pub fn with_content(name: impl Into<String>, content: Vec<ColumnRef>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Whether the slot holds at least one column
    #[inline]
    #[must_use]
    pub fn is_filled(&self) -> bool {
        !self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn slot_config_parses_manifest_shape() {
        let config: SlotConfig = serde_json::from_value(json!({
            "name": "measure",
            "rotate": true,
            "label": "Measure",
            "type": "numeric",
            "order": 2,
            "options": { "isAggregationDisabled": false },
            "isRequired": true
        }))
        .unwrap();

        assert_eq!(config.name, "measure");
        assert_eq!(config.slot_type, SlotType::Numeric);
        assert!(config.is_required);
        assert_eq!(config.order, Some(2));
        assert!(!config.accepts_multiple());
    }

    #[test]
    fn column_ref_keeps_unknown_keys() {
        let value = json!({
            "columnId": "c1",
            "datasetId": "d1",
            "type": "hierarchy",
            "hierarchyLevels": [{ "id": "h1", "level": 1 }]
        });
        let column: ColumnRef = serde_json::from_value(value.clone()).unwrap();

        assert_eq!(column.column_id, "c1");
        assert!(column.extra.contains_key("hierarchyLevels"));
        assert_eq!(serde_json::to_value(&column).unwrap(), value);
    }

    #[test]
    fn accepts_column_type_defaults_to_any() {
        let open = SlotConfig::new("legend", SlotType::Categorical);
        let closed = SlotConfig::new("measure", SlotType::Numeric).accepting(["numeric"]);

        assert!(open.accepts_column_type("datetime"));
        assert!(closed.accepts_column_type("numeric"));
        assert!(!closed.accepts_column_type("hierarchy"));
    }
}
