//! Module configuration.
//!
//! The configuration mirrors the variables of the infrastructure module:
//! output datasets keyed by a short name, and source datasets whose tables
//! are exposed as filtered views in one of those output datasets.
//!
//! ```toml
//! project_id = "my-project"
//!
//! [output_datasets_config.acme]
//! dataset_id  = "acme_filtered"
//! months_back = 18
//!
//! [source_datasets_config.raw_lake]
//! target_dataset_key = "acme"
//!
//! [source_datasets_config.raw_lake.tables.users]
//! source_table_id = "users"
//! view_name       = "users"
//! filter_columns  = [{ column_name = "account_name", condition = "= 'acme'" }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ViewError, ViewResult};
use crate::predicate::LogicalOp;

pub const DEFAULT_VIEW_PREFIX: &str = "filtered_";
pub const DEFAULT_REGION: &str = "asia-northeast1";
pub const DEFAULT_DATE_COLUMN: &str = "_PARTITIONTIME";

/// Top-level configuration, passed explicitly to every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Ambient project; views and output datasets live here.
    pub project_id: String,

    /// Location for created datasets.
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_view_prefix")]
    pub view_prefix: String,

    /// Column bounded by the retention window unless a table overrides it.
    #[serde(default = "default_date_column")]
    pub date_column: String,

    #[serde(default)]
    pub output_datasets_config: BTreeMap<String, OutputDatasetSpec>,

    #[serde(default)]
    pub source_datasets_config: BTreeMap<String, SourceDatasetSpec>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_view_prefix() -> String {
    DEFAULT_VIEW_PREFIX.to_string()
}

fn default_date_column() -> String {
    DEFAULT_DATE_COLUMN.to_string()
}

/// A destination dataset for filtered views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDatasetSpec {
    pub dataset_id: String,
    #[serde(default)]
    pub description: String,
    /// Retention window in months.
    pub months_back: u32,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A logical grouping of source tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDatasetSpec {
    pub target_dataset_key: String,
    /// Overrides the ambient project for every table in this dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_project_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tables: BTreeMap<String, TableSpec>,
}

/// One source table to expose as a filtered view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub source_table_id: String,
    pub view_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_where: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Ordered; the first operator is never emitted.
    #[serde(default)]
    pub filter_columns: Vec<FilterColumn>,
}

/// One predicate term.
///
/// The operator is kept as written so that the validator can report a
/// malformed value instead of failing inside the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterColumn {
    pub column_name: String,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl FilterColumn {
    pub fn new(column_name: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            condition: condition.into(),
            operator: None,
        }
    }

    /// Set the join operator.
    pub fn with_operator(mut self, op: LogicalOp) -> Self {
        self.operator = Some(op.to_string());
        self
    }

    /// The join operator, `AND` when unset.
    pub fn logical_op(&self) -> ViewResult<LogicalOp> {
        match &self.operator {
            None => Ok(LogicalOp::And),
            Some(op) => op.parse(),
        }
    }
}

impl TableSpec {
    pub fn new(source_table_id: impl Into<String>, view_name: impl Into<String>) -> Self {
        Self {
            source_table_id: source_table_id.into(),
            view_name: view_name.into(),
            filter_columns: Vec::new(),
            additional_where: None,
            date_column: None,
            description: String::new(),
        }
    }

    /// The extra predicate, if it has any content.
    pub fn extra_predicate(&self) -> Option<&str> {
        self.additional_where
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension. Anything but `.json` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

impl ModuleConfig {
    /// Create an empty configuration for a project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: default_region(),
            view_prefix: default_view_prefix(),
            date_column: default_date_column(),
            output_datasets_config: BTreeMap::new(),
            source_datasets_config: BTreeMap::new(),
        }
    }

    /// Load a configuration file; `.json` files are read as JSON, everything
    /// else as TOML.
    pub fn load(path: impl AsRef<Path>) -> ViewResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ViewError::config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let format = ConfigFormat::from_path(path);
        debug!(path = %path.display(), ?format, "loading configuration");
        Self::parse(&content, format)
    }

    /// Decode a configuration from text.
    pub fn parse(content: &str, format: ConfigFormat) -> ViewResult<Self> {
        match format {
            ConfigFormat::Toml => Ok(toml::from_str(content)?),
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| ViewError::config(e.to_string()))
            }
        }
    }

    /// Apply command line or environment overrides.
    pub fn with_overrides(mut self, project_id: Option<String>, view_prefix: Option<String>) -> Self {
        if let Some(project) = project_id {
            self.project_id = project;
        }
        if let Some(prefix) = view_prefix {
            self.view_prefix = prefix;
        }
        self
    }

    /// Total number of tables across all source datasets.
    pub fn table_count(&self) -> usize {
        self.source_datasets_config
            .values()
            .map(|ds| ds.tables.len())
            .sum()
    }

    /// Encode as pretty TOML.
    pub fn to_toml(&self) -> ViewResult<String> {
        toml::to_string_pretty(self).map_err(|e| ViewError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
project_id = "proj-a"

[output_datasets_config.acme]
dataset_id  = "acme_filtered"
description = "Acme views"
months_back = 18
labels      = { environment = "production" }

[source_datasets_config.raw_lake]
target_dataset_key = "acme"
description        = "Raw data lake"

[source_datasets_config.raw_lake.tables.users]
source_table_id = "users"
view_name       = "users"
filter_columns  = [
  { column_name = "account_name", condition = "= 'acme'" },
  { column_name = "status", condition = "= 'active'", operator = "OR" },
]
"#;

    #[test]
    fn test_parse_toml_with_defaults() {
        let cfg = ModuleConfig::parse(SAMPLE, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.project_id, "proj-a");
        assert_eq!(cfg.view_prefix, "filtered_");
        assert_eq!(cfg.region, "asia-northeast1");
        assert_eq!(cfg.date_column, "_PARTITIONTIME");

        let out = &cfg.output_datasets_config["acme"];
        assert_eq!(out.months_back, 18);
        assert_eq!(out.labels["environment"], "production");

        let ds = &cfg.source_datasets_config["raw_lake"];
        assert_eq!(ds.source_project_id, None);
        let users = &ds.tables["users"];
        assert_eq!(users.filter_columns.len(), 2);
        assert_eq!(users.filter_columns[0].logical_op().unwrap(), LogicalOp::And);
        assert_eq!(users.filter_columns[1].logical_op().unwrap(), LogicalOp::Or);
        assert_eq!(users.additional_where, None);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "project_id": "proj-a",
            "view_prefix": "v_",
            "output_datasets_config": {
                "acme": { "dataset_id": "acme_filtered", "months_back": 6 }
            },
            "source_datasets_config": {
                "raw": {
                    "target_dataset_key": "acme",
                    "source_project_id": "proj-b",
                    "tables": { "t": { "source_table_id": "t", "view_name": "t" } }
                }
            }
        }"#;
        let cfg = ModuleConfig::parse(json, ConfigFormat::Json).unwrap();
        assert_eq!(cfg.view_prefix, "v_");
        assert_eq!(
            cfg.source_datasets_config["raw"].source_project_id.as_deref(),
            Some("proj-b")
        );
        assert_eq!(cfg.table_count(), 1);
    }

    #[test]
    fn test_negative_months_back_rejected() {
        let bad = r#"
project_id = "p"
[output_datasets_config.a]
dataset_id = "a"
months_back = -1
"#;
        let err = ModuleConfig::parse(bad, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ViewError::Config(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("views")), ConfigFormat::Toml);
    }

    #[test]
    fn test_overrides() {
        let cfg = ModuleConfig::new("a").with_overrides(Some("b".into()), None);
        assert_eq!(cfg.project_id, "b");
        assert_eq!(cfg.view_prefix, "filtered_");
    }

    #[test]
    fn test_blank_additional_where_is_ignored() {
        let mut table = TableSpec::new("t", "t");
        table.additional_where = Some("   ".to_string());
        assert_eq!(table.extra_predicate(), None);
        table.additional_where = Some(" x > 1 ".to_string());
        assert_eq!(table.extra_predicate(), Some("x > 1"));
    }

    #[test]
    fn test_toml_roundtrip_keeps_optional_fields_out() {
        let cfg = ModuleConfig::parse(SAMPLE, ConfigFormat::Toml).unwrap();
        let text = cfg.to_toml().unwrap();
        assert!(!text.contains("source_project_id"));
        assert_eq!(ModuleConfig::parse(&text, ConfigFormat::Toml).unwrap(), cfg);
    }
}
