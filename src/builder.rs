//! View specification builder.
//!
//! Flattens `source dataset -> table` into one [`ResolvedView`] per table.
//! Resolution is pure: the same configuration always yields the same views,
//! in key order.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ModuleConfig, OutputDatasetSpec, SourceDatasetSpec, TableSpec};
use crate::date_range::DateRange;
use crate::error::{ViewError, ViewResult};
use crate::predicate::combine_filters;
use crate::validator;

/// The fully computed definition of one filtered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedView {
    /// `<source dataset key>.<table key>`
    pub key: String,
    pub source_dataset_key: String,
    pub table_key: String,

    pub source_project: String,
    pub source_dataset: String,
    pub source_table: String,

    pub target_dataset_key: String,
    pub target_dataset_id: String,
    /// Prefix plus the declared view name.
    pub view_name: String,

    /// Combined filter predicate; empty when the table declares no filters.
    pub filter_predicate: String,
    pub additional_where: Option<String>,
    pub date_column: String,
    pub date_range: DateRange,

    pub description: String,
    pub labels: BTreeMap<String, String>,
}

impl ResolvedView {
    /// `project.dataset.view` of the generated view.
    pub fn qualified_name(&self, project: &str) -> String {
        format!("{}.{}.{}", project, self.target_dataset_id, self.view_name)
    }

    /// `project.dataset.table` of the source table.
    pub fn source_location(&self) -> String {
        format!(
            "{}.{}.{}",
            self.source_project, self.source_dataset, self.source_table
        )
    }
}

/// Final view identifier: prefix followed by the declared name.
pub fn view_name(prefix: &str, declared: &str) -> String {
    format!("{}{}", prefix, declared)
}

/// The dataset-level override if present, else the ambient project.
pub fn source_project<'a>(ambient: &'a str, dataset: &'a SourceDatasetSpec) -> &'a str {
    dataset
        .source_project_id
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(ambient)
}

/// Validate the configuration and resolve every table into a view.
///
/// Fails before resolving anything if the configuration is invalid.
pub fn resolve(config: &ModuleConfig) -> ViewResult<Vec<ResolvedView>> {
    validator::validate(config).map_err(ViewError::Invalid)?;

    let mut views = Vec::with_capacity(config.table_count());
    for (ds_key, dataset) in &config.source_datasets_config {
        let target = config
            .output_datasets_config
            .get(&dataset.target_dataset_key)
            .ok_or_else(|| {
                ViewError::config(format!(
                    "unknown target dataset '{}'",
                    dataset.target_dataset_key
                ))
            })?;

        for (table_key, table) in &dataset.tables {
            let view = resolve_table(config, ds_key, dataset, target, table_key, table)?;
            debug!(view = %view.key, target = %view.target_dataset_id, name = %view.view_name, "resolved view");
            views.push(view);
        }
    }

    info!(
        views = views.len(),
        datasets = config.output_datasets_config.len(),
        "resolved configuration"
    );
    Ok(views)
}

/// Look up a resolved view by its `<source dataset>.<table>` key.
pub fn find_view<'a>(views: &'a [ResolvedView], key: &str) -> ViewResult<&'a ResolvedView> {
    views
        .iter()
        .find(|v| v.key == key)
        .ok_or_else(|| ViewError::UnknownView(key.to_string()))
}

fn resolve_table(
    config: &ModuleConfig,
    ds_key: &str,
    dataset: &SourceDatasetSpec,
    target: &OutputDatasetSpec,
    table_key: &str,
    table: &TableSpec,
) -> ViewResult<ResolvedView> {
    Ok(ResolvedView {
        key: format!("{}.{}", ds_key, table_key),
        source_dataset_key: ds_key.to_string(),
        table_key: table_key.to_string(),
        source_project: source_project(&config.project_id, dataset).to_string(),
        source_dataset: ds_key.to_string(),
        source_table: table.source_table_id.clone(),
        target_dataset_key: dataset.target_dataset_key.clone(),
        target_dataset_id: target.dataset_id.clone(),
        view_name: view_name(&config.view_prefix, &table.view_name),
        filter_predicate: combine_filters(&table.filter_columns)?,
        additional_where: table.extra_predicate().map(str::to_string),
        date_column: table
            .date_column
            .clone()
            .unwrap_or_else(|| config.date_column.clone()),
        date_range: DateRange::months_back(target.months_back),
        description: table.description.clone(),
        labels: target.labels.clone(),
    })
}
