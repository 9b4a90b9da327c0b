//! Apply plan for the external infrastructure engine.
//!
//! Datasets always come before the views placed in them. The plan itself is
//! inert data; creating anything is left to whoever consumes it.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::builder::{self, ResolvedView};
use crate::config::ModuleConfig;
use crate::error::ViewResult;
use crate::template::SqlTemplate;

/// Create-if-missing request for one output dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRequest {
    pub key: String,
    pub project: String,
    pub dataset_id: String,
    pub location: String,
    pub description: String,
    pub labels: BTreeMap<String, String>,
}

/// Create-or-replace request for one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRequest {
    pub key: String,
    pub project: String,
    pub dataset_id: String,
    pub view_name: String,
    pub source: String,
    pub sql: String,
    pub description: String,
    pub labels: BTreeMap<String, String>,
}

impl ViewRequest {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset_id, self.view_name)
    }
}

/// Everything the apply engine needs, in dependency order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyPlan {
    pub datasets: Vec<DatasetRequest>,
    pub views: Vec<ViewRequest>,
}

impl ApplyPlan {
    /// Resolve the configuration and render every view with `template`.
    pub fn build(config: &ModuleConfig, template: &SqlTemplate) -> ViewResult<Self> {
        let views = builder::resolve(config)?;
        Ok(Self::from_views(config, &views, template))
    }

    /// Assemble a plan from already resolved views.
    pub fn from_views(config: &ModuleConfig, views: &[ResolvedView], template: &SqlTemplate) -> Self {
        let datasets: Vec<DatasetRequest> = config
            .output_datasets_config
            .iter()
            .map(|(key, out)| DatasetRequest {
                key: key.clone(),
                project: config.project_id.clone(),
                dataset_id: out.dataset_id.clone(),
                location: config.region.clone(),
                description: out.description.clone(),
                labels: out.labels.clone(),
            })
            .collect();

        let views: Vec<ViewRequest> = views
            .iter()
            .map(|v| ViewRequest {
                key: v.key.clone(),
                project: config.project_id.clone(),
                dataset_id: v.target_dataset_id.clone(),
                view_name: v.view_name.clone(),
                source: v.source_location(),
                sql: template.render(v),
                description: v.description.clone(),
                labels: view_labels(v),
            })
            .collect();

        info!(datasets = datasets.len(), views = views.len(), "built apply plan");
        Self { datasets, views }
    }

    /// Encode as pretty JSON.
    pub fn to_json(&self) -> ViewResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as a DDL script: datasets first, then views.
    pub fn to_ddl(&self) -> String {
        let mut sql = String::new();

        for ds in &self.datasets {
            sql.push_str(&format!(
                "CREATE SCHEMA IF NOT EXISTS `{}.{}`\nOPTIONS (location = '{}'",
                ds.project,
                ds.dataset_id,
                escape(&ds.location)
            ));
            if !ds.description.is_empty() {
                sql.push_str(&format!(", description = '{}'", escape(&ds.description)));
            }
            if !ds.labels.is_empty() {
                sql.push_str(&format!(", labels = {}", labels_literal(&ds.labels)));
            }
            sql.push_str(");\n\n");
        }

        for view in &self.views {
            sql.push_str(&format!("-- {} ({})\n", view.key, view.source));
            sql.push_str(&format!("CREATE OR REPLACE VIEW `{}`", view.qualified_name()));
            if !view.description.is_empty() {
                sql.push_str(&format!(
                    "\nOPTIONS (description = '{}')",
                    escape(&view.description)
                ));
            }
            sql.push_str(" AS\n");
            sql.push_str(&view.sql);
            sql.push_str(";\n\n");
        }

        sql.truncate(sql.trim_end().len());
        if !sql.is_empty() {
            sql.push('\n');
        }
        sql
    }
}

/// Dataset labels plus where the view reads from.
fn view_labels(view: &ResolvedView) -> BTreeMap<String, String> {
    let mut labels = view.labels.clone();
    labels.insert("source_dataset".to_string(), view.source_dataset_key.clone());
    labels.insert("source_table".to_string(), view.table_key.clone());
    labels
}

fn labels_literal(labels: &BTreeMap<String, String>) -> String {
    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("('{}', '{}')", escape(k), escape(v)))
        .collect();
    format!("[{}]", pairs.join(", "))
}

/// Escape a string literal for the OPTIONS clause. View bodies are not
/// touched.
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
