//! Read-only projections over resolved views.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::builder::ResolvedView;
use crate::config::ModuleConfig;
use crate::date_range::DateRange;

/// Views grouped by the dataset they read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceGroup {
    pub source_dataset: String,
    pub source_project: String,
    pub views: Vec<String>,
}

/// Views grouped by the dataset they are created in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetGroup {
    pub target_dataset_key: String,
    pub dataset_id: String,
    pub views: Vec<String>,
}

/// Retention window of one output dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRangeSummary {
    pub target_dataset_key: String,
    pub dataset_id: String,
    #[serde(flatten)]
    pub range: DateRange,
    /// Concrete bounds, present when evaluated against a reference day.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_views: usize,
    pub by_source_dataset: Vec<SourceGroup>,
    pub by_target_dataset: Vec<TargetGroup>,
    pub date_ranges: Vec<DateRangeSummary>,
}

impl Summary {
    /// Summarise resolved views. `today` fills in concrete dates.
    pub fn new(config: &ModuleConfig, views: &[ResolvedView], today: Option<NaiveDate>) -> Self {
        Self {
            total_views: views.len(),
            by_source_dataset: by_source_dataset(views),
            by_target_dataset: by_target_dataset(config, views),
            date_ranges: date_ranges(config, today),
        }
    }
}

pub fn by_source_dataset(views: &[ResolvedView]) -> Vec<SourceGroup> {
    let mut groups: BTreeMap<&str, SourceGroup> = BTreeMap::new();
    for v in views {
        groups
            .entry(&v.source_dataset_key)
            .or_insert_with(|| SourceGroup {
                source_dataset: v.source_dataset_key.clone(),
                source_project: v.source_project.clone(),
                views: Vec::new(),
            })
            .views
            .push(v.key.clone());
    }
    groups.into_values().collect()
}

/// Every output dataset appears, even one with no views.
pub fn by_target_dataset(config: &ModuleConfig, views: &[ResolvedView]) -> Vec<TargetGroup> {
    let mut groups: BTreeMap<&str, TargetGroup> = config
        .output_datasets_config
        .iter()
        .map(|(key, out)| {
            (
                key.as_str(),
                TargetGroup {
                    target_dataset_key: key.clone(),
                    dataset_id: out.dataset_id.clone(),
                    views: Vec::new(),
                },
            )
        })
        .collect();

    for v in views {
        groups
            .entry(&v.target_dataset_key)
            .or_insert_with(|| TargetGroup {
                target_dataset_key: v.target_dataset_key.clone(),
                dataset_id: v.target_dataset_id.clone(),
                views: Vec::new(),
            })
            .views
            .push(v.view_name.clone());
    }
    groups.into_values().collect()
}

pub fn date_ranges(config: &ModuleConfig, today: Option<NaiveDate>) -> Vec<DateRangeSummary> {
    config
        .output_datasets_config
        .iter()
        .map(|(key, out)| {
            let range = DateRange::months_back(out.months_back);
            let bounds = today.map(|d| range.evaluate(d));
            DateRangeSummary {
                target_dataset_key: key.clone(),
                dataset_id: out.dataset_id.clone(),
                range,
                start_date: bounds.map(|(start, _)| start),
                end_date: bounds.map(|(_, end)| end),
            }
        })
        .collect()
}
