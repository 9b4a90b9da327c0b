//! Configuration validator and fuzzy matching suggestions.
//!
//! Runs before any view is resolved so that a broken cross reference is
//! reported up front instead of surfacing as a failed lookup later.

use std::collections::BTreeMap;

use strsim::levenshtein;
use tracing::debug;

use crate::config::ModuleConfig;

/// Validation error with structured information.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A source dataset points at an output dataset key that does not exist.
    UnknownTargetDataset {
        source_dataset: String,
        target: String,
        suggestion: Option<String>,
    },
    /// A filter operator other than AND/OR.
    MalformedOperator {
        view: String,
        index: usize,
        operator: String,
    },
    /// Two tables would produce the same view in the same dataset.
    DuplicateViewName {
        target_dataset: String,
        view_name: String,
        first: String,
        second: String,
    },
    /// Two output keys share one dataset id.
    DuplicateDatasetId {
        dataset_id: String,
        first: String,
        second: String,
    },
    /// A required identifier is empty.
    EmptyField { location: String, field: &'static str },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnknownTargetDataset {
                source_dataset,
                target,
                suggestion,
            } => {
                if let Some(s) = suggestion {
                    write!(
                        f,
                        "Source dataset '{}' targets unknown output dataset '{}'. Did you mean '{}'?",
                        source_dataset, target, s
                    )
                } else {
                    write!(
                        f,
                        "Source dataset '{}' targets unknown output dataset '{}'.",
                        source_dataset, target
                    )
                }
            }
            ValidationError::MalformedOperator {
                view,
                index,
                operator,
            } => write!(
                f,
                "Filter #{} of '{}' has operator '{}'; expected AND or OR",
                index, view, operator
            ),
            ValidationError::DuplicateViewName {
                target_dataset,
                view_name,
                first,
                second,
            } => write!(
                f,
                "View '{}.{}' is produced by both '{}' and '{}'",
                target_dataset, view_name, first, second
            ),
            ValidationError::DuplicateDatasetId {
                dataset_id,
                first,
                second,
            } => write!(
                f,
                "Dataset id '{}' is used by both output datasets '{}' and '{}'",
                dataset_id, first, second
            ),
            ValidationError::EmptyField { location, field } => {
                write!(f, "'{}' must not be empty in {}", field, location)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result of validation
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a whole configuration, collecting every error found.
pub fn validate(config: &ModuleConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.project_id.trim().is_empty() {
        errors.push(ValidationError::EmptyField {
            location: "the module configuration".to_string(),
            field: "project_id",
        });
    }

    let mut dataset_ids: BTreeMap<&str, &str> = BTreeMap::new();
    for (key, out) in &config.output_datasets_config {
        if out.dataset_id.trim().is_empty() {
            errors.push(ValidationError::EmptyField {
                location: format!("output dataset '{}'", key),
                field: "dataset_id",
            });
            continue;
        }
        if let Some(first) = dataset_ids.insert(&out.dataset_id, key) {
            errors.push(ValidationError::DuplicateDatasetId {
                dataset_id: out.dataset_id.clone(),
                first: first.to_string(),
                second: key.clone(),
            });
        }
    }

    let output_keys: Vec<&str> = config
        .output_datasets_config
        .keys()
        .map(String::as_str)
        .collect();

    // (target key, final view name) -> view key that claimed it first
    let mut claimed: BTreeMap<(String, String), String> = BTreeMap::new();

    for (ds_key, ds) in &config.source_datasets_config {
        let target_known = config
            .output_datasets_config
            .contains_key(&ds.target_dataset_key);
        if !target_known {
            errors.push(ValidationError::UnknownTargetDataset {
                source_dataset: ds_key.clone(),
                target: ds.target_dataset_key.clone(),
                suggestion: did_you_mean(&ds.target_dataset_key, &output_keys),
            });
        }

        for (table_key, table) in &ds.tables {
            let view_key = format!("{}.{}", ds_key, table_key);

            if table.source_table_id.trim().is_empty() {
                errors.push(ValidationError::EmptyField {
                    location: format!("table '{}'", view_key),
                    field: "source_table_id",
                });
            }
            if table.view_name.trim().is_empty() {
                errors.push(ValidationError::EmptyField {
                    location: format!("table '{}'", view_key),
                    field: "view_name",
                });
            }

            for (i, filter) in table.filter_columns.iter().enumerate() {
                if filter.column_name.trim().is_empty() {
                    errors.push(ValidationError::EmptyField {
                        location: format!("filter #{} of '{}'", i, view_key),
                        field: "column_name",
                    });
                }
                if filter.logical_op().is_err() {
                    errors.push(ValidationError::MalformedOperator {
                        view: view_key.clone(),
                        index: i,
                        operator: filter.operator.clone().unwrap_or_default(),
                    });
                }
            }

            if !target_known {
                continue;
            }
            let final_name = format!("{}{}", config.view_prefix, table.view_name);
            let target_id = config.output_datasets_config[&ds.target_dataset_key]
                .dataset_id
                .clone();
            match claimed.get(&(ds.target_dataset_key.clone(), final_name.clone())) {
                Some(first) => errors.push(ValidationError::DuplicateViewName {
                    target_dataset: target_id,
                    view_name: final_name,
                    first: first.clone(),
                    second: view_key,
                }),
                None => {
                    claimed.insert((ds.target_dataset_key.clone(), final_name), view_key);
                }
            }
        }
    }

    debug!(errors = errors.len(), "validated configuration");

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Find the closest match using Levenshtein distance.
fn did_you_mean(input: &str, candidates: &[&str]) -> Option<String> {
    let mut best_match = None;
    let mut min_dist = usize::MAX;

    for cand in candidates {
        let dist = levenshtein(input, cand);
        if dist < min_dist && dist <= 3 {
            min_dist = dist;
            best_match = Some(cand.to_string());
        }
    }

    best_match
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterColumn, OutputDatasetSpec, SourceDatasetSpec, TableSpec};

    fn output(id: &str) -> OutputDatasetSpec {
        OutputDatasetSpec {
            dataset_id: id.to_string(),
            description: String::new(),
            months_back: 18,
            labels: Default::default(),
        }
    }

    fn source(target: &str, tables: &[(&str, TableSpec)]) -> SourceDatasetSpec {
        SourceDatasetSpec {
            target_dataset_key: target.to_string(),
            source_project_id: None,
            description: String::new(),
            tables: tables
                .iter()
                .map(|(k, t)| (k.to_string(), t.clone()))
                .collect(),
        }
    }

    fn base() -> ModuleConfig {
        let mut cfg = ModuleConfig::new("proj-a");
        cfg.output_datasets_config
            .insert("analytics".to_string(), output("analytics_filtered"));
        cfg
    }

    #[test]
    fn test_valid_config() {
        let mut cfg = base();
        cfg.source_datasets_config.insert(
            "raw".to_string(),
            source("analytics", &[("users", TableSpec::new("users", "users"))]),
        );
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_unknown_target_with_suggestion() {
        let mut cfg = base();
        cfg.source_datasets_config.insert(
            "raw".to_string(),
            source("analytic", &[("users", TableSpec::new("users", "users"))]),
        );
        let errors = validate(&cfg).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnknownTargetDataset {
                source_dataset: "raw".to_string(),
                target: "analytic".to_string(),
                suggestion: Some("analytics".to_string()),
            }]
        );
        assert!(errors[0].to_string().contains("Did you mean 'analytics'?"));
    }

    #[test]
    fn test_unknown_target_without_suggestion() {
        let mut cfg = base();
        cfg.source_datasets_config
            .insert("raw".to_string(), source("finance", &[]));
        let errors = validate(&cfg).unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::UnknownTargetDataset { suggestion: None, .. }
        ));
    }

    #[test]
    fn test_malformed_operator() {
        let mut table = TableSpec::new("users", "users");
        table.filter_columns.push(FilterColumn::new("a", "= 1"));
        let mut bad = FilterColumn::new("b", "= 2");
        bad.operator = Some("XOR".to_string());
        table.filter_columns.push(bad);

        let mut cfg = base();
        cfg.source_datasets_config
            .insert("raw".to_string(), source("analytics", &[("users", table)]));
        let errors = validate(&cfg).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::MalformedOperator {
                view: "raw.users".to_string(),
                index: 1,
                operator: "XOR".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicate_view_across_source_datasets() {
        let mut cfg = base();
        cfg.source_datasets_config.insert(
            "lake_a".to_string(),
            source("analytics", &[("users", TableSpec::new("users", "users"))]),
        );
        cfg.source_datasets_config.insert(
            "lake_b".to_string(),
            source("analytics", &[("people", TableSpec::new("people", "users"))]),
        );
        let errors = validate(&cfg).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateViewName {
                target_dataset: "analytics_filtered".to_string(),
                view_name: "filtered_users".to_string(),
                first: "lake_a.users".to_string(),
                second: "lake_b.people".to_string(),
            }]
        );
    }

    #[test]
    fn test_same_view_name_in_different_targets_is_fine() {
        let mut cfg = base();
        cfg.output_datasets_config
            .insert("finance".to_string(), output("finance_filtered"));
        cfg.source_datasets_config.insert(
            "lake_a".to_string(),
            source("analytics", &[("users", TableSpec::new("users", "users"))]),
        );
        cfg.source_datasets_config.insert(
            "lake_b".to_string(),
            source("finance", &[("users", TableSpec::new("users", "users"))]),
        );
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_duplicate_dataset_id_and_empty_fields_collected() {
        let mut cfg = base();
        cfg.project_id = String::new();
        cfg.output_datasets_config
            .insert("copy".to_string(), output("analytics_filtered"));
        cfg.source_datasets_config.insert(
            "raw".to_string(),
            source("analytics", &[("users", TableSpec::new("", "users"))]),
        );
        let errors = validate(&cfg).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::EmptyField { field: "project_id", .. }
        )));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::DuplicateDatasetId { first, second, .. }
                if first == "analytics" && second == "copy"
        )));
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::EmptyField { field: "source_table_id", .. }
        )));
    }
}
