//! # bqviews — Filtered views for the warehouse
//!
//! > **Declare the filters once. Get one view per table.**
//!
//! bqviews turns a nested configuration of output datasets and source tables
//! into filtered SQL views, one per table, each bounded by the retention
//! window of the dataset it lands in.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use bqviews::prelude::*;
//!
//! let config = ModuleConfig::load("views.toml")?;
//! let plan = ApplyPlan::build(&config, &SqlTemplate::default())?;
//! println!("{}", plan.to_ddl());
//! ```
//!
//! ## Pipeline
//!
//! | Stage      | Module       | Output                         |
//! |------------|--------------|--------------------------------|
//! | Load       | `config`     | `ModuleConfig`                 |
//! | Validate   | `validator`  | every configuration error      |
//! | Resolve    | `builder`    | one `ResolvedView` per table   |
//! | Render     | `template`   | SQL body per view              |
//! | Plan       | `plan`       | datasets, then views           |

pub mod builder;
pub mod config;
pub mod date_range;
pub mod error;
pub mod plan;
pub mod predicate;
pub mod scaffold;
pub mod summary;
pub mod template;
pub mod validator;

pub mod prelude {
    pub use crate::builder::{ResolvedView, find_view, resolve};
    pub use crate::config::{
        ConfigFormat, FilterColumn, ModuleConfig, OutputDatasetSpec, SourceDatasetSpec, TableSpec,
    };
    pub use crate::date_range::DateRange;
    pub use crate::error::*;
    pub use crate::plan::{ApplyPlan, DatasetRequest, ViewRequest};
    pub use crate::predicate::{LogicalOp, combine_filters};
    pub use crate::summary::Summary;
    pub use crate::template::{SqlTemplate, ToSql};
    pub use crate::validator::{ValidationError, validate};
}

/// Validate a configuration and resolve every table into a view.
///
/// # Example
///
/// ```
/// use bqviews::config::{ConfigFormat, ModuleConfig};
///
/// let config = ModuleConfig::parse(r#"
///     project_id = "proj-a"
///     [output_datasets_config.acme]
///     dataset_id  = "acme_filtered"
///     months_back = 18
///     [source_datasets_config.analytics_raw]
///     target_dataset_key = "acme"
///     [source_datasets_config.analytics_raw.tables.user_behavior]
///     source_table_id = "user_behavior"
///     view_name       = "user_behavior"
/// "#, ConfigFormat::Toml).unwrap();
///
/// let views = bqviews::resolve(&config).unwrap();
/// assert_eq!(views[0].view_name, "filtered_user_behavior");
/// ```
pub fn resolve(config: &config::ModuleConfig) -> error::ViewResult<Vec<builder::ResolvedView>> {
    builder::resolve(config)
}
