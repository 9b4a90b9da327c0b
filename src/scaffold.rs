//! Starter configurations and `terraform.tfvars` output.
//!
//! Builds a configuration for one client from a fixed catalogue of source
//! datasets, applying global filter values to the tables that carry those
//! columns.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{FilterColumn, ModuleConfig, OutputDatasetSpec, SourceDatasetSpec, TableSpec};
use crate::predicate::LogicalOp;

pub const DEFAULT_MONTHS_BACK: u32 = 18;

/// Source datasets and their tables.
const SOURCE_CATALOGUE: &[(&str, &str, &[&str])] = &[
    (
        "raw_lake",
        "Raw data lake",
        &["users", "transactions", "events", "orders", "logs"],
    ),
    (
        "analytics_raw",
        "Raw analytics data",
        &["user_behavior", "conversion_events", "page_tracking"],
    ),
    (
        "transaction_raw",
        "Raw transaction data",
        &["payments", "refunds", "invoices"],
    ),
];

/// Which filter columns apply to which table.
const TABLE_FILTERS: &[(&str, &[&str])] = &[
    ("users", &["account_name", "user_id", "status"]),
    ("transactions", &["client_id", "status", "region"]),
    ("events", &["account_name", "user_id"]),
    ("orders", &["client_id", "status"]),
    ("logs", &["account_name", "region"]),
];

/// Filter columns a client may supply values for.
pub const GLOBAL_FILTER_COLUMNS: &[(&str, &str)] = &[
    ("account_name", "Account name filter"),
    ("client_id", "Client ID filter"),
    ("user_id", "User ID filter"),
    ("status", "Status filter (e.g., 'active', 'completed')"),
    ("region", "Region filter"),
];

/// Inputs for a starter configuration.
#[derive(Debug, Clone)]
pub struct ScaffoldOptions {
    pub project_id: String,
    pub region: String,
    pub view_prefix: String,
    pub client_name: String,
    /// Output dataset key; derived from the client name when unset.
    pub dataset_key: Option<String>,
    pub months_back: u32,
    /// Further output datasets as `(key, months_back)`. Source datasets
    /// still target the primary key.
    pub extra_datasets: Vec<(String, u32)>,
    /// Column -> accepted values.
    pub filters: BTreeMap<String, Vec<String>>,
}

impl ScaffoldOptions {
    pub fn new(project_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: crate::config::DEFAULT_REGION.to_string(),
            view_prefix: crate::config::DEFAULT_VIEW_PREFIX.to_string(),
            client_name: client_name.into(),
            dataset_key: None,
            months_back: DEFAULT_MONTHS_BACK,
            extra_datasets: Vec::new(),
            filters: BTreeMap::new(),
        }
    }
}

/// `"Acme Corp-JP"` -> `"acme_corp_jp"`
pub fn client_key(client_name: &str) -> String {
    client_name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Upper-case the first letter of every run of letters, so `acme2go_eu`
/// becomes `Acme2Go_Eu`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if upper_next {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            upper_next = false;
        } else {
            out.push(c);
            upper_next = true;
        }
    }
    out
}

/// Parse `column=v1,v2` as given on the command line.
pub fn parse_filter_arg(arg: &str) -> Option<(String, Vec<String>)> {
    let (column, values) = arg.split_once('=')?;
    let column = column.trim();
    if column.is_empty() {
        return None;
    }
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Some((column.to_string(), values))
}

/// Parse `key[:months]` as given on the command line. Months default to
/// [`DEFAULT_MONTHS_BACK`].
pub fn parse_dataset_arg(arg: &str) -> Option<(String, u32)> {
    let (key, months) = match arg.split_once(':') {
        Some((key, months)) => (key.trim(), months.trim().parse().ok()?),
        None => (arg.trim(), DEFAULT_MONTHS_BACK),
    };
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), months))
}

/// Filter columns for a catalogue table, given the global filter values.
///
/// One value becomes `= 'v'`, several become `IN ('a', 'b')`.
pub fn table_filter_columns(
    table: &str,
    filters: &BTreeMap<String, Vec<String>>,
) -> Vec<FilterColumn> {
    let applicable = TABLE_FILTERS
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, cols)| *cols)
        .unwrap_or(&[]);

    applicable
        .iter()
        .filter_map(|column| {
            let values = filters.get(*column).filter(|v| !v.is_empty())?;
            let condition = match values.as_slice() {
                [single] => format!("= '{}'", single),
                many => format!("IN ('{}')", many.join("', '")),
            };
            Some(FilterColumn::new(*column, condition).with_operator(LogicalOp::And))
        })
        .collect()
}

fn output_dataset(key: &str, client_name: &str, months_back: u32) -> OutputDatasetSpec {
    let labels = [
        ("environment", "production".to_string()),
        ("client", client_name.trim().to_lowercase().replace(' ', "_")),
        ("team", key.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    OutputDatasetSpec {
        dataset_id: format!("{}_filtered", key),
        description: format!("{} filtered views for {}", title_case(key), client_name.trim()),
        months_back,
        labels,
    }
}

/// Build a starter configuration from the source catalogue.
pub fn scaffold(opts: &ScaffoldOptions) -> ModuleConfig {
    let key = opts
        .dataset_key
        .clone()
        .unwrap_or_else(|| client_key(&opts.client_name));

    let mut config = ModuleConfig::new(opts.project_id.clone());
    config.region = opts.region.clone();
    config.view_prefix = opts.view_prefix.clone();
    config.output_datasets_config.insert(
        key.clone(),
        output_dataset(&key, &opts.client_name, opts.months_back),
    );
    for (extra, months_back) in &opts.extra_datasets {
        config.output_datasets_config.insert(
            extra.clone(),
            output_dataset(extra, &opts.client_name, *months_back),
        );
    }

    for (dataset, description, tables) in SOURCE_CATALOGUE {
        let tables: BTreeMap<String, TableSpec> = tables
            .iter()
            .map(|table| {
                let mut spec = TableSpec::new(*table, *table);
                spec.description = format!("{} filtered view", table);
                spec.filter_columns = table_filter_columns(table, &opts.filters);
                (table.to_string(), spec)
            })
            .collect();

        config.source_datasets_config.insert(
            dataset.to_string(),
            SourceDatasetSpec {
                target_dataset_key: key.clone(),
                source_project_id: None,
                description: description.to_string(),
                tables,
            },
        );
    }

    debug!(
        client = %opts.client_name,
        key = %key,
        outputs = config.output_datasets_config.len(),
        tables = config.table_count(),
        "scaffolded configuration"
    );
    config
}

/// Double-quoted HCL string. `${` and `%{` are doubled so Terraform keeps
/// them literal.
fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace("${", "$${")
        .replace("%{", "%%{");
    format!("\"{}\"", escaped)
}

/// Render a configuration as `terraform.tfvars`.
///
/// Optional fields are written only when set; an operator only when it is
/// not the default AND.
pub fn to_tfvars(config: &ModuleConfig) -> String {
    let mut lines: Vec<String> = vec![
        "# GCP Configuration".to_string(),
        format!("project_id = {}", quote(&config.project_id)),
        format!("region     = {}", quote(&config.region)),
        String::new(),
        "# View Configuration".to_string(),
        format!("view_prefix = {}", quote(&config.view_prefix)),
        String::new(),
        "# Output Datasets Configuration".to_string(),
        "output_datasets_config = {".to_string(),
    ];

    for (key, ds) in &config.output_datasets_config {
        lines.extend([
            format!("  {} = {{", quote(key)),
            format!("    dataset_id  = {}", quote(&ds.dataset_id)),
            format!("    description = {}", quote(&ds.description)),
            format!("    months_back = {}", ds.months_back),
            "    labels = {".to_string(),
        ]);
        for (k, v) in &ds.labels {
            lines.push(format!("      {} = {}", k, quote(v)));
        }
        lines.extend(["    }".to_string(), "  }".to_string(), String::new()]);
    }

    lines.extend([
        "}".to_string(),
        String::new(),
        "# Source Datasets and Tables Configuration".to_string(),
        "source_datasets_config = {".to_string(),
    ]);

    for (name, ds) in &config.source_datasets_config {
        lines.push(format!("  {} = {{", quote(name)));
        lines.push(format!("    target_dataset_key = {}", quote(&ds.target_dataset_key)));
        if let Some(project) = &ds.source_project_id {
            lines.push(format!("    source_project_id  = {}", quote(project)));
        }
        lines.push(format!("    description        = {}", quote(&ds.description)));
        lines.push("    tables = {".to_string());

        for (key, table) in &ds.tables {
            lines.extend([
                format!("      {} = {{", quote(key)),
                format!("        source_table_id = {}", quote(&table.source_table_id)),
                format!("        view_name      = {}", quote(&table.view_name)),
                "        filter_columns = [".to_string(),
            ]);
            for f in &table.filter_columns {
                lines.extend([
                    "          {".to_string(),
                    format!("            column_name = {}", quote(&f.column_name)),
                    format!("            condition   = {}", quote(&f.condition)),
                ]);
                if let Some(op) = f.operator.as_deref().filter(|op| !op.eq_ignore_ascii_case("AND")) {
                    lines.push(format!("            operator    = {}", quote(op)));
                }
                lines.push("          }".to_string());
            }
            lines.push("        ]".to_string());
            if let Some(extra) = table.extra_predicate() {
                lines.push(format!("        additional_where = {}", quote(extra)));
            }
            if !table.description.is_empty() {
                lines.push(format!("        description     = {}", quote(&table.description)));
            }
            lines.extend(["      }".to_string(), String::new()]);
        }

        lines.extend(["    }".to_string(), "  }".to_string(), String::new()]);
    }

    lines.push("}".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::resolve;

    fn filters(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_client_key() {
        assert_eq!(client_key("Acme Corp-JP"), "acme_corp_jp");
        assert_eq!(title_case("acme_corp"), "Acme_Corp");
        assert_eq!(title_case("acme2go"), "Acme2Go");
        assert_eq!(title_case("ACME 3rd-party"), "Acme 3Rd-Party");
    }

    #[test]
    fn test_parse_dataset_arg() {
        assert_eq!(parse_dataset_arg("finance:6"), Some(("finance".to_string(), 6)));
        assert_eq!(parse_dataset_arg(" analytics "), Some(("analytics".to_string(), 18)));
        assert_eq!(parse_dataset_arg("finance:six"), None);
        assert_eq!(parse_dataset_arg(":6"), None);
    }

    #[test]
    fn test_extra_output_datasets() {
        let mut opts = ScaffoldOptions::new("proj-a", "Acme Corp");
        opts.extra_datasets = vec![("analytics".to_string(), 6), ("finance".to_string(), 36)];
        let cfg = scaffold(&opts);

        assert_eq!(cfg.output_datasets_config.len(), 3);
        let finance = &cfg.output_datasets_config["finance"];
        assert_eq!(finance.dataset_id, "finance_filtered");
        assert_eq!(finance.description, "Finance filtered views for Acme Corp");
        assert_eq!(finance.months_back, 36);
        assert_eq!(finance.labels["client"], "acme_corp");
        assert_eq!(finance.labels["team"], "finance");
        assert!(
            cfg.source_datasets_config
                .values()
                .all(|ds| ds.target_dataset_key == "acme_corp")
        );

        let text = to_tfvars(&cfg);
        assert!(text.contains(
            "  \"analytics\" = {\n    dataset_id  = \"analytics_filtered\"\n    description = \"Analytics filtered views for Acme Corp\"\n    months_back = 6\n"
        ));
        assert!(text.contains("  \"finance\" = {\n    dataset_id  = \"finance_filtered\"\n"));
        assert!(text.contains("      team = \"finance\"\n"));
        assert!(resolve(&cfg).is_ok());
    }

    #[test]
    fn test_tfvars_string_escaping() {
        assert_eq!(quote(r#"a "b" \c"#), r#""a \"b\" \\c""#);
        assert_eq!(
            quote("note = '${x}'\nOR y"),
            r#""note = '$${x}'\nOR y""#
        );
        assert_eq!(quote("%{if}"), r#""%%{if}""#);
        assert_eq!(quote("$5"), r#""$5""#);

        let mut cfg = ModuleConfig::new("proj-a");
        let mut table = TableSpec::new("users", "users");
        table.additional_where = Some("note = '${x}'\nOR y".to_string());
        cfg.source_datasets_config.insert(
            "raw".to_string(),
            SourceDatasetSpec {
                target_dataset_key: "acme".to_string(),
                source_project_id: None,
                description: String::new(),
                tables: [("users".to_string(), table)].into(),
            },
        );
        let text = to_tfvars(&cfg);
        assert!(text.contains("        additional_where = \"note = '$${x}'\\nOR y\"\n"));
        assert!(text.lines().all(|line| line.matches('"').count() % 2 == 0));
    }

    #[test]
    fn test_parse_filter_arg() {
        assert_eq!(
            parse_filter_arg("status= active, trial ,"),
            Some(("status".to_string(), vec!["active".to_string(), "trial".to_string()]))
        );
        assert_eq!(parse_filter_arg("status"), None);
        assert_eq!(parse_filter_arg("=x"), None);
    }

    #[test]
    fn test_table_filter_columns() {
        let f = filters(&[("account_name", &["acme"]), ("status", &["active", "trial"])]);
        let cols = table_filter_columns("users", &f);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].column_name, "account_name");
        assert_eq!(cols[0].condition, "= 'acme'");
        assert_eq!(cols[1].condition, "IN ('active', 'trial')");

        assert!(table_filter_columns("payments", &f).is_empty());
        assert!(table_filter_columns("transactions", &filters(&[("region", &[])])).is_empty());
    }

    #[test]
    fn test_scaffold_resolves() {
        let mut opts = ScaffoldOptions::new("proj-a", "Acme Corp");
        opts.filters = filters(&[("account_name", &["acme"])]);
        let cfg = scaffold(&opts);

        let out = &cfg.output_datasets_config["acme_corp"];
        assert_eq!(out.dataset_id, "acme_corp_filtered");
        assert_eq!(out.description, "Acme_Corp filtered views for Acme Corp");
        assert_eq!(out.months_back, 18);
        assert_eq!(out.labels["client"], "acme_corp");

        assert_eq!(cfg.table_count(), 11);
        let views = resolve(&cfg).unwrap();
        assert_eq!(views.len(), 11);
        let users = views.iter().find(|v| v.key == "raw_lake.users").unwrap();
        assert_eq!(users.filter_predicate, "account_name = 'acme'");
    }

    #[test]
    fn test_tfvars_output() {
        let mut cfg = ModuleConfig::new("proj-a");
        cfg.output_datasets_config.insert(
            "acme".to_string(),
            OutputDatasetSpec {
                dataset_id: "acme_filtered".to_string(),
                description: "Acme".to_string(),
                months_back: 6,
                labels: [("team".to_string(), "acme".to_string())].into(),
            },
        );
        let mut table = TableSpec::new("users", "users");
        table.filter_columns = vec![
            FilterColumn::new("a", "= 1").with_operator(LogicalOp::And),
            FilterColumn::new("b", "= 2").with_operator(LogicalOp::Or),
        ];
        table.additional_where = Some("c IS NULL".to_string());
        cfg.source_datasets_config.insert(
            "raw".to_string(),
            SourceDatasetSpec {
                target_dataset_key: "acme".to_string(),
                source_project_id: Some("proj-b".to_string()),
                description: "Raw".to_string(),
                tables: [("users".to_string(), table)].into(),
            },
        );

        let text = to_tfvars(&cfg);
        assert!(text.starts_with("# GCP Configuration\nproject_id = \"proj-a\"\n"));
        assert!(text.contains("    months_back = 6\n"));
        assert!(text.contains("      team = \"acme\"\n"));
        assert!(text.contains("    source_project_id  = \"proj-b\"\n"));
        assert_eq!(text.matches("operator    = ").count(), 1);
        assert!(text.contains("operator    = \"OR\""));
        assert!(text.contains("        additional_where = \"c IS NULL\"\n"));
        assert!(!text.contains("        description     ="));
        assert!(text.ends_with('}'));
    }
}
