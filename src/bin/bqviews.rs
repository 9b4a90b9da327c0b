//! bqviews — filtered view generator CLI
//!
//! # Usage
//!
//! ```bash
//! # Check a configuration
//! bqviews validate views.toml
//!
//! # Emit the apply plan as a DDL script
//! bqviews plan views.toml --format sql
//!
//! # Start a configuration for a new client
//! bqviews init --project my-proj --client "Acme Corp" --filter account_name=acme
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bqviews::prelude::*;
use bqviews::scaffold::{self, ScaffoldOptions};
use bqviews::template::Placeholder;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bqviews")]
#[command(author = "bqviews Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate filtered warehouse views from a declarative configuration", long_about = None)]
#[command(after_help = "EXAMPLES:
    bqviews validate views.toml
    bqviews plan views.toml --format sql -o views.sql
    bqviews render views.toml analytics_raw.user_behavior
    bqviews summary views.toml --today 2026-10-19
    bqviews init --project my-proj --client 'Acme Corp' --dataset finance:36 --filter status=active,trial")]
struct Cli {
    /// Override the ambient project of the configuration
    #[arg(long, global = true, env = "BQVIEWS_PROJECT_ID")]
    project: Option<String>,

    /// Override the view name prefix
    #[arg(long, global = true, env = "BQVIEWS_VIEW_PREFIX")]
    view_prefix: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum PlanFormat {
    Json,
    Sql,
    Pretty,
}

#[derive(Clone, ValueEnum)]
enum SummaryFormat {
    Table,
    Json,
}

#[derive(Clone, ValueEnum)]
enum InitFormat {
    Tfvars,
    Toml,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate {
        /// Configuration file (.toml or .json)
        config: PathBuf,
    },
    /// Build the apply plan: datasets first, then views
    Plan {
        config: PathBuf,
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: PlanFormat,
        /// Custom SQL view template
        #[arg(short, long)]
        template: Option<PathBuf>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render the SQL of a single view
    Render {
        config: PathBuf,
        /// View key, `<source dataset>.<table>`
        view: String,
        #[arg(short, long)]
        template: Option<PathBuf>,
    },
    /// Summarise views by source dataset, target dataset and date range
    Summary {
        config: PathBuf,
        #[arg(short, long, value_enum, default_value = "table")]
        format: SummaryFormat,
        /// Evaluate date ranges against this day (YYYY-MM-DD); defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Generate a starter configuration for a client
    Init {
        /// Client name; also the output dataset key unless --dataset-key is set
        #[arg(long)]
        client: String,
        #[arg(long)]
        dataset_key: Option<String>,
        #[arg(long, default_value = "asia-northeast1")]
        region: String,
        #[arg(long, default_value_t = scaffold::DEFAULT_MONTHS_BACK)]
        months_back: u32,
        /// Additional output dataset as key[:months] (repeatable)
        #[arg(long = "dataset")]
        datasets: Vec<String>,
        /// Filter values as column=v1,v2 (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(short, long, value_enum, default_value = "tfvars")]
        format: InitFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the template placeholder reference
    Placeholders,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Validate { config } => validate_config(&cli, config),
        Commands::Plan {
            config,
            format,
            template,
            output,
        } => plan(&cli, config, format, template.as_ref(), output.as_ref()),
        Commands::Render {
            config,
            view,
            template,
        } => render_view(&cli, config, view, template.as_ref()),
        Commands::Summary {
            config,
            format,
            today,
        } => summarize(&cli, config, format, *today),
        Commands::Init {
            client,
            dataset_key,
            region,
            months_back,
            datasets,
            filters,
            format,
            output,
        } => init(
            &cli,
            InitArgs {
                client,
                dataset_key: dataset_key.as_deref(),
                region,
                months_back: *months_back,
                datasets,
                filters,
                format,
                output: output.as_ref(),
            },
        ),
        Commands::Placeholders => {
            show_placeholders();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "bqviews=debug" } else { "bqviews=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli, path: &PathBuf) -> Result<ModuleConfig> {
    let config = ModuleConfig::load(path)
        .with_context(|| format!("loading {}", path.display()))?
        .with_overrides(cli.project.clone(), cli.view_prefix.clone());
    debug!(
        project = %config.project_id,
        tables = config.table_count(),
        "configuration loaded"
    );
    Ok(config)
}

fn load_template(path: Option<&PathBuf>) -> Result<SqlTemplate> {
    match path {
        Some(p) => SqlTemplate::load(p).with_context(|| format!("loading template {}", p.display())),
        None => Ok(SqlTemplate::default()),
    }
}

fn write_output(content: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} Wrote {}", "✓".green(), path.display().to_string().cyan());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn validate_config(cli: &Cli, path: &PathBuf) -> Result<()> {
    println!("{} {}", "Checking configuration:".cyan().bold(), path.display().to_string().yellow());

    let config = load_config(cli, path)?;
    match validate(&config) {
        Ok(()) => {
            println!("{}", "✓ Configuration is valid".green().bold());
            println!("  Output datasets: {}", config.output_datasets_config.len());
            println!("  Source datasets: {}", config.source_datasets_config.len());
            println!("  Views: {}", config.table_count());
            Ok(())
        }
        Err(errors) => {
            println!("{} {} error(s)", "✗".red(), errors.len());
            println!();
            for e in &errors {
                println!("{} {}", "✗".red(), e);
            }
            anyhow::bail!("configuration is invalid")
        }
    }
}

fn plan(
    cli: &Cli,
    path: &PathBuf,
    format: &PlanFormat,
    template: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let config = load_config(cli, path)?;
    let template = load_template(template)?;
    let plan = ApplyPlan::build(&config, &template)?;

    match format {
        PlanFormat::Json => write_output(&plan.to_json()?, output),
        PlanFormat::Sql => write_output(&plan.to_ddl(), output),
        PlanFormat::Pretty => {
            print_plan(&plan);
            Ok(())
        }
    }
}

fn print_plan(plan: &ApplyPlan) {
    println!("{}", "Apply plan".cyan().bold());
    println!();

    println!("{} {}", "Datasets:".green().bold(), plan.datasets.len());
    for ds in &plan.datasets {
        println!(
            "  {} {}.{} {}",
            "+".green(),
            ds.project,
            ds.dataset_id.white().bold(),
            format!("({})", ds.location).dimmed()
        );
    }
    println!();

    println!("{} {}", "Views:".green().bold(), plan.views.len());
    for view in &plan.views {
        println!(
            "  {} {} {} {}",
            "~".yellow(),
            view.qualified_name().white(),
            "←".dimmed(),
            view.source.dimmed()
        );
    }
}

fn render_view(cli: &Cli, path: &PathBuf, key: &str, template: Option<&PathBuf>) -> Result<()> {
    let config = load_config(cli, path)?;
    let template = load_template(template)?;
    let views = resolve(&config)?;

    let view = find_view(&views, key)?;

    if cli.verbose {
        println!("{} {}", "View:".dimmed(), view.qualified_name(&config.project_id).yellow());
        println!("{} {}", "Source:".dimmed(), view.source_location().yellow());
        println!();
    }
    println!("{}", template.render(view));
    Ok(())
}

fn summarize(cli: &Cli, path: &PathBuf, format: &SummaryFormat, today: Option<NaiveDate>) -> Result<()> {
    let config = load_config(cli, path)?;
    let views = resolve(&config)?;
    let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let summary = Summary::new(&config, &views, Some(today));

    match format {
        SummaryFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        SummaryFormat::Table => {
            println!("{}", "By source dataset".cyan().bold());
            for group in &summary.by_source_dataset {
                println!(
                    "  {} {} {}",
                    group.source_dataset.white().bold(),
                    format!("[{}]", group.source_project).dimmed(),
                    group.views.len().to_string().cyan()
                );
            }
            println!();

            println!("{}", "By target dataset".cyan().bold());
            for group in &summary.by_target_dataset {
                println!(
                    "  {} {} {}",
                    group.target_dataset_key.white().bold(),
                    format!("({})", group.dataset_id).dimmed(),
                    group.views.len().to_string().cyan()
                );
                for name in &group.views {
                    println!("    • {}", name);
                }
            }
            println!();

            println!("{}", "Date ranges".cyan().bold());
            for r in &summary.date_ranges {
                let bounds = match (r.start_date, r.end_date) {
                    (Some(s), Some(e)) => format!("{} → {}", s, e),
                    _ => String::new(),
                };
                println!(
                    "  {:20} {:>3} month(s)  {}",
                    r.dataset_id.white(),
                    r.range.months_back,
                    bounds.yellow()
                );
            }
            println!();
            println!("{} view(s) total", summary.total_views.to_string().cyan());
        }
    }
    Ok(())
}

struct InitArgs<'a> {
    client: &'a str,
    dataset_key: Option<&'a str>,
    region: &'a str,
    months_back: u32,
    datasets: &'a [String],
    filters: &'a [String],
    format: &'a InitFormat,
    output: Option<&'a PathBuf>,
}

fn init(cli: &Cli, args: InitArgs<'_>) -> Result<()> {
    let project = cli
        .project
        .clone()
        .context("--project (or BQVIEWS_PROJECT_ID) is required for init")?;

    let mut filters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for raw in args.filters {
        let (column, values) = scaffold::parse_filter_arg(raw)
            .with_context(|| format!("invalid --filter '{}', expected column=v1,v2", raw))?;
        filters.entry(column).or_default().extend(values);
    }

    let extra_datasets = args
        .datasets
        .iter()
        .map(|raw| {
            scaffold::parse_dataset_arg(raw)
                .with_context(|| format!("invalid --dataset '{}', expected key[:months]", raw))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut opts = ScaffoldOptions::new(project, args.client);
    opts.region = args.region.to_string();
    opts.dataset_key = args.dataset_key.map(str::to_string);
    opts.months_back = args.months_back;
    opts.extra_datasets = extra_datasets;
    opts.filters = filters;
    if let Some(prefix) = &cli.view_prefix {
        opts.view_prefix = prefix.clone();
    }

    let config = scaffold::scaffold(&opts);
    validate(&config).map_err(ViewError::Invalid)?;

    let content = match args.format {
        InitFormat::Tfvars => scaffold::to_tfvars(&config),
        InitFormat::Toml => config.to_toml()?,
    };
    write_output(&content, args.output)
}

fn show_placeholders() {
    println!("{}", "Template placeholders".cyan().bold());
    println!();

    println!(
        "{:24} {}",
        "Placeholder".white().bold(),
        "Value".white().bold()
    );
    println!("{}", "─".repeat(72).dimmed());

    for p in Placeholder::ALL {
        let meaning = match p {
            Placeholder::SourceProject => "Project of the source table",
            Placeholder::SourceDataset => "Source dataset",
            Placeholder::SourceTable => "Source table id",
            Placeholder::FilterConditions => "Combined filter predicate (may be empty)",
            Placeholder::FilterClause => "\\n  AND (<filters>), or nothing",
            Placeholder::AdditionalWhere => "Extra predicate (may be empty)",
            Placeholder::AdditionalClause => "\\n  AND (<extra>), or nothing",
            Placeholder::StartDate => "Window start, e.g. DATE_SUB(CURRENT_DATE(), INTERVAL 18 MONTH)",
            Placeholder::EndDate => "Window end, CURRENT_DATE()",
            Placeholder::DateColumn => "Column bounded by the window",
            Placeholder::MonthsBack => "Retention in months",
            Placeholder::TargetDataset => "Output dataset id",
            Placeholder::ViewName => "Prefixed view name",
        };
        println!("{:24} {}", p.to_string().cyan().bold(), meaning.dimmed());
    }
}
