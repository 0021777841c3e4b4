//! Command-line front end for restocking decisions.
//!
//! Usage:
//!     restock --data inventory.csv summary --filter brand=A,B
//!     restock --data inventory.csv predict --strategy model --format json
//!     restock --data inventory.csv query --brand A --size M ... --available 10 --sold 50
//!     restock --data inventory.csv evaluate --algorithm random-forest

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use restock_dataset::{CsvDataset, DatasetProvider};
use restock_engine::{BatchOutcome, DecisionEngine, EngineConfig, Snapshot, Strategy};
use restock_explain::{explain_model, explain_rule, sold_by_brand, summarize, summarize_verdicts};
use restock_model::{CategoricalField, InventoryRecord, LabelRule};
use restock_predict::{evaluate, Algorithm};
use restock_query::{apply, FilterCriteria};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "restock")]
#[command(about = "Inventory restocking decisions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Inventory CSV file
    #[arg(long, global = true, default_value = "inventory.csv")]
    data: PathBuf,

    /// JSON engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Filter as field=value or field=v1,v2 (repeatable; `All` lifts it)
    #[arg(long = "filter", global = true)]
    filters: Vec<String>,

    /// Classifier for the model strategy
    #[arg(long, global = true)]
    algorithm: Option<AlgorithmArg>,

    /// Training label source
    #[arg(long, global = true)]
    label_rule: Option<LabelRuleArg>,

    /// Training seed
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    LogisticRegression,
    RandomForest,
}

#[derive(Clone, Copy, ValueEnum)]
enum LabelRuleArg {
    /// `Restock Needed` column
    RestockNeededColumn,
    /// `Target` column
    TargetColumn,
    AvailableBelowSold,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Rule,
    Model,
}

#[derive(Subcommand)]
enum Commands {
    /// Totals and sold stock by brand for the filtered table
    Summary {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Distinct values of each categorical field
    Options,

    /// Restocking verdicts for every filtered record
    Predict {
        #[arg(short, long, value_enum, default_value = "rule")]
        strategy: StrategyArg,

        /// Rule threshold override
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verdict for a hypothetical item
    Query {
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        season: Option<String>,
        #[arg(long)]
        season_month: Option<String>,

        #[arg(long)]
        available: Option<u32>,
        #[arg(long)]
        sold: Option<u32>,
        #[arg(long)]
        price: Option<f64>,

        #[arg(short, long, value_enum, default_value = "rule")]
        strategy: StrategyArg,

        /// Rule threshold override
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Hold-out accuracy of the configured classifier
    Evaluate,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("restock=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let provider = CsvDataset::new(&cli.data);
    let records = provider
        .load()
        .with_context(|| format!("loading {}", cli.data.display()))?;
    tracing::info!(provider = provider.name(), rows = records.len(), "dataset loaded");

    let snapshot = Snapshot::build(records, &config)?;
    let engine = DecisionEngine::new(&config);
    let criteria = FilterCriteria::parse(&cli.filters)?;

    match cli.command {
        Commands::Summary { format } => run_summary(&snapshot, &criteria, &format)?,
        Commands::Options => run_options(&snapshot),
        Commands::Predict {
            strategy,
            threshold,
            format,
        } => {
            let strategy = to_strategy(strategy, threshold)?;
            let outcome = engine.filter_and_decide(&snapshot, &strategy, &criteria)?;
            print_outcome(&outcome, &format)?;
        }
        Commands::Query {
            branch,
            category,
            gender,
            size,
            brand,
            season,
            season_month,
            available,
            sold,
            price,
            strategy,
            threshold,
            format,
        } => {
            let mut record = InventoryRecord::new();
            for (field, value) in [
                (CategoricalField::Branch, branch),
                (CategoricalField::Category, category),
                (CategoricalField::Gender, gender),
                (CategoricalField::Size, size),
                (CategoricalField::Brand, brand),
                (CategoricalField::Season, season),
                (CategoricalField::SeasonMonth, season_month),
            ] {
                if let Some(value) = value {
                    record.attributes.insert(field, value);
                }
            }
            record.available_stock = available;
            record.sold_stock = sold;
            record.price = price;

            let strategy = to_strategy(strategy, threshold)?;
            run_query(&engine, &snapshot, &strategy, &record, config.threshold, &format)?;
        }
        Commands::Evaluate => {
            let report = evaluate(snapshot.records(), snapshot.codec(), &config.training)?;
            println!("Algorithm: {}", report.algorithm.as_str());
            println!(
                "Rows: {} train / {} test ({} excluded)",
                report.train_rows, report.test_rows, report.excluded_rows
            );
            println!("Accuracy:  {:.3}", report.accuracy);
            println!("Precision: {:.3}", report.precision);
            println!("Recall:    {:.3}", report.recall);

            if let Ok(model) = snapshot.model() {
                let spec = model.spec();
                let features: Vec<_> = spec.features.iter().map(|f| f.name()).collect();
                println!(
                    "\nServing model: {} on {} rows (seed {}, {} v{})",
                    model.algorithm().as_str(),
                    model.training_rows(),
                    model.seed(),
                    spec.name,
                    spec.version
                );
                println!("Features: {}", features.join(", "));
            }
        }
    }

    Ok(())
}

/// Config file (if any) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Some(algorithm) = cli.algorithm {
        config.training.algorithm = match algorithm {
            AlgorithmArg::LogisticRegression => Algorithm::LogisticRegression,
            AlgorithmArg::RandomForest => Algorithm::RandomForest,
        };
    }
    if let Some(rule) = cli.label_rule {
        config.training.label_rule = match rule {
            LabelRuleArg::RestockNeededColumn => LabelRule::RestockNeededColumn,
            LabelRuleArg::TargetColumn => LabelRule::TargetColumn,
            LabelRuleArg::AvailableBelowSold => LabelRule::AvailableBelowSold,
        };
    }
    if let Some(seed) = cli.seed {
        config.training.seed = seed;
    }

    Ok(config)
}

fn to_strategy(arg: StrategyArg, threshold: Option<u32>) -> Result<Strategy> {
    match (arg, threshold) {
        (StrategyArg::Rule, threshold) => Ok(Strategy::RuleBased { threshold }),
        (StrategyArg::Model, None) => Ok(Strategy::TrainedClassifier),
        (StrategyArg::Model, Some(_)) => {
            bail!("--threshold only applies to the rule strategy")
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn label(record: &InventoryRecord, field: CategoricalField) -> &str {
    record.attribute(field).unwrap_or("-")
}

fn run_summary(snapshot: &Snapshot, criteria: &FilterCriteria, format: &str) -> Result<()> {
    let subset = apply(snapshot.records(), criteria);
    let summary = summarize(&subset);
    let by_brand = sold_by_brand(&subset);

    if format == "json" {
        return print_json(&serde_json::json!({
            "summary": summary,
            "sold_by_brand": by_brand,
        }));
    }

    println!("Total Products:  {}", summary.total_products);
    println!("Total Available: {}", summary.total_available);
    println!("Total Sold:      {}", summary.total_sold);
    println!("Average Price:   {:.2}", summary.average_price);

    if by_brand.is_empty() {
        println!("\nNo data available for the selected filters.");
        return Ok(());
    }
    println!("\nSold Stock by Brand:");
    for entry in by_brand {
        println!("  {:<24} {}", entry.brand, entry.sold);
    }
    Ok(())
}

fn run_options(snapshot: &Snapshot) {
    for table in snapshot.codec().tables() {
        let field = table.field();
        if table.is_empty() {
            continue;
        }
        println!("{} ({}): All, {}", field.column(), field, table.values().join(", "));
    }
}

fn print_outcome(outcome: &BatchOutcome, format: &str) -> Result<()> {
    if format == "json" {
        return print_json(outcome);
    }

    for (i, item) in outcome.verdicts.iter().enumerate() {
        let record = &item.record;
        println!(
            "{}. {} | {} | {} | {} | {}",
            i + 1,
            label(record, CategoricalField::Branch),
            label(record, CategoricalField::Brand),
            label(record, CategoricalField::Category),
            label(record, CategoricalField::Gender),
            label(record, CategoricalField::Size),
        );
        println!(
            "   Available: {} | Sold: {} | {} ({} units)",
            record.available_stock.unwrap_or_default(),
            record.sold_stock.map_or_else(|| "-".to_string(), |s| s.to_string()),
            item.verdict.status.label(),
            item.verdict.quantity
        );
    }

    for skipped in &outcome.skipped {
        println!("Skipped row {}: missing {}", skipped.index + 1, skipped.field);
    }

    println!("\n---");
    let verdicts: Vec<_> = outcome.verdicts.iter().map(|v| v.verdict).collect();
    println!("{}", summarize_verdicts(&verdicts));
    Ok(())
}

fn run_query(
    engine: &DecisionEngine,
    snapshot: &Snapshot,
    strategy: &Strategy,
    record: &InventoryRecord,
    default_threshold: u32,
    format: &str,
) -> Result<()> {
    let decision = engine.decide(snapshot, strategy, record)?;

    let explanation = match (strategy, decision.probability) {
        (Strategy::TrainedClassifier, Some(p)) => explain_model(record, &decision.verdict, p),
        (Strategy::RuleBased { threshold }, _) => {
            explain_rule(record, &decision.verdict, threshold.unwrap_or(default_threshold))
        }
        (Strategy::TrainedClassifier, None) => {
            explain_rule(record, &decision.verdict, default_threshold)
        }
    };

    if format == "json" {
        return print_json(&serde_json::json!({
            "decision": decision,
            "explanation": explanation,
        }));
    }

    println!("{}: {} units", explanation.summary, decision.verdict.quantity);
    println!("{}", explanation.detail);

    if !decision.matches.is_empty() {
        println!("\nMatching items in the table:");
        for m in &decision.matches {
            println!(
                "  {} | {} | price {}",
                label(m, CategoricalField::Branch),
                label(m, CategoricalField::Brand),
                m.price.map_or_else(|| "-".to_string(), |p| format!("{:.2}", p))
            );
        }
    }
    Ok(())
}
