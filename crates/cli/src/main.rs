//! datacurate CLI
//!
//! Dataset curation tool: deduplication, quality filtering, ratio
//! balancing, validation and stratified splitting

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datacurate_core::{
    BalanceConfig, CurationPipeline, DedupConfig, Deduplicator, FilterConfig, PipelineConfig,
    QualityFilter, RatioBalancer, SplitConfig, StratifiedSplitter, ValidationConfig,
    ValidationEngine,
};
use datacurate_formats::export::{export_splits, write_json_report, ExportFormat};
use datacurate_formats::jsonl::{read_records, write_records, JsonlReader};
use datacurate_formats::Record;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "datacurate")]
#[command(version, about = "Dataset curation and balancing pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output reports in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full curation pipeline
    Curate {
        /// Input file (JSONL, optionally gzipped)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for curated records
        #[arg(short, long)]
        output: PathBuf,

        /// Pipeline config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for train/validation/test files when splitting is enabled
        #[arg(long)]
        split_dir: Option<PathBuf>,

        /// Split file format
        #[arg(long, default_value = "jsonl")]
        format: ExportFormat,

        /// Write the full pipeline report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Show statistics without writing output
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove duplicate records
    Dedup {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Dedup config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use the strict preset (near-duplicate detection enabled)
        #[arg(long, conflicts_with = "config")]
        strict: bool,

        /// Show statistics without writing output
        #[arg(long)]
        dry_run: bool,

        /// Only show statistics, don't deduplicate
        #[arg(long)]
        stats_only: bool,
    },

    /// Apply the weighted quality filter
    Filter {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Filter config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show statistics without writing output
        #[arg(long)]
        dry_run: bool,
    },

    /// Balance category ratios toward configured targets
    Balance {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Balance config file with target ratios (YAML or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Show statistics without writing output
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate and grade a dataset
    Validate {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Validation config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the full validation report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Split a dataset into train/validation/test files
    Split {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the split files
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Split config file (YAML or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Split file format
        #[arg(long, default_value = "jsonl")]
        format: ExportFormat,
    },

    /// Inspect the first records of a dataset file
    Inspect {
        /// Path to the dataset file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Number of records to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Write a fully-populated sample pipeline config
    InitConfig {
        /// Destination path (.yaml, .yml or .toml)
        #[arg(value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(!cli.json)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Curate {
            input,
            output,
            config,
            split_dir,
            format,
            report,
            dry_run,
        } => curate(input, output, config, split_dir, format, report, dry_run, cli.json),
        Commands::Dedup {
            input,
            output,
            config,
            strict,
            dry_run,
            stats_only,
        } => dedup(input, output, config, strict, dry_run, stats_only, cli.json),
        Commands::Filter {
            input,
            output,
            config,
            dry_run,
        } => filter(input, output, config, dry_run, cli.json),
        Commands::Balance {
            input,
            output,
            config,
            dry_run,
        } => balance(input, output, config, dry_run, cli.json),
        Commands::Validate {
            input,
            config,
            report,
        } => validate(input, config, report, cli.json),
        Commands::Split {
            input,
            output_dir,
            config,
            format,
        } => split(input, output_dir, config, format, cli.json),
        Commands::Inspect { input, limit } => inspect(input, limit),
        Commands::InitConfig { output } => init_config(output),
    }
}

/// Read records and report any ingest issues before processing
fn load_input(input: &Path) -> Result<Vec<Record>> {
    let (records, issues) = read_records(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    if !issues.is_empty() {
        warn!("{} ingest issues in {}", issues.len(), input.display());
        for issue in issues.iter().take(5) {
            warn!("  [{}] {}", issue.record_id, issue.message);
        }
    }
    info!("Loaded {} records from {}", records.len(), input.display());
    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn curate(
    input: PathBuf,
    output: PathBuf,
    config_path: Option<PathBuf>,
    split_dir: Option<PathBuf>,
    format: ExportFormat,
    report_path: Option<PathBuf>,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    info!("Running curation pipeline");
    info!("  Input: {:?}", input);
    info!("  Output: {:?}", output);

    let pipeline_config = config::load_pipeline_config(config_path.as_deref())?;
    let has_split = pipeline_config.split.is_some();
    let pipeline = CurationPipeline::new(pipeline_config)?;

    let records = load_input(&input)?;
    let outcome = pipeline.run(&records)?;

    if !dry_run {
        write_records(&outcome.records, &output)
            .with_context(|| format!("Failed to write output: {}", output.display()))?;

        if let (Some(dir), Some(split)) = (&split_dir, &outcome.split) {
            let paths = export_splits(&split.train, &split.validation, &split.test, dir, format)?;
            for (name, path) in &paths {
                info!("  {} split: {:?}", name, path);
            }
        } else if has_split && split_dir.is_none() {
            warn!("Pipeline produced a split but no --split-dir was given; splits not written");
        }
    }

    if let Some(path) = &report_path {
        write_json_report(&outcome, path)?;
        info!("Report written to {:?}", path);
    }

    if json_output {
        let report = serde_json::json!({
            "input": input.to_string_lossy(),
            "output": if dry_run { serde_json::Value::Null } else { serde_json::Value::String(output.to_string_lossy().into_owned()) },
            "input_records": records.len(),
            "curated_records": outcome.records.len(),
            "stages": outcome.stage_counts,
            "duplicates_removed": outcome.dedup.removed_ids.len(),
            "rejected": outcome.filter_stats.rejected,
            "validation_score": outcome.validation.validation_score,
            "quality_grade": outcome.validation.quality_grade,
            "is_valid": outcome.validation.is_valid,
            "dry_run": dry_run,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Curation complete: {} -> {} records", records.len(), outcome.records.len());
        for stage in &outcome.stage_counts {
            println!("  {}: {} -> {}", stage.stage, stage.input, stage.output);
        }
        println!(
            "Validation: {} (score {:.3}, grade {})",
            if outcome.validation.is_valid { "PASSED" } else { "FAILED" },
            outcome.validation.validation_score,
            outcome.validation.quality_grade
        );
    }

    Ok(())
}

fn dedup(
    input: PathBuf,
    output: PathBuf,
    config_path: Option<PathBuf>,
    strict: bool,
    dry_run: bool,
    stats_only: bool,
    json_output: bool,
) -> Result<()> {
    info!("Starting deduplication");
    info!("  Input: {:?}", input);
    if !stats_only {
        info!("  Output: {:?}", output);
    }

    let config = if strict {
        DedupConfig::strict()
    } else {
        config::load_stage_config::<DedupConfig>(config_path.as_deref())?
    };
    let deduplicator = Deduplicator::new(config)?;

    let records = load_input(&input)?;
    let result = deduplicator.deduplicate(&records);

    if !dry_run && !stats_only {
        write_records(&result.unique, &output)
            .with_context(|| format!("Failed to write output: {}", output.display()))?;
    }

    if json_output {
        let report = serde_json::json!({
            "input": input.to_string_lossy(),
            "total_records": result.original_count,
            "unique_records": result.unique_count,
            "duplicates_removed": result.removed_ids.len(),
            "deduplication_rate": result.dedup_rate() * 100.0,
            "duplicate_groups": result.duplicate_groups.len(),
            "skipped_short": result.skipped_short,
            "dry_run": dry_run,
            "stats_only": stats_only,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Deduplication: {} -> {} records ({} removed, {:.1}% duplicate rate)",
            result.original_count,
            result.unique_count,
            result.removed_ids.len(),
            result.dedup_rate() * 100.0
        );
    }

    Ok(())
}

fn filter(
    input: PathBuf,
    output: PathBuf,
    config_path: Option<PathBuf>,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    info!("Applying quality filter");
    info!("  Input: {:?}", input);
    info!("  Output: {:?}", output);

    let config = config::load_stage_config::<FilterConfig>(config_path.as_deref())?;
    let quality_filter = QualityFilter::new(config)?;

    let records = load_input(&input)?;
    let (surviving, _decisions, stats) = quality_filter.filter_dataset(&records);

    if !dry_run {
        write_records(&surviving, &output)
            .with_context(|| format!("Failed to write output: {}", output.display()))?;
    }

    if json_output {
        let report = serde_json::json!({
            "input": input.to_string_lossy(),
            "total_records": stats.total,
            "accepted": stats.accepted,
            "review": stats.review,
            "rejected": stats.rejected,
            "acceptance_rate": stats.acceptance_rate() * 100.0,
            "dry_run": dry_run,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Filtering: {} -> {} records (accepted {}, review {}, rejected {})",
            stats.total,
            surviving.len(),
            stats.accepted,
            stats.review,
            stats.rejected
        );
    }

    Ok(())
}

fn balance(
    input: PathBuf,
    output: PathBuf,
    config_path: PathBuf,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    info!("Balancing category ratios");
    info!("  Input: {:?}", input);
    info!("  Config: {:?}", config_path);

    let config: BalanceConfig = config::load(&config_path)?;
    let balancer = RatioBalancer::new(config)?;

    let records = load_input(&input)?;
    let result = balancer.balance(&records);

    if !dry_run {
        write_records(&result.records, &output)
            .with_context(|| format!("Failed to write output: {}", output.display()))?;
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Balancing: {} -> {} records in {} iterations ({} added, {} removed)",
            records.len(),
            result.records.len(),
            result.iterations,
            result.added_ids.len(),
            result.removed_ids.len()
        );
        println!(
            "Max deviation: {:.3} ({})",
            result.report.max_deviation,
            if result.report.within_tolerance { "within tolerance" } else { "OUT OF TOLERANCE" }
        );
        for conflict in &result.conflicts {
            println!("  Conflict: {conflict}");
        }
    }

    Ok(())
}

fn validate(
    input: PathBuf,
    config_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    json_output: bool,
) -> Result<()> {
    info!("Validating dataset");
    info!("  Input: {:?}", input);

    let config = config::load_stage_config::<ValidationConfig>(config_path.as_deref())?;
    let engine = ValidationEngine::new(config)?;

    let records = load_input(&input)?;
    let dataset_name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let result = engine.validate_dataset(&records, &dataset_name);

    if let Some(path) = &report_path {
        write_json_report(&result, path)?;
        info!("Report written to {:?}", path);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.summary());
    }

    // A failing dataset fails the command, for use in CI gates
    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn split(
    input: PathBuf,
    output_dir: PathBuf,
    config_path: Option<PathBuf>,
    format: ExportFormat,
    json_output: bool,
) -> Result<()> {
    info!("Splitting dataset");
    info!("  Input: {:?}", input);
    info!("  Output directory: {:?}", output_dir);

    let config = config::load_stage_config::<SplitConfig>(config_path.as_deref())?;
    let splitter = StratifiedSplitter::new(config)?;

    let records = load_input(&input)?;
    let result = splitter.split(&records)?;

    let paths = export_splits(
        &result.train,
        &result.validation,
        &result.test,
        &output_dir,
        format,
    )?;

    if json_output {
        let report = serde_json::json!({
            "input": input.to_string_lossy(),
            "train": result.train_count,
            "validation": result.validation_count,
            "test": result.test_count,
            "seed": result.seed,
            "strata": result.strata_count,
            "metrics": result.metrics,
            "files": paths,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Split: {} train / {} validation / {} test (seed {})",
            result.train_count, result.validation_count, result.test_count, result.seed
        );
        println!(
            "Split quality: {:.3} (size {:.3}, category {:.3}, quality {:.3})",
            result.metrics.overall_quality_score,
            result.metrics.size_balance_score,
            result.metrics.category_balance_score,
            result.metrics.quality_balance_score
        );
        for (name, path) in &paths {
            println!("  {name}: {}", path.display());
        }
    }

    Ok(())
}

fn inspect(input: PathBuf, limit: usize) -> Result<()> {
    info!("Inspecting dataset: {:?}", input);

    let mut reader = JsonlReader::open(&input)?;
    let mut count = 0;

    while let Some(raw) = reader.next_raw()? {
        let (record, issues) = Record::from_raw(raw, count);
        println!("Record #{count}: {}", serde_json::to_string_pretty(&record)?);
        for issue in issues {
            println!("  issue: {}", issue.message);
        }

        count += 1;
        if count >= limit {
            break;
        }
    }

    info!(
        "Processed {} lines ({} skipped)",
        reader.lines_processed(),
        reader.skipped_lines()
    );

    Ok(())
}

fn init_config(output: PathBuf) -> Result<()> {
    let sample = config::sample_pipeline_config();
    config::save(&sample, &output)?;
    println!("Sample pipeline config written to {}", output.display());
    Ok(())
}
