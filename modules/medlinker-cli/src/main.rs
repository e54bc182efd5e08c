use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use medlinker_common::{Config, JsonlTraceSink};
use medlinker_engine::{
    aggregate_regions, dataset, verify_facility, CapabilityExtractor, HeuristicExtractor,
    LlmExtractor,
};

#[derive(Parser)]
#[command(name = "medlinker", about = "Grounded verification of facility capability records")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a single facility document (JSON file)
    Verify {
        /// Path to a RawDocument JSON file
        input: PathBuf,
    },
    /// Verify a whole dataset and aggregate regions
    RunDataset {
        /// Path to a documents JSONL file
        input: PathBuf,
        /// Where to write facility analyses (JSONL)
        #[arg(long, default_value = "outputs/facilities.jsonl")]
        facilities_out: PathBuf,
        /// Where to write region summaries (JSONL)
        #[arg(long, default_value = "outputs/regions.jsonl")]
        regions_out: PathBuf,
        /// Process at most this many documents
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Aggregate existing facility analyses into region summaries
    Aggregate {
        /// Path to a facilities JSONL file
        input: PathBuf,
    },
    /// Ask a planner question over pipeline outputs
    Ask {
        question: String,
        #[arg(long, default_value = "outputs/facilities.jsonl")]
        facilities: PathBuf,
        #[arg(long, default_value = "outputs/regions.jsonl")]
        regions: PathBuf,
    },
    /// Inspect persisted traces
    Trace {
        #[command(subcommand)]
        command: TraceCommand,
    },
}

#[derive(Subcommand)]
enum TraceCommand {
    /// Print one trace run by id
    Show { trace_id: String },
    /// List recent trace ids, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn build_extractor(config: &Config) -> Box<dyn CapabilityExtractor> {
    if config.has_llm_extractor() {
        let url = config.extractor_api_url.as_deref().unwrap_or_default();
        let key = config.extractor_api_key.as_deref().unwrap_or_default();
        tracing::info!(model = %config.extractor_model, "Using LLM extractor");
        Box::new(LlmExtractor::new(url, key, &config.extractor_model))
    } else {
        tracing::info!("No extractor endpoint configured, using heuristic extractor");
        Box::new(HeuristicExtractor)
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let sink = JsonlTraceSink::new(config.trace_path.clone());

    match cli.command {
        Command::Verify { input } => {
            let doc = dataset::load_document(&input)?;
            let extractor = build_extractor(&config);
            let analysis = verify_facility(&doc, extractor.as_ref(), &sink).await?;
            print_json(&analysis)?;
        }
        Command::RunDataset {
            input,
            facilities_out,
            regions_out,
            limit,
        } => {
            let mut documents = dataset::load_documents(&input)?;
            if let Some(limit) = limit {
                documents.truncate(limit);
            }
            tracing::info!(documents = documents.len(), "Verifying dataset");

            let extractor = build_extractor(&config);
            let mut analyses = Vec::with_capacity(documents.len());
            for doc in &documents {
                let analysis = verify_facility(doc, extractor.as_ref(), &sink).await?;
                tracing::info!(
                    facility_id = %analysis.facility_id,
                    status = %analysis.status,
                    confidence = %analysis.confidence,
                    "Verified facility"
                );
                analyses.push(analysis);
            }

            let summaries = aggregate_regions(&analyses, &sink)?;
            dataset::write_facilities(&facilities_out, &analyses)?;
            dataset::write_regions(&regions_out, &summaries)?;
            tracing::info!(
                facilities = analyses.len(),
                regions = summaries.len(),
                "Dataset run complete"
            );
        }
        Command::Aggregate { input } => {
            let analyses = dataset::load_facilities(&input)?;
            let summaries = aggregate_regions(&analyses, &sink)?;
            print_json(&summaries)?;
        }
        Command::Ask {
            question,
            facilities,
            regions,
        } => {
            let facilities = dataset::load_facilities(&facilities)?;
            let regions = dataset::load_regions(&regions)?;
            let answer = medlinker_engine::qa::answer_question_with_k(
                &question,
                &facilities,
                &regions,
                None,
                &sink,
                config.retrieval_k,
            )?;
            print_json(&answer)?;
        }
        Command::Trace { command } => match command {
            TraceCommand::Show { trace_id } => {
                let run = sink
                    .read_run(&trace_id)?
                    .with_context(|| format!("no trace found with id {trace_id}"))?;
                print_json(&run)?;
            }
            TraceCommand::List { limit } => {
                for trace_id in sink.list_recent(limit)? {
                    println!("{trace_id}");
                }
            }
        },
    }

    Ok(())
}
