mod ledger;

use chrono::Utc;
use clap::{Parser, Subcommand};
use ledger::{DirSummarySink, FileQueryLog, FileStatusStore};
use std::path::PathBuf;
use std::time::Duration;
use tender_search_core::{
    load_folder_uploads, load_upload, CharacterNgramEmbedder, DocumentUpload, EnrichmentConfig,
    EnrichmentOutcome, EnrichmentPipeline, IngestError, OcrConfig, OpenAiBackend, OpenAiConfig,
    PdfTextExtractor, SearchConfig, SearchCoordinator, Summarizer, SummarizerConfig,
    WeaviateStore,
};
use tender_search_core::traits::DocumentStore;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tender-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Weaviate base URL
    #[arg(long, default_value = "http://localhost:8080")]
    weaviate_url: String,

    /// Weaviate class holding document records
    #[arg(long, default_value = "TenderDocument")]
    weaviate_class: String,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = "https://api.openai.com/v1")]
    llm_url: String,

    /// API key for the LLM backend
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    llm_api_key: String,

    /// Chat model used for summarization and answers
    #[arg(long, default_value = "gpt-3.5-turbo")]
    llm_model: String,

    /// OCR service endpoint for scanned documents
    #[arg(long, env = "OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// API key for the OCR service
    #[arg(long, env = "OCR_API_KEY")]
    ocr_api_key: Option<String>,

    /// Directory for the status ledger, query cache, and summary artifacts
    #[arg(long, default_value = ".tender-search")]
    data_dir: PathBuf,

    /// Timeout for each external call, in seconds
    #[arg(long, default_value = "60")]
    call_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Enrich a single PDF or every PDF under a folder.
    Enrich {
        /// One PDF to enrich.
        #[arg(long, conflicts_with = "folder")]
        file: Option<PathBuf>,
        /// Folder searched recursively for PDFs.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Character cap on text sent to the summarizer.
        #[arg(long, default_value = "12000")]
        truncate_chars: usize,
    },
    /// Ask a question over the enriched corpus.
    Search {
        /// Natural-language question.
        #[arg(long)]
        question: String,
        /// Party the question is logged under.
        #[arg(long, default_value = "cli")]
        asked_by: String,
        /// Passages retrieved on a cache miss.
        #[arg(long, default_value = "2")]
        top_k: usize,
        /// Cosine threshold for reusing a cached answer.
        #[arg(long, default_value = "0.8")]
        similarity_threshold: f32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.data_dir)?;

    let call_timeout = Duration::from_secs(cli.call_timeout_secs);
    let embedder = CharacterNgramEmbedder::default();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "tender-search boot"
    );

    match cli.command {
        Command::Enrich {
            file,
            folder,
            truncate_chars,
        } => {
            let uploads = collect_uploads(file, folder)?;

            let store = WeaviateStore::new(&cli.weaviate_url, &cli.weaviate_class, embedder)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            if let Err(error) = store.ensure_schema().await {
                warn!(error = %error, "schema bootstrap failed; enrichment will retry per document");
            }

            let llm = OpenAiBackend::new(OpenAiConfig {
                endpoint: cli.llm_url.clone(),
                api_key: cli.llm_api_key.clone(),
                model: cli.llm_model.clone(),
            });
            let summarizer = Summarizer::new(
                llm,
                SummarizerConfig {
                    model: cli.llm_model.clone(),
                    max_prompt_chars: truncate_chars,
                    ..SummarizerConfig::default()
                },
            );
            let extractor = PdfTextExtractor::new(cli.ocr_endpoint.clone().map(|endpoint| {
                OcrConfig {
                    endpoint,
                    api_key: cli.ocr_api_key.clone(),
                    timeout: call_timeout,
                }
            }));
            let status = FileStatusStore::open(cli.data_dir.join("ledger.json"))?;
            let sink = DirSummarySink::open(cli.data_dir.join("summaries"))?;

            let pipeline = EnrichmentPipeline::new(
                store,
                summarizer,
                status,
                sink,
                extractor,
                EnrichmentConfig { call_timeout },
            );

            for upload in uploads {
                let upload = match upload {
                    Ok(upload) => upload,
                    Err(error) => {
                        warn!(reason = %error, "skipped unreadable file");
                        continue;
                    }
                };

                let file_name = upload.file_name.clone();
                let outcome = pipeline
                    .enrich(&upload)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                report_outcome(&file_name, &outcome);
            }
        }
        Command::Search {
            question,
            asked_by,
            top_k,
            similarity_threshold,
        } => {
            let store = WeaviateStore::new(&cli.weaviate_url, &cli.weaviate_class, embedder)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let llm = OpenAiBackend::new(OpenAiConfig {
                endpoint: cli.llm_url.clone(),
                api_key: cli.llm_api_key.clone(),
                model: cli.llm_model.clone(),
            });
            let log = FileQueryLog::open(
                cli.data_dir.join("query_cache.jsonl"),
                cli.data_dir.join("searches.jsonl"),
            );

            let coordinator = SearchCoordinator::new(
                store,
                llm,
                log,
                embedder,
                SearchConfig {
                    similarity_threshold,
                    top_k,
                    call_timeout,
                    ..SearchConfig::default()
                },
            );

            let answer = coordinator
                .search(&question, &asked_by)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if answer.cached {
                println!(
                    "answer (cached, similarity {:.3}):",
                    answer.similarity.unwrap_or(0.0)
                );
            } else {
                println!("answer (freshly generated):");
            }
            println!("{}", answer.response);
            for source in &answer.sources {
                println!("  source: {source}");
            }
        }
    }

    Ok(())
}

fn collect_uploads(
    file: Option<PathBuf>,
    folder: Option<PathBuf>,
) -> anyhow::Result<Vec<Result<DocumentUpload, IngestError>>> {
    match (file, folder) {
        (Some(file), None) => Ok(vec![load_upload(&file)]),
        (None, Some(folder)) => {
            load_folder_uploads(&folder).map_err(|error| anyhow::anyhow!(error.to_string()))
        }
        _ => anyhow::bail!("pass exactly one of --file or --folder"),
    }
}

fn report_outcome(file_name: &str, outcome: &EnrichmentOutcome) {
    match outcome {
        EnrichmentOutcome::Processed { record_id } => {
            println!("processed \"{file_name}\" (record {record_id})");
        }
        EnrichmentOutcome::AlreadyProcessed => {
            println!("\"{file_name}\" is already processed");
        }
        EnrichmentOutcome::AlreadyInFlight => {
            println!("\"{file_name}\" is currently being processed");
        }
        EnrichmentOutcome::DuplicateRejected => {
            println!("rejected \"{file_name}\": a file with identical content was already uploaded");
        }
        EnrichmentOutcome::Failed { reason } => {
            println!("failed to process \"{file_name}\": {reason}");
        }
    }
}
