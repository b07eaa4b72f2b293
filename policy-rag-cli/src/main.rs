use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use policy_rag::{
    ApiCredential, LoadOutcome, LocalVectorStore, OpenAIChatModel, OpenAIEmbeddingProvider,
    RagConfig, RagPipeline,
};
use policy_rag_cli::{Console, Session, telemetry, write_answer, write_sources};

/// Ask questions about insurance policy documents.
///
/// With no flags, starts an interactive session.
#[derive(Debug, Parser)]
#[command(name = "policy-rag", version, about)]
struct Cli {
    /// Build or extend the index from the document directory.
    #[arg(long, conflicts_with = "query")]
    ingest: bool,

    /// Answer one question and exit.
    #[arg(long, value_name = "QUESTION")]
    query: Option<String>,

    /// Directory scanned for *.pdf and *.txt files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory holding the vector index.
    #[arg(long)]
    persist_dir: Option<PathBuf>,

    /// Number of chunks retrieved per question.
    #[arg(long)]
    top_k: Option<usize>,

    /// Maximum chunk size in characters.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Maximum overlap between consecutive chunks in characters.
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Log at info level unless RUST_LOG is set.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> Result<RagConfig> {
        let mut builder = RagConfig::from_env()?.into_builder();
        if let Some(dir) = &self.data_dir {
            builder = builder.data_dir(dir);
        }
        if let Some(dir) = &self.persist_dir {
            builder = builder.persist_dir(dir);
        }
        if let Some(k) = self.top_k {
            builder = builder.top_k(k);
        }
        if let Some(size) = self.chunk_size {
            builder = builder.chunk_size(size);
        }
        if let Some(overlap) = self.chunk_overlap {
            builder = builder.chunk_overlap(overlap);
        }
        Ok(builder.build()?)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    if let Err(e) = telemetry::init(cli.verbose) {
        eprintln!("warning: logging disabled: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config().context("Invalid configuration")?;
    let credential = ApiCredential::from_env().context("Missing API credential")?;
    let pipeline = build_pipeline(config, &credential).await.context("Error starting up")?;

    // A blank --query counts as no query and opens the interactive session.
    let question = cli.query.as_deref().filter(|q| !q.trim().is_empty());
    if cli.ingest {
        ingest(&pipeline).await.context("Error during ingestion")
    } else if let Some(question) = question {
        query(&pipeline, question).await.context("Error processing query")
    } else {
        let mut session = Session::new(Console::new()?, io::stdout());
        session.run(&pipeline).await?;
        Ok(())
    }
}

async fn build_pipeline(config: RagConfig, credential: &ApiCredential) -> Result<RagPipeline> {
    let store = LocalVectorStore::open(&config.persist_dir).await?;
    let embedder = OpenAIEmbeddingProvider::from_config(&config, credential)?;
    let model = OpenAIChatModel::from_config(&config, credential)?;

    Ok(RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .vector_store(Arc::new(store))
        .language_model(Arc::new(model))
        .build()?)
}

async fn ingest(pipeline: &RagPipeline) -> Result<()> {
    println!("Loading documents...");
    let LoadOutcome { documents, skipped } = pipeline.load_documents()?;
    for file in &skipped {
        println!("Skipped {}: {}", file.path.display(), file.reason);
    }

    println!("Processing {} documents...", documents.len());
    println!("Creating vector store...");
    let report = pipeline.ingest_documents(&documents).await?;

    println!("Ingestion complete!");
    println!(
        "{} chunks from {} documents written to {} ({} files skipped)",
        report.chunks,
        report.documents,
        pipeline.config().persist_dir.display(),
        skipped.len()
    );
    Ok(())
}

async fn query(pipeline: &RagPipeline, question: &str) -> Result<()> {
    let result = pipeline.query(question).await?;
    let mut out = io::stdout().lock();
    write_answer(&mut out, &result)?;
    write_sources(&mut out, &result)?;
    out.flush()?;
    Ok(())
}
