use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chat_core::{
    document_key, read_pdf_batch, ChatCompletionsClient, ChatModelConfig, ChatPipeline,
    ChatSession, CharacterNgramEmbedder, ChunkingConfig, IngestionReport, MemoryIndex,
    ObjectStore, QdrantIndex, S3Config, S3ObjectStore, VectorIndex, DEFAULT_EMBEDDING_DIMENSIONS,
    DOCUMENT_PREFIX, PDF_CONTENT_TYPE,
};
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector index backend.
    #[arg(long, value_enum, default_value_t = IndexBackend::Memory)]
    index: IndexBackend,

    /// Qdrant base URL (used with --index qdrant).
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection name.
    #[arg(long, default_value = "pdf_chat_chunks")]
    qdrant_collection: String,

    /// Maximum chunk length in characters.
    #[arg(long, default_value = "100")]
    chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, default_value = "30")]
    chunk_overlap: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexBackend {
    /// Ephemeral in-process index, discarded when the process exits.
    Memory,
    /// Persistent named collection in a Qdrant instance.
    Qdrant,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest PDFs and chat with them interactively.
    Chat {
        /// Folder of PDFs to ingest. Without it, documents are imported
        /// from object storage instead.
        #[arg(long)]
        folder: Option<String>,
    },
    /// Ingest PDFs and ask a single question.
    Ask {
        /// Folder that contains PDFs, searched recursively.
        #[arg(long)]
        folder: String,
        /// The question to answer from the documents.
        #[arg(long)]
        question: String,
    },
    /// Upload a folder of PDFs to object storage under documents/.
    Upload {
        #[arg(long)]
        folder: String,
    },
    /// Rebuild the index from the documents in object storage. Pair with
    /// --index qdrant for an index that outlives the process.
    Import,
    /// List documents currently in object storage.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match &cli.command {
        Command::Chat { folder } => {
            let pipeline = build_pipeline(&cli)?;
            let mut session = ChatSession::new();

            let report = match folder {
                Some(folder) => {
                    let batch = read_pdf_batch(Path::new(folder))?;
                    pipeline.ingest(&mut session, &batch).await?
                }
                None => {
                    let store = S3ObjectStore::new(S3Config::from_env()?);
                    pipeline.import_stored(&mut session, &store).await?
                }
            };
            print_ingestion_report(&report);

            run_chat_loop(&pipeline, &mut session).await?;
        }
        Command::Ask { folder, question } => {
            let pipeline = build_pipeline(&cli)?;
            let mut session = ChatSession::new();

            let batch = read_pdf_batch(Path::new(folder))?;
            let report = pipeline.ingest(&mut session, &batch).await?;
            print_ingestion_report(&report);

            let response = pipeline.query(&mut session, question).await;
            println!("{response}");
        }
        Command::Upload { folder } => {
            let store = S3ObjectStore::new(S3Config::from_env()?);
            let batch = read_pdf_batch(Path::new(folder))?;

            let mut uploaded = 0usize;
            for file in &batch {
                let key = document_key(&file.name);
                match store.put(&key, &file.bytes, PDF_CONTENT_TYPE).await {
                    Ok(()) => {
                        uploaded += 1;
                        println!("uploaded {key}");
                    }
                    Err(error) => warn!(file = %file.name, %error, "upload failed"),
                }
            }
            println!(
                "{uploaded}/{} file(s) uploaded at {}",
                batch.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Import => {
            let pipeline = build_pipeline(&cli)?;
            let mut session = ChatSession::new();

            let store = S3ObjectStore::new(S3Config::from_env()?);
            let report = pipeline.import_stored(&mut session, &store).await?;
            print_ingestion_report(&report);
        }
        Command::List => {
            let store = S3ObjectStore::new(S3Config::from_env()?);
            let objects = store.list(DOCUMENT_PREFIX).await?;

            if objects.is_empty() {
                println!("no stored documents");
            }
            for object in objects {
                println!(
                    "{}  {} bytes  {}",
                    object.key,
                    object.size,
                    object.last_modified.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

fn build_index(cli: &Cli) -> Box<dyn VectorIndex> {
    match cli.index {
        IndexBackend::Memory => Box::new(MemoryIndex::new()),
        IndexBackend::Qdrant => Box::new(QdrantIndex::new(
            &cli.qdrant_url,
            &cli.qdrant_collection,
            DEFAULT_EMBEDDING_DIMENSIONS,
        )),
    }
}

fn build_pipeline(
    cli: &Cli,
) -> anyhow::Result<ChatPipeline<CharacterNgramEmbedder, ChatCompletionsClient>> {
    let model = ChatCompletionsClient::new(ChatModelConfig::from_env()?)?;
    let chunking = ChunkingConfig {
        chunk_size: cli.chunk_size,
        overlap: cli.chunk_overlap,
    };
    chunking.validate()?;

    Ok(
        ChatPipeline::new(build_index(cli), CharacterNgramEmbedder::default(), model)
            .with_chunking(chunking),
    )
}

fn print_ingestion_report(report: &IngestionReport) {
    for failure in &report.failed {
        warn!(file = %failure.filename, reason = %failure.error, "skipped file");
    }
    println!(
        "{} file(s) ingested, {} skipped, {} chunk(s) indexed",
        report.ingested.len(),
        report.failed.len(),
        report.indexed_chunks
    );
}

async fn run_chat_loop(
    pipeline: &ChatPipeline<CharacterNgramEmbedder, ChatCompletionsClient>,
    session: &mut ChatSession,
) -> anyhow::Result<()> {
    println!("{}", session.messages[0].content);
    println!("(/reset clears the conversation, /quit exits)");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/reset" => {
                pipeline.reset(session).await?;
                println!("{}", session.messages[0].content);
                continue;
            }
            _ => {}
        }

        let response = pipeline.query(session, input).await;
        println!("assistant> {response}");
    }

    Ok(())
}
