use clap::{Parser, Subcommand};
use docjob_client::config::ClientConfig;
use docjob_client::infrastructure::http::setup_http;
use docjob_client::infrastructure::{setup_assistant, setup_client};
use docjob_client::models::{BinaryDocument, JobId, LocalFile};
use docjob_client::services::artifact::{DEFAULT_OUTPUT_NAME, decode_artifact};
use docjob_client::services::job_api::{HttpJobApi, JobApi, JobStatus};
use docjob_client::utils::progress::ProgressObserver;
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docjob", about = "Upload documents for conversion and fetch the results")]
struct Cli {
    /// Use local development defaults (MinIO endpoint, shorter polling)
    #[arg(long, global = true)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PDF, start the conversion job and wait for the spreadsheet
    Convert {
        file: PathBuf,
        #[arg(short, long, default_value = DEFAULT_OUTPUT_NAME)]
        output: PathBuf,
        /// Storage key prefix (overrides UPLOAD_PREFIX)
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Query a started job once, or keep polling with --wait
    Status {
        job_id: String,
        #[arg(long)]
        wait: bool,
        #[arg(short, long, default_value = DEFAULT_OUTPUT_NAME)]
        output: PathBuf,
    },
    /// Send discharge summaries to the assistant
    Summarize {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask the assistant about uploaded summaries
    Ask { question: String },
    /// Send a free-form message to the chat endpoint
    Chat { message: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docjob_client=info,docjob=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = if cli.dev {
        ClientConfig::development()
    } else {
        ClientConfig::from_env()
    };

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<docjob_client::JobError>() {
                Some(job_error) => eprintln!("{}", job_error.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, mut config: ClientConfig) -> anyhow::Result<()> {
    match command {
        Command::Convert {
            file,
            output,
            prefix,
        } => {
            if let Some(prefix) = prefix {
                config.upload_prefix = prefix;
            }
            let client = setup_client(config).await?;
            let file = LocalFile::from_path(&file).await?;
            info!("📄 {} ({}, {} bytes)", file.name, file.mime_type, file.size);

            let progress: Arc<dyn ProgressObserver> =
                Arc::new(|percent: u8| info!("📶 Upload {}%", percent));
            let handle = client.submit(file, progress)?;

            let mut states = handle.subscribe();
            let cancel = handle.cancellation_token();
            tokio::spawn(async move {
                while states.changed().await.is_ok() {
                    let state = *states.borrow_and_update();
                    info!("🔄 {}", state);
                    if state.is_terminal() {
                        break;
                    }
                }
            });
            tokio::spawn(cancel_on_ctrl_c(cancel));

            let job = handle.wait().await?;
            if let Some(document) = job.result() {
                save(document, &output).await?;
            }
        }
        Command::Status {
            job_id,
            wait: false,
            output,
        } => {
            let http = setup_http(&config)?;
            let api = HttpJobApi::new(http, &config)?;
            let job_id = JobId::new(job_id);

            match api.job_status(&job_id).await? {
                JobStatus::Running => println!("{}: running", job_id),
                JobStatus::Failed(message) => println!("{}: failed ({})", job_id, message),
                JobStatus::Completed(artifact) => {
                    println!("{}: completed", job_id);
                    let document = decode_artifact(artifact, &config.artifact_mime_type)
                        .map_err(docjob_client::JobError::from)?;
                    save(&document, &output).await?;
                }
            }
        }
        Command::Status {
            job_id,
            wait: true,
            output,
        } => {
            let client = setup_client(config).await?;
            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

            let policy = client.config().poll_policy();
            let artifact = client
                .poll_until_resolved(&JobId::new(job_id), policy, cancel)
                .await
                .map_err(docjob_client::JobError::from)?;
            let document = client
                .decode_artifact(artifact)
                .map_err(docjob_client::JobError::from)?;
            save(&document, &output).await?;
        }
        Command::Summarize { files } => {
            let assistant = setup_assistant(&config)?;
            let mut documents = Vec::with_capacity(files.len());
            for path in &files {
                documents.push(LocalFile::from_path(path).await?);
            }
            let sent = assistant.upload_documents(&documents).await?;
            info!("✅ {} summaries uploaded", sent);
        }
        Command::Ask { question } => {
            let assistant = setup_assistant(&config)?;
            let answer = assistant.ask(&question).await?;
            if answer.is_empty() {
                println!("(no answer)");
            } else {
                println!("{}", answer);
            }
        }
        Command::Chat { message } => {
            let assistant = setup_assistant(&config)?;
            println!("{}", assistant.chat(&message).await?);
        }
    }

    Ok(())
}

async fn save(document: &BinaryDocument, output: &Path) -> anyhow::Result<()> {
    match document.write_to(output).await? {
        Some(path) => println!("{}", path.display()),
        None => {
            if let BinaryDocument::Reference { url } = document {
                println!("{}", url);
            }
        }
    }
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if signal::ctrl_c().await.is_ok() {
        info!("⌨️  Ctrl+C received, cancelling job...");
        cancel.cancel();
    }
}
