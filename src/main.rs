use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chunkgo::api::ChunkGoApi;
use chunkgo::batch::{
    BatchAction, JobWatch, TriggerOutcome, WatchOutcome, poll_batch_task, trigger_batch,
};
use chunkgo::config::AppConfig;
use chunkgo::delete::{BatchDeleteOutcome, DeleteOutcome, delete_document, delete_documents};
use chunkgo::dify::{ConnectOutcome, connect};
use chunkgo::document::{
    ChunkSubmitOutcome, ChunkWatch, ChunkWatchOutcome, DocumentContext, load_strategies,
    submit_document_chunk, watch_document_chunk,
};
use chunkgo::fs_tree::{LocalFile, collect_files};
use chunkgo::http::HttpClient;
use chunkgo::models::{BatchKind, JobState};
use chunkgo::poller::{PollHandle, TokioSleeper};
use chunkgo::upload::{file_extension, upload_single, upload_to_folder};
use chunkgo::terminal::{
    NoRows, TerminalChunkView, TerminalControl, TerminalPage, TerminalPanel, TerminalUploadView,
};
use chunkgo::validation::ChunkForm;

#[derive(Debug, Parser)]
#[command(name = "chunkgo", version, about = "Upload, chunk and push documents on a ChunkGo server")]
struct Cli {
    /// Config file, instead of the first of chunkgo.toml, config.toml and
    /// ~/.config/chunkgo/config.toml that exists.
    #[arg(long, global = true, env = "CHUNKGO_CONFIG")]
    config: Option<PathBuf>,
    /// Server address, e.g. http://127.0.0.1:8410.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Answer yes to every confirmation.
    #[arg(short = 'y', long, global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload files and directories into a folder.
    Upload {
        folder_id: i64,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Upload a single document outside any folder.
    UploadOne { path: PathBuf },
    /// Chunk the selected documents of a folder, or all chunkable ones.
    Chunk {
        folder_id: i64,
        #[arg(long = "doc")]
        docs: Vec<i64>,
        #[arg(long)]
        strategy: String,
        #[arg(long)]
        size: String,
        #[arg(long)]
        overlap: String,
        /// Follow the task until it finishes.
        #[arg(long)]
        wait: bool,
    },
    /// Push the selected documents of a folder, or all chunked ones, to Dify.
    Push {
        folder_id: i64,
        #[arg(long = "doc")]
        docs: Vec<i64>,
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        wait: bool,
    },
    /// Show a batch task, or follow it with --wait.
    Task {
        task_id: String,
        #[arg(long)]
        wait: bool,
    },
    /// Chunk one document and follow the job.
    ChunkDoc {
        doc_id: i64,
        #[arg(long)]
        strategy: String,
        #[arg(long)]
        size: String,
        #[arg(long)]
        overlap: String,
    },
    /// Delete documents.
    Delete {
        #[arg(required = true)]
        doc_ids: Vec<i64>,
    },
    /// Test the Dify connection and list knowledge bases.
    Dify,
    /// List the chunking strategies for a file extension.
    Strategies { ext: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if cli.yes {
        config.assume_yes = true;
    }

    let client = HttpClient::from_config(&config)?;
    info!("using server {}", config.base_url);
    let page = TerminalPage::new(config.assume_yes);
    let sleeper = TokioSleeper;

    match cli.command {
        Command::Upload { folder_id, paths } => {
            let files = collect_files(&paths)
                .await
                .context("failed collecting files to upload")?;
            let report = upload_to_folder(
                &client,
                &page,
                &sleeper,
                &TerminalUploadView::default(),
                client.endpoints(),
                folder_id,
                files,
            )
            .await?;
            for doc in &report.success {
                let id = doc.id.map(|id| id.to_string()).unwrap_or_default();
                println!("ok\t{id}\t{}", doc.filename);
            }
            for failed in &report.failed {
                println!("failed\t{}\t{}", failed.filename, failed.reason);
            }
            if !report.failed.is_empty() {
                bail!("{} file(s) were rejected", report.failed.len());
            }
        }
        Command::UploadOne { path } => {
            let metadata = tokio::fs::metadata(&path)
                .await
                .with_context(|| format!("failed reading {}", path.display()))?;
            if !metadata.is_file() {
                bail!("{} is not a file", path.display());
            }
            let file = LocalFile {
                relative: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path.clone(),
            };
            upload_single(
                &client,
                &page,
                &sleeper,
                &TerminalUploadView::default(),
                client.endpoints(),
                &config.allowed_extensions(),
                file,
            )
            .await?;
            info!("uploaded {}", path.display());
        }
        Command::Chunk {
            folder_id,
            docs,
            strategy,
            size,
            overlap,
            wait,
        } => {
            let action = BatchAction::Chunk(ChunkForm::new(strategy, size, overlap));
            run_batch(&client, &page, &config, folder_id, docs, &action, wait).await?;
        }
        Command::Push {
            folder_id,
            docs,
            dataset,
            wait,
        } => {
            let action = BatchAction::Push {
                dataset_id: dataset,
            };
            run_batch(&client, &page, &config, folder_id, docs, &action, wait).await?;
        }
        Command::Task { task_id, wait } => {
            if wait {
                let watch = JobWatch::new(BatchKind::Chunk, task_id)
                    .interval(config.task_poll_interval());
                cancel_on_ctrl_c(watch.handle());
                let outcome =
                    poll_batch_task(&client, &page, &sleeper, &TerminalControl, watch).await;
                finish_watch(outcome)?;
            } else {
                let status = client.task_status(&task_id).await?;
                println!(
                    "{}\t{}\t{}/{}\t{} failed",
                    status.status.as_str(),
                    status.name,
                    status.success_count,
                    status.total_count,
                    status.error_count
                );
            }
        }
        Command::ChunkDoc {
            doc_id,
            strategy,
            size,
            overlap,
        } => {
            let document = DocumentContext {
                id: doc_id,
                filename: String::new(),
                status: None,
            };
            let view = TerminalChunkView;
            let form = ChunkForm::new(strategy, size, overlap);
            match submit_document_chunk(&client, &page, &view, &document, &form).await {
                ChunkSubmitOutcome::Processing => {
                    let watch = ChunkWatch::submitted(doc_id).interval(config.chunk_poll_interval());
                    cancel_on_ctrl_c(watch.handle());
                    match watch_document_chunk(&client, &page, &sleeper, &view, watch).await {
                        ChunkWatchOutcome::Completed => info!("document {doc_id} chunked"),
                        ChunkWatchOutcome::Failed(message) => {
                            bail!("chunking failed: {}", message.unwrap_or_else(|| "未知错误".into()))
                        }
                        ChunkWatchOutcome::Cancelled => bail!("stopped following the chunk job"),
                    }
                }
                ChunkSubmitOutcome::Done => info!("document {doc_id} chunked"),
                ChunkSubmitOutcome::Invalid(err) => bail!("{err}"),
                ChunkSubmitOutcome::Declined => bail!("cancelled"),
                ChunkSubmitOutcome::Failed(message) => bail!("{message}"),
            }
        }
        Command::Delete { doc_ids } => {
            if let [doc_id] = doc_ids.as_slice() {
                match delete_document(&client, &page, &NoRows, *doc_id, &doc_id.to_string()).await {
                    DeleteOutcome::Deleted => {}
                    DeleteOutcome::Declined => bail!("cancelled"),
                    DeleteOutcome::Refused(message) => bail!("{message}"),
                    DeleteOutcome::Unreachable(err) => return Err(err.into()),
                }
            } else {
                match delete_documents(&client, &page, &NoRows, doc_ids).await {
                    BatchDeleteOutcome::Finished(report) => {
                        for (doc_id, reason) in &report.failed {
                            println!("failed\t{doc_id}\t{reason}");
                        }
                        if !report.failed.is_empty() {
                            bail!("{} document(s) could not be deleted", report.failed.len());
                        }
                    }
                    BatchDeleteOutcome::Declined => bail!("cancelled"),
                    BatchDeleteOutcome::NothingSelected => bail!("no documents given"),
                }
            }
        }
        Command::Dify => match connect(&client, &page, &TerminalPanel).await {
            ConnectOutcome::Connected(_) => {}
            ConnectOutcome::Rejected(message) => bail!("dify connection failed: {message}"),
            ConnectOutcome::NoKnowledgeBases => bail!("no knowledge bases found"),
            ConnectOutcome::Unreachable(err) => return Err(err.into()),
        },
        Command::Strategies { ext } => {
            let ext = file_extension(&format!("x.{}", ext.trim_start_matches('.')))
                .ok_or_else(|| anyhow!("invalid file extension {ext:?}"))?;
            let Some(choice) = load_strategies(&client, &page, &ext).await? else {
                bail!("no strategies for {ext}");
            };
            for strategy in &choice.strategies {
                println!("{}\t{}", strategy.name, strategy.display_name);
            }
            if let Some(hint) = choice.hint {
                info!("{hint}");
            }
        }
    }

    Ok(())
}

async fn run_batch(
    client: &HttpClient,
    page: &TerminalPage,
    config: &AppConfig,
    folder_id: i64,
    docs: Vec<i64>,
    action: &BatchAction,
    wait: bool,
) -> Result<()> {
    let kind = action.kind();
    match trigger_batch(client, page, &TerminalControl, folder_id, docs, action).await {
        TriggerOutcome::Started { task_id } => {
            println!("{task_id}");
            if wait {
                let watch = JobWatch::new(kind, task_id).interval(config.task_poll_interval());
                cancel_on_ctrl_c(watch.handle());
                finish_watch(
                    poll_batch_task(client, page, &TokioSleeper, &TerminalControl, watch).await,
                )?;
            }
            Ok(())
        }
        TriggerOutcome::Invalid(err) => bail!("{err}"),
        TriggerOutcome::Declined => bail!("cancelled"),
        TriggerOutcome::Refused { message } => bail!("{message}"),
        TriggerOutcome::Unreachable(err) => Err(err.into()),
    }
}

fn finish_watch(outcome: WatchOutcome) -> Result<()> {
    match outcome {
        WatchOutcome::Finished(status) if status.status == JobState::Completed => Ok(()),
        WatchOutcome::Finished(status) => bail!(
            "task {} failed: {} succeeded, {} failed",
            status.name,
            status.success_count,
            status.error_count
        ),
        WatchOutcome::Aborted(err) => Err(err).context("lost track of the task"),
        WatchOutcome::Cancelled | WatchOutcome::Reloaded => bail!("stopped following the task"),
    }
}

/// The running poll stops at its next tick; the job itself keeps running on
/// the server.
fn cancel_on_ctrl_c(handle: PollHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, no longer following the job");
            handle.cancel();
        }
    });
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
