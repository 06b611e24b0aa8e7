//! Attache CLI - terminal front end for the compose attachment manager
//!
//! Stands in for the browser compose form: accepts files in the order they
//! are given, uploads them concurrently, renders per-entry progress, and
//! prints the reconciled attachment identifier list that a compose form
//! would carry in its hidden field.

use std::collections::HashMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use attache_core::api::ComposeApiClient;
use attache_core::render::{AttachmentListView, RenderOp};
use attache_core::uploader::ComposeUploader;
use attache_core::{
    AttachmentEntry, AttachmentFile, FormState, LocalAttachmentId, RemoteAttachmentId, UploadState,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "attache")]
#[command(about = "Upload message attachments from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Compose API base URL (falls back to ATTACHE_API_BASE_URL)
    #[arg(long, value_name = "URL", global = true)]
    api_base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files as draft attachments
    Upload {
        /// Files to attach, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output a JSON summary instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Ask the server to discard an uploaded attachment
    Remove {
        /// Server-assigned attachment identifier
        id: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] attache_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Path has no usable file name: {0}")]
    UnusableFileName(String),
    #[error("Compose API base URL is not configured. Pass --api-base-url or set ATTACHE_API_BASE_URL.")]
    MissingApiBaseUrl,
    #[error("{failed} of {total} attachments failed to upload")]
    UploadsFailed { failed: usize, total: usize },
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("attache=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let base_url = resolve_api_base_url(cli.api_base_url)?;
    let client = ComposeApiClient::new(base_url)?;

    match cli.command {
        Commands::Upload { files, json } => run_upload(client, &files, json).await,
        Commands::Remove { id } => run_remove(&client, &id).await,
    }
}

fn resolve_api_base_url(flag: Option<String>) -> Result<String, CliError> {
    flag.or_else(|| env::var("ATTACHE_API_BASE_URL").ok())
        .filter(|url| !url.trim().is_empty())
        .ok_or(CliError::MissingApiBaseUrl)
}

async fn run_upload(
    client: ComposeApiClient,
    paths: &[PathBuf],
    as_json: bool,
) -> Result<(), CliError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_attachment_file(path)?);
    }

    let mut uploader = ComposeUploader::new(Arc::new(client), TerminalView::new(!as_json));
    uploader.attach_all(files);
    uploader.run_until_settled().await;

    let entries = uploader.entries();
    if as_json {
        let items: Vec<UploadReportItem> = entries.iter().map(UploadReportItem::from_entry).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    }

    let failed = entries.iter().filter(|entry| entry.state.is_failed()).count();
    if failed > 0 {
        return Err(CliError::UploadsFailed {
            failed,
            total: entries.len(),
        });
    }

    if !as_json {
        println!("{}", uploader.form_state().attachment_ids);
    }
    Ok(())
}

async fn run_remove(client: &ComposeApiClient, id: &str) -> Result<(), CliError> {
    let remote_id = RemoteAttachmentId::new(id)?;
    client.remove(&remote_id).await?;
    println!("removed {remote_id}");
    Ok(())
}

fn read_attachment_file(path: &Path) -> Result<AttachmentFile, CliError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToString::to_string)
        .ok_or_else(|| CliError::UnusableFileName(path.display().to_string()))?;
    let mime_type = mime_guess::from_path(path).first_raw().map(str::to_string);
    let bytes = std::fs::read(path)?;
    Ok(AttachmentFile::new(filename, mime_type, bytes)?)
}

/// Renders attachment list writes as terminal lines.
struct TerminalView {
    verbose: bool,
    filenames: HashMap<LocalAttachmentId, String>,
}

impl TerminalView {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            filenames: HashMap::new(),
        }
    }

    fn filename(&self, id: LocalAttachmentId) -> &str {
        self.filenames.get(&id).map_or("<unknown>", String::as_str)
    }
}

impl AttachmentListView for TerminalView {
    fn render(&mut self, op: &RenderOp) {
        match op {
            RenderOp::EntryAdded {
                id,
                filename,
                size_label,
            } => {
                self.filenames.insert(*id, filename.clone());
                if self.verbose {
                    println!("attaching {filename} ({size_label})");
                }
            }
            RenderOp::EntryProgress { id, percent } => {
                tracing::debug!("{}: {percent}%", self.filename(*id));
            }
            RenderOp::EntryCompleted { id } => {
                if self.verbose {
                    println!("uploaded {}", self.filename(*id));
                }
            }
            RenderOp::EntryFailed { id, error_text } => {
                eprintln!("{}: {error_text}", self.filename(*id));
            }
            RenderOp::EntryRemoved { id } => {
                self.filenames.remove(id);
            }
        }
    }

    fn sync_form(&mut self, form: &FormState) {
        tracing::debug!(
            "form reconciled: send_enabled={} attachment_ids={:?}",
            form.send_enabled,
            form.attachment_ids
        );
    }
}

#[derive(Debug, Serialize)]
struct UploadReportItem {
    filename: String,
    size_bytes: u64,
    status: &'static str,
    remote_id: Option<String>,
    error: Option<String>,
}

impl UploadReportItem {
    fn from_entry(entry: &AttachmentEntry) -> Self {
        let (status, remote_id, error) = match &entry.state {
            UploadState::Uploading { .. } => ("uploading", None, None),
            UploadState::Completed { remote_id } => ("completed", Some(remote_id.to_string()), None),
            UploadState::Failed { message } => ("failed", None, Some(message.clone())),
        };
        Self {
            filename: entry.file.filename.clone(),
            size_bytes: entry.file.size_bytes(),
            status,
            remote_id,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn resolve_api_base_url_prefers_flag() {
        let url = resolve_api_base_url(Some("https://mail.example.com".to_string())).unwrap();
        assert_eq!(url, "https://mail.example.com");
    }

    #[test]
    fn resolve_api_base_url_rejects_blank_flag() {
        assert!(matches!(
            resolve_api_base_url(Some("   ".to_string())),
            Err(CliError::MissingApiBaseUrl)
        ));
    }

    #[test]
    fn read_attachment_file_captures_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"hello").unwrap();

        let attachment = read_attachment_file(&path).unwrap();
        assert_eq!(attachment.filename, "notes.txt");
        assert_eq!(attachment.size_bytes(), 5);
        assert_eq!(attachment.mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn report_item_maps_entry_states() {
        let entry = AttachmentEntry {
            id: LocalAttachmentId::new(),
            file: AttachmentFile::new("a.txt", None, vec![0; 3]).unwrap(),
            state: UploadState::Failed {
                message: "too large".to_string(),
            },
        };
        let item = UploadReportItem::from_entry(&entry);
        assert_eq!(item.status, "failed");
        assert_eq!(item.error.as_deref(), Some("too large"));
        assert_eq!(item.remote_id, None);
        assert_eq!(item.size_bytes, 3);
    }
}
