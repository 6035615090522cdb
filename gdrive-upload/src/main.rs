use std::path::PathBuf;

use anyhow::Context;
use gdrive_core::{DriveClient, FileList, FileMetadata, OAuthClient, UploadClient};
use gdrive_upload::config::UploadConfig;
use gdrive_upload::token_provider::{Authenticator, StaticToken, TokenProvider};
use gdrive_upload::upload::{ResumableUpload, UploadEvent, UploadRequest};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
struct UploadArgs {
    path: PathBuf,
    name: Option<String>,
    parent: Option<String>,
    mime: Option<String>,
    retries: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Upload(UploadArgs),
    ListFiles,
    ListFolders,
    Mkdir(String),
    Help,
}

fn parse_cli_command<I>(args: I) -> anyhow::Result<CliCommand>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(CliCommand::Help);
    };
    match command.as_str() {
        "--help" | "-h" | "help" => Ok(CliCommand::Help),
        "list-files" => Ok(CliCommand::ListFiles),
        "list-folders" => Ok(CliCommand::ListFolders),
        "mkdir" => {
            let name = args.next().context("mkdir requires a folder name")?;
            Ok(CliCommand::Mkdir(name))
        }
        "upload" => {
            let mut path = None;
            let mut upload = UploadArgs {
                path: PathBuf::new(),
                name: None,
                parent: None,
                mime: None,
                retries: None,
            };
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--name" => upload.name = Some(flag_value(&mut args, "--name")?),
                    "--parent" => upload.parent = Some(flag_value(&mut args, "--parent")?),
                    "--mime" => upload.mime = Some(flag_value(&mut args, "--mime")?),
                    "--retries" => {
                        let value = flag_value(&mut args, "--retries")?;
                        let retries = value
                            .parse::<i64>()
                            .with_context(|| format!("invalid --retries value: {value}"))?;
                        upload.retries = Some(retries);
                    }
                    other if other.starts_with("--") => anyhow::bail!("unknown argument: {other}"),
                    other if path.is_none() => path = Some(PathBuf::from(other)),
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }
            upload.path = path.context("upload requires a file path")?;
            Ok(CliCommand::Upload(upload))
        }
        other => anyhow::bail!("unknown command: {other}"),
    }
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next().with_context(|| format!("{flag} requires a value"))
}

fn print_help() {
    println!("Usage: gdrive-upload <command>");
    println!("  upload <path> [--name N] [--parent ID] [--mime TYPE] [--retries N]");
    println!("                 Resumable upload; negative --retries retries forever");
    println!("  list-files     List up to 50 files");
    println!("  list-folders   List up to 50 folders");
    println!("  mkdir <name>   Create a folder");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = parse_cli_command(std::env::args())?;
    if command == CliCommand::Help {
        print_help();
        return Ok(());
    }

    let config = UploadConfig::from_env();
    let token = resolve_token().await?;
    match command {
        CliCommand::Upload(args) => upload(&config, token, args).await,
        CliCommand::ListFiles => {
            let client = DriveClient::with_base_url(&config.api_base, token)?;
            print_files(&client.list_files().await?);
            Ok(())
        }
        CliCommand::ListFolders => {
            let client = DriveClient::with_base_url(&config.api_base, token)?;
            print_files(&client.list_folders().await?);
            Ok(())
        }
        CliCommand::Mkdir(name) => {
            let client = DriveClient::with_base_url(&config.api_base, token)?;
            let folder = client.create_folder(&name).await?;
            println!("{}", folder.id);
            Ok(())
        }
        CliCommand::Help => Ok(()),
    }
}

async fn upload(config: &UploadConfig, token: String, args: UploadArgs) -> anyhow::Result<()> {
    let file_size = tokio::fs::metadata(&args.path)
        .await
        .with_context(|| format!("cannot stat {}", args.path.display()))?
        .len();
    let name = match args.name {
        Some(name) => name,
        None => args
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("cannot derive a file name, pass --name")?,
    };
    let mut metadata = FileMetadata::new(name);
    if let Some(parent) = args.parent {
        metadata = metadata.with_parent(parent);
    }

    let request = UploadRequest {
        file_path: args.path,
        file_size,
        mime_type: args.mime.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        metadata,
        bearer_token: token,
        retry_budget: args.retries.unwrap_or(config.retry_budget),
    };
    let transport = UploadClient::with_base_url(&config.api_base)?;
    let mut handle = ResumableUpload::new(transport, request, config).spawn();

    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        match event {
            UploadEvent::Progress(message) => info!("{message}"),
            UploadEvent::Error(err) => warn!(error = %err, "attempt failed"),
        }
    }
    let uploaded = handle.outcome().await.context("upload failed")?;
    println!("{}", uploaded.body.trim());
    Ok(())
}

async fn resolve_token() -> anyhow::Result<String> {
    if let Ok(token) = std::env::var("GDRIVE_TOKEN") {
        return bearer_from(&mut StaticToken::new(token)).await;
    }
    let client_id = std::env::var("GDRIVE_CLIENT_ID")
        .context("neither GDRIVE_TOKEN nor GDRIVE_CLIENT_ID is set")?;
    let client_secret =
        std::env::var("GDRIVE_CLIENT_SECRET").context("GDRIVE_CLIENT_SECRET is not set")?;
    let refresh_token =
        std::env::var("GDRIVE_REFRESH_TOKEN").context("GDRIVE_REFRESH_TOKEN is not set")?;
    let oauth_client = OAuthClient::new(client_id, client_secret)?;
    let mut provider = TokenProvider::from_refresh_token(oauth_client, refresh_token);
    bearer_from(&mut provider).await
}

async fn bearer_from<A: Authenticator>(auth: &mut A) -> anyhow::Result<String> {
    auth.bearer_token()
        .await
        .context("failed to obtain an access token")
}

fn print_files(list: &FileList) {
    for file in &list.files {
        println!("{}\t{}", file.id, file.name.as_deref().unwrap_or(""));
    }
}
