//! drive_upload CLI - Upload a file to Google Drive, recreating its directory path.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::debug;

use drive_upload::{
    extract_folder_id, upload_into_path, Authenticator, DriveClient, DriveError, FileMetadata,
};

/// Upload a local file into a Google Drive folder, mirroring its directory path.
#[derive(Parser)]
#[command(name = "drive_upload")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local file to upload. Its directory part is recreated as nested folders.
    file: PathBuf,

    /// Destination folder URL or ID.
    #[arg(long, short = 't', env = "DRIVE_FOLDER_ID")]
    to: String,

    /// Path to the OAuth2 client secret JSON downloaded from the Google console.
    #[arg(long, env = "GOOGLE_CLIENT_SECRETS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Path of the cached user token.
    #[arg(long, env = "DRIVE_TOKEN_FILE", default_value = "token.json")]
    token: PathBuf,

    /// Resumable upload chunk size in MiB.
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    chunk_size: u32,

    /// Seconds to wait for the browser login to complete. The consent URL is
    /// printed to stderr and has to be opened by hand; no browser is launched.
    #[arg(long, default_value_t = 300)]
    login_timeout: u64,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(file) => {
            println!(
                "File with ID: \"{}\" was uploaded to Google Drive successfully.",
                file.id
            );
        }
        Err(e) => {
            if let Some(drive_error) = e.downcast_ref::<DriveError>() {
                debug!("Failure kind: {:?}", drive_error.kind());
            }
            println!("An error occurred: {:#}", e);
        }
    }
}

async fn run(cli: Cli) -> Result<FileMetadata> {
    let folder_id = extract_folder_id(&cli.to)
        .with_context(|| format!("Invalid folder URL or ID: {}", cli.to))?;

    let auth = Authenticator::new(&cli.credentials, &cli.token)
        .with_login_timeout(Duration::from_secs(cli.login_timeout));
    auth.obtain_credentials()
        .await
        .with_context(|| format!("Failed to obtain credentials from {:?}", cli.token))?;

    let client =
        DriveClient::new(auth).with_chunk_size(cli.chunk_size as usize * 1024 * 1024);

    let file = upload_into_path(&client, &cli.file, &folder_id)
        .await
        .with_context(|| format!("Failed to upload {:?}", cli.file))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from([
            "drive_upload",
            "pr/São José dos Pinhais/arquivo.txt",
            "--to",
            "1g1cvcyagkRWgv1NT_VjyptdRJA8IgOIE",
        ])
        .unwrap();

        assert_eq!(cli.file, PathBuf::from("pr/São José dos Pinhais/arquivo.txt"));
        assert_eq!(cli.credentials, PathBuf::from("credentials.json"));
        assert_eq!(cli.token, PathBuf::from("token.json"));
        assert_eq!(cli.chunk_size, 100);
        assert_eq!(cli.login_timeout, 300);
    }

    #[test]
    fn test_cli_rejects_zero_chunk_size() {
        let result = Cli::try_parse_from([
            "drive_upload",
            "arquivo.txt",
            "--to",
            "root",
            "--chunk-size",
            "0",
        ]);
        assert!(result.is_err());
    }
}
