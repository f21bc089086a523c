//! URL downloads for job assets and checkpoints.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// Download `url` to `dest`, streaming the body to disk.
///
/// If `dest` already exists this is a no-op returning the existing path
/// without re-fetching. Parent directories are created as needed.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: impl AsRef<Path>,
) -> WorkerResult<PathBuf> {
    let dest = dest.as_ref();

    if dest.exists() {
        info!("Using existing file {} for {}", dest.display(), url);
        return Ok(dest.to_path_buf());
    }

    info!("Downloading {}", url);

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| WorkerError::download_failed(url, e.to_string()))?;

    if !response.status().is_success() {
        return Err(WorkerError::download_failed(
            url,
            format!("HTTP status {}", response.status()),
        ));
    }

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    // A truncated file left behind here would pass the exists check above
    // on the next call, so remove it before surfacing the error.
    if let Err(e) = write_body(&mut response, url, dest).await {
        let _ = tokio::fs::remove_file(dest).await;
        return Err(e);
    }

    Ok(dest.to_path_buf())
}

async fn write_body(
    response: &mut reqwest::Response,
    url: &str,
    dest: &Path,
) -> WorkerResult<()> {
    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| WorkerError::download_failed(url, e.to_string()))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
