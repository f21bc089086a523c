//! Process startup: network-volume linking and checkpoint sync.
//!
//! Both run once before any job is accepted; the checkpoint tree is
//! read-only from then on.

use std::path::{Path, PathBuf};

use tracing::info;

use thead_pipeline::checkpoint_manifest;

use crate::download::download_file;
use crate::error::WorkerResult;

/// Candidate mount points for the persistent network volume.
const VOLUME_MOUNTS: &[&str] = &["/runpod-volume", "/workspace"];

/// Subdirectory of the volume holding our checkpoint cache.
const VOLUME_CACHE_DIR: &str = "sadtalker";

/// Checkpoint directories under the model root that get linked to the volume.
const LINKED_DIRS: &[&str] = &["checkpoints", "gfpgan/weights"];

/// Detect a mounted network volume, if any.
pub fn detect_network_volume() -> Option<PathBuf> {
    VOLUME_MOUNTS
        .iter()
        .map(|p| PathBuf::from(*p))
        .find(|p| p.exists())
}

/// Link the model's checkpoint directories to the network volume cache.
///
/// Idempotent: a link that already points at the correct target is left
/// untouched; only a wrong or stale entry is removed and re-created. With no
/// volume mounted, the model root's own (ephemeral) directories are used.
///
/// Returns the volume path when one was linked.
pub async fn ensure_volume_links(model_root: &Path) -> WorkerResult<Option<PathBuf>> {
    let Some(volume) = detect_network_volume() else {
        info!("No network volume detected, using ephemeral storage");
        return Ok(None);
    };

    info!("Network volume detected at {}", volume.display());
    link_checkpoint_dirs(&volume, model_root).await?;
    Ok(Some(volume))
}

/// Core of `ensure_volume_links`, parameterized over the volume path.
pub async fn link_checkpoint_dirs(volume: &Path, model_root: &Path) -> WorkerResult<()> {
    let cache_root = volume.join(VOLUME_CACHE_DIR);

    for dir in LINKED_DIRS {
        let target = cache_root.join(dir);
        tokio::fs::create_dir_all(&target).await?;

        let link = model_root.join(dir);
        if let Some(parent) = link.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        ensure_symlink(&target, &link).await?;
    }

    Ok(())
}

/// Make `link` a symlink to `target`, replacing a wrong or stale entry.
async fn ensure_symlink(target: &Path, link: &Path) -> WorkerResult<()> {
    match tokio::fs::read_link(link).await {
        Ok(existing) if existing == target => return Ok(()),
        Ok(_) => {
            // Link exists but points elsewhere
            tokio::fs::remove_file(link).await?;
        }
        Err(_) => {
            // Not a symlink; a plain directory or file may be in the way
            match tokio::fs::metadata(link).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(link).await?,
                Ok(_) => tokio::fs::remove_file(link).await?,
                Err(_) => {}
            }
        }
    }

    tokio::fs::symlink(target, link).await?;
    info!("Linked {} -> {}", link.display(), target.display());
    Ok(())
}

/// Ensure every checkpoint in the manifest exists locally, downloading any
/// missing ones from their release URLs.
pub async fn sync_checkpoints(client: &reqwest::Client, model_root: &Path) -> WorkerResult<()> {
    for entry in checkpoint_manifest() {
        let local = model_root.join(entry.relative_path);
        if !local.exists() {
            download_file(client, entry.url, &local).await?;
        }
    }
    Ok(())
}
