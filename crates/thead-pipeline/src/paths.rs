//! Model asset path resolution.
//!
//! The external model library keys its weights on the render size and its
//! facerender configuration on whether the preprocess mode keeps the full
//! frame. This mirrors the library's own path-initialization routine so the
//! stage scripts receive the files they expect.

use std::path::{Path, PathBuf};

use thead_models::Preprocess;

/// Resolved model asset paths for one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Main generator checkpoint (keyed by render size)
    pub checkpoint: PathBuf,
    /// Mapping-net checkpoint (keyed by preprocess family)
    pub mapping_checkpoint: PathBuf,
    /// audio2pose model config
    pub audio2pose_config: PathBuf,
    /// audio2exp model config
    pub audio2exp_config: PathBuf,
    /// Facerender config (still variant for full-frame modes)
    pub facerender_config: PathBuf,
    /// Checkpoint directory root
    pub checkpoint_dir: PathBuf,
}

impl ModelPaths {
    /// Resolve asset paths for the given render size and preprocess mode.
    pub fn resolve(
        checkpoint_dir: impl AsRef<Path>,
        config_dir: impl AsRef<Path>,
        size: u32,
        preprocess: Preprocess,
    ) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();
        let config_dir = config_dir.as_ref();

        let checkpoint = checkpoint_dir.join(format!("SadTalker_V0.0.2_{size}.safetensors"));

        let (mapping, facerender) = if preprocess.is_full_frame() {
            ("mapping_00109-model.pth.tar", "facerender_still.yaml")
        } else {
            ("mapping_00229-model.pth.tar", "facerender.yaml")
        };

        Self {
            checkpoint,
            mapping_checkpoint: checkpoint_dir.join(mapping),
            audio2pose_config: config_dir.join("auido2pose.yaml"),
            audio2exp_config: config_dir.join("auido2exp.yaml"),
            facerender_config: config_dir.join(facerender),
            checkpoint_dir,
        }
    }
}
