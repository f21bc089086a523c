//! The fixed manifest of model checkpoint files.
//!
//! The worker refuses to serve jobs until every entry exists locally; the
//! startup sync downloads any that are missing. Paths are relative to the
//! model root so they resolve through the network-volume symlinks.

/// One required checkpoint file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointFile {
    /// Path relative to the model root
    pub relative_path: &'static str,
    /// Release URL the file is fetched from when missing
    pub url: &'static str,
}

/// All checkpoint files the pipeline needs.
pub fn checkpoint_manifest() -> &'static [CheckpointFile] {
    const MANIFEST: &[CheckpointFile] = &[
        CheckpointFile {
            relative_path: "checkpoints/mapping_00109-model.pth.tar",
            url: "https://github.com/OpenTalker/SadTalker/releases/download/v0.0.2-rc/mapping_00109-model.pth.tar",
        },
        CheckpointFile {
            relative_path: "checkpoints/mapping_00229-model.pth.tar",
            url: "https://github.com/OpenTalker/SadTalker/releases/download/v0.0.2-rc/mapping_00229-model.pth.tar",
        },
        CheckpointFile {
            relative_path: "checkpoints/SadTalker_V0.0.2_256.safetensors",
            url: "https://github.com/OpenTalker/SadTalker/releases/download/v0.0.2-rc/SadTalker_V0.0.2_256.safetensors",
        },
        CheckpointFile {
            relative_path: "checkpoints/SadTalker_V0.0.2_512.safetensors",
            url: "https://github.com/OpenTalker/SadTalker/releases/download/v0.0.2-rc/SadTalker_V0.0.2_512.safetensors",
        },
        CheckpointFile {
            relative_path: "gfpgan/weights/alignment_WFLW_4HG.pth",
            url: "https://github.com/xinntao/facexlib/releases/download/v0.1.0/alignment_WFLW_4HG.pth",
        },
        CheckpointFile {
            relative_path: "gfpgan/weights/detection_Resnet50_Final.pth",
            url: "https://github.com/xinntao/facexlib/releases/download/v0.1.0/detection_Resnet50_Final.pth",
        },
        CheckpointFile {
            relative_path: "gfpgan/weights/GFPGANv1.4.pth",
            url: "https://github.com/TencentARC/GFPGAN/releases/download/v1.3.0/GFPGANv1.4.pth",
        },
        CheckpointFile {
            relative_path: "gfpgan/weights/parsing_parsenet.pth",
            url: "https://github.com/xinntao/facexlib/releases/download/v0.2.2/parsing_parsenet.pth",
        },
    ];
    MANIFEST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_paths_are_relative_and_unique() {
        let manifest = checkpoint_manifest();
        assert_eq!(manifest.len(), 8);

        let mut seen = std::collections::HashSet::new();
        for entry in manifest {
            assert!(!entry.relative_path.starts_with('/'));
            assert!(entry.url.starts_with("https://"));
            assert!(seen.insert(entry.relative_path));
        }
    }
}
