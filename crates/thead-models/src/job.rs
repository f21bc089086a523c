//! Job request/output schema for the serverless runtime.

use serde::{Deserialize, Serialize};

/// A job as delivered by the serverless runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Runtime-assigned job ID
    pub id: String,

    /// User-supplied input mapping
    pub input: JobInput,
}

/// User-supplied job input.
///
/// Only the two URL fields are required; everything else falls back to the
/// worker's env-sourced defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobInput {
    /// Source image URL (required)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image_url: Option<String>,

    /// Driving audio URL (required)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_url: Option<String>,

    /// Reference video providing eye blinking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_eyeblink_url: Option<String>,

    /// Reference video providing head pose
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_pose_url: Option<String>,

    /// Per-job generation parameter overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose_style: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_yaw: Option<Vec<i32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_pitch: Option<Vec<i32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_roll: Option<Vec<i32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocess: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub still: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub face3dvis: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_scale: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhancer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_enhancer: Option<String>,
}

/// Successful job output returned to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Public URL of the rendered video
    pub output_video_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_input() {
        let json = r#"{
            "id": "job-1",
            "input": {
                "input_image_url": "https://example.com/face.png",
                "input_audio_url": "https://example.com/speech.wav"
            }
        }"#;

        let req: JobRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.id, "job-1");
        assert_eq!(
            req.input.input_image_url.as_deref(),
            Some("https://example.com/face.png")
        );
        assert!(req.input.ref_pose_url.is_none());
        assert!(req.input.still.is_none());
    }

    #[test]
    fn deserializes_full_overrides() {
        let json = r#"{
            "input_image_url": "https://example.com/face.png",
            "input_audio_url": "https://example.com/speech.wav",
            "ref_eyeblink_url": "https://example.com/blink.mp4",
            "pose_style": 12,
            "device": "cpu",
            "batch_size": 4,
            "input_yaw": [-10, 0, 10],
            "size": 256,
            "preprocess": "crop",
            "still": false,
            "expression_scale": 1.5,
            "enhancer": "gfpgan"
        }"#;

        let input: JobInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.pose_style, Some(12));
        assert_eq!(input.input_yaw, Some(vec![-10, 0, 10]));
        assert_eq!(input.expression_scale, Some(1.5));
        assert_eq!(input.enhancer.as_deref(), Some("gfpgan"));
    }

    #[test]
    fn output_serializes_single_field() {
        let out = JobOutput {
            output_video_url: "https://bucket.example.com/sadtalker/x.mp4".to_string(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"output_video_url": "https://bucket.example.com/sadtalker/x.mp4"})
        );
    }
}
