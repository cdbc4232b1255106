use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use super::error::RenderError;

/// Per-submission values written into the job template.
#[derive(Debug, Clone)]
pub struct StageParams<'a> {
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler: &'a str,
    pub scheduler: &'a str,
    pub seed: u64,
    pub checkpoint: &'a str,
    pub filename_prefix: &'a str,
}

/// A job specification: named stages, each `{class_type, inputs}`, linked by
/// `[stage_id, output_index]` references.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    stages: Map<String, Value>,
}

impl WorkflowTemplate {
    /// Built-in seven-stage text-to-image graph.
    pub fn builtin() -> Self {
        let graph = json!({
            "1": {"class_type": "CLIPTextEncode", "inputs": {"text": "", "clip": ["4", 1]}},
            "2": {"class_type": "CLIPTextEncode", "inputs": {"text": "", "clip": ["4", 1]}},
            "3": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": 0, "steps": 25, "cfg": 7.0,
                    "sampler_name": "dpmpp_2m", "scheduler": "karras", "denoise": 1.0,
                    "model": ["4", 0], "positive": ["1", 0], "negative": ["2", 0],
                    "latent_image": ["5", 0]
                }
            },
            "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": ""}},
            "5": {"class_type": "EmptyLatentImage", "inputs": {"width": 512, "height": 512, "batch_size": 1}},
            "6": {"class_type": "VAEDecode", "inputs": {"samples": ["3", 0], "vae": ["4", 2]}},
            "7": {"class_type": "SaveImage", "inputs": {"filename_prefix": "news_image", "images": ["6", 0]}}
        });

        match graph {
            Value::Object(stages) => Self { stages },
            _ => Self { stages: Map::new() },
        }
    }

    /// Load a template exported from the render server (API format JSON).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read workflow template {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("invalid workflow JSON in {}", path.display()))?;
        match value {
            Value::Object(stages) => Ok(Self { stages }),
            _ => anyhow::bail!("workflow template {} is not a JSON object", path.display()),
        }
    }

    /// Produce a concrete job specification.
    ///
    /// Stages are located by kind; the positive and negative text stages are
    /// the ones the sampler's `positive`/`negative` inputs link to.
    pub fn render(&self, params: &StageParams<'_>) -> Result<Value, RenderError> {
        let mut stages = self.stages.clone();

        let sampler_id = find_stage(&stages, "KSampler").ok_or_else(|| {
            RenderError::Submission("workflow template has no sampler stage".into())
        })?;
        let positive_id = linked_stage(&stages, &sampler_id, "positive");
        let negative_id = linked_stage(&stages, &sampler_id, "negative");

        for (id, stage) in stages.iter_mut() {
            let kind = stage
                .get("class_type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let Some(inputs) = stage.get_mut("inputs").and_then(Value::as_object_mut) else {
                continue;
            };

            match kind.as_str() {
                "CLIPTextEncode" if Some(id) == positive_id.as_ref() => {
                    inputs.insert("text".into(), json!(params.prompt));
                }
                "CLIPTextEncode" if Some(id) == negative_id.as_ref() => {
                    inputs.insert("text".into(), json!(params.negative_prompt));
                }
                "EmptyLatentImage" => {
                    inputs.insert("width".into(), json!(params.width));
                    inputs.insert("height".into(), json!(params.height));
                }
                "KSampler" => {
                    inputs.insert("seed".into(), json!(params.seed));
                    inputs.insert("steps".into(), json!(params.steps));
                    inputs.insert("cfg".into(), json!(params.cfg_scale));
                    inputs.insert("sampler_name".into(), json!(params.sampler));
                    inputs.insert("scheduler".into(), json!(params.scheduler));
                }
                "CheckpointLoaderSimple" => {
                    inputs.insert("ckpt_name".into(), json!(params.checkpoint));
                }
                "SaveImage" => {
                    inputs.insert("filename_prefix".into(), json!(params.filename_prefix));
                }
                _ => {}
            }
        }

        Ok(Value::Object(stages))
    }
}

fn find_stage(stages: &Map<String, Value>, kind: &str) -> Option<String> {
    stages
        .iter()
        .find(|(_, stage)| stage.get("class_type").and_then(Value::as_str) == Some(kind))
        .map(|(id, _)| id.clone())
}

fn linked_stage(stages: &Map<String, Value>, from: &str, input: &str) -> Option<String> {
    stages
        .get(from)?
        .get("inputs")?
        .get(input)?
        .get(0)?
        .as_str()
        .map(str::to_string)
}
