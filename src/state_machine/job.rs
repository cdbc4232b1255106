use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::JobState;
use crate::selector::Style;

/// A render request tracked by the identifier the external server issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    /// Seed sent to the server. Random when the caller did not pick one.
    pub seed: u64,
    pub state: JobState,
    pub state_history: Vec<JobState>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    pub fn new(
        id: String,
        prompt: String,
        negative_prompt: String,
        width: u32,
        height: u32,
        seed: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            prompt,
            negative_prompt,
            width,
            height,
            seed,
            state: JobState::Submitted,
            state_history: Vec::new(),
            submitted_at: now,
            updated_at: now,
        }
    }

    pub(super) fn advance(&mut self, next: JobState) {
        self.state_history.push(self.state);
        self.state = next;
        self.updated_at = Utc::now();
    }
}

/// One successfully composed artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub timestamp: DateTime<Utc>,
    pub headline: String,
    pub style: Style,
    pub artifact_path: PathBuf,
}

impl GenerationRecord {
    pub fn new(headline: String, style: Style, artifact_path: PathBuf) -> Self {
        Self {
            timestamp: Utc::now(),
            headline,
            style,
            artifact_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation_defaults() {
        let job = RenderJob::new("abc".into(), "p".into(), "n".into(), 1024, 576, 7);
        assert_eq!(job.state, JobState::Submitted);
        assert!(job.state_history.is_empty());
        assert_eq!(job.seed, 7);
        assert_eq!((job.width, job.height), (1024, 576));
    }

    #[test]
    fn record_serialization_roundtrip() {
        let record = GenerationRecord::new(
            "Scientists discover breakthrough material".into(),
            Style::Realistic,
            PathBuf::from("output/images/a.png"),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""style":"realistic""#));
        let parsed: GenerationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.headline, record.headline);
        assert_eq!(parsed.style, Style::Realistic);
        assert_eq!(parsed.artifact_path, record.artifact_path);
    }
}
