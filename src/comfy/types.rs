//! Wire types for the render server's job-queue, queue-status and
//! job-history endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body posted to the job-queue endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct QueueRequest {
    pub prompt: Value,
    pub client_id: String,
}

/// Response from the job-queue endpoint. `prompt_id` is the job identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueResponse {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub node_errors: Value,
}

/// Snapshot of the server's execution queue.
///
/// Each item is an array whose second element is the job identifier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueStatus {
    #[serde(default)]
    pub queue_running: Vec<Vec<Value>>,
    #[serde(default)]
    pub queue_pending: Vec<Vec<Value>>,
}

impl QueueStatus {
    pub fn is_running(&self, job_id: &str) -> bool {
        self.queue_running
            .iter()
            .any(|item| item.get(1).and_then(Value::as_str) == Some(job_id))
    }
}

/// One job's entry in the history response (keyed by job id).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Outputs keyed by stage id; sorted so image lookup order is stable.
    #[serde(default)]
    pub outputs: BTreeMap<String, StageOutput>,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageOutput {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Reference to an output image, resolvable through the download endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    /// `[event_name, payload]` pairs.
    #[serde(default)]
    pub messages: Vec<(String, Value)>,
}

impl HistoryEntry {
    pub fn image_refs(&self) -> Vec<&ImageRef> {
        self.outputs.values().flat_map(|o| o.images.iter()).collect()
    }

    /// Entries without a status block are finished once they list outputs.
    pub fn is_completed(&self) -> bool {
        match &self.status {
            Some(status) => status.completed.unwrap_or(false),
            None => !self.outputs.is_empty(),
        }
    }

    /// The server's failure message, if this entry reports an error.
    pub fn failure_message(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        if status.status_str.as_deref() != Some("error") {
            return None;
        }

        let detail = status
            .messages
            .iter()
            .find(|(event, _)| event == "execution_error")
            .and_then(|(_, payload)| payload.get("exception_message"))
            .and_then(Value::as_str)
            .map(|m| m.trim().to_string());

        Some(detail.unwrap_or_else(|| "server reported an execution error".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn queue_response_deserialize() {
        let json = r#"{"prompt_id": "abc-123", "number": 4, "node_errors": {}}"#;
        let resp: QueueResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.prompt_id.as_deref(), Some("abc-123"));
        assert_eq!(resp.number, Some(4));
    }

    #[test]
    fn queue_response_without_id() {
        let resp: QueueResponse = serde_json::from_str(r#"{"error": "bad"}"#).unwrap();
        assert!(resp.prompt_id.is_none());
    }

    #[test]
    fn queue_status_detects_running_job() {
        let json = r#"{
            "queue_running": [[0, "job-a", {}, {}, []]],
            "queue_pending": [[1, "job-b", {}, {}, []]]
        }"#;
        let status: QueueStatus = serde_json::from_str(json).unwrap();
        assert!(status.is_running("job-a"));
        assert!(!status.is_running("job-b"));
    }

    #[test]
    fn history_entry_with_images() {
        let json = r#"{
            "job-a": {
                "outputs": {
                    "9": {"images": [{"filename": "late.png", "subfolder": "", "type": "output"}]},
                    "7": {"images": [{"filename": "news_00001_.png", "subfolder": "", "type": "output"}]}
                },
                "status": {"status_str": "success", "completed": true, "messages": []}
            }
        }"#;
        let history: HashMap<String, HistoryEntry> = serde_json::from_str(json).unwrap();
        let entry = &history["job-a"];
        assert!(entry.is_completed());
        assert!(entry.failure_message().is_none());
        let refs = entry.image_refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].filename, "news_00001_.png");
        assert_eq!(refs[0].kind, "output");
    }

    #[test]
    fn history_entry_reports_failure() {
        let json = r#"{
            "outputs": {},
            "status": {
                "status_str": "error",
                "completed": false,
                "messages": [
                    ["execution_start", {"prompt_id": "job-a"}],
                    ["execution_error", {"exception_message": "CUDA out of memory\n"}]
                ]
            }
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.failure_message().as_deref(), Some("CUDA out of memory"));
    }

    #[test]
    fn history_entry_error_without_detail() {
        let json = r#"{"status": {"status_str": "error"}}"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(
            entry.failure_message().as_deref(),
            Some("server reported an execution error")
        );
    }

    #[test]
    fn history_entry_without_status_uses_outputs() {
        let entry: HistoryEntry = serde_json::from_str(r#"{"outputs": {}}"#).unwrap();
        assert!(!entry.is_completed());
    }
}
