//! Labeling task, information source and weak supervision task models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WsError;

/// Label shape of a labeling task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Whole-record single-label assignment
    #[serde(rename = "MULTICLASS_CLASSIFICATION")]
    Classification,
    /// Token-span labeling
    #[serde(rename = "INFORMATION_EXTRACTION")]
    Extraction,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "MULTICLASS_CLASSIFICATION",
            TaskType::Extraction => "INFORMATION_EXTRACTION",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = WsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MULTICLASS_CLASSIFICATION" => Ok(TaskType::Classification),
            "INFORMATION_EXTRACTION" => Ok(TaskType::Extraction),
            other => Err(WsError::UnsupportedTaskType(other.to_string())),
        }
    }
}

/// Label of a labeling task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Heuristic contributing associations to one labeling task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationSource {
    pub id: String,
    pub project_id: String,
    pub labeling_task_id: String,
    pub name: String,
    /// Only selected sources take part in fit/predict
    pub is_selected: bool,
}

/// Labeling task with its labels and information sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelingTask {
    pub id: String,
    pub project_id: String,
    pub name: String,
    /// Raw stored value; parse with [`LabelingTask::task_type`]
    pub task_type: String,
    pub labels: Vec<Label>,
    pub information_sources: Vec<InformationSource>,
}

impl LabelingTask {
    /// Parsed task type, `UnsupportedTaskType` for unknown stored values
    pub fn task_type(&self) -> Result<TaskType, WsError> {
        self.task_type.parse()
    }
}

/// Weak supervision task state
///
/// `Pending` on creation; `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadState {
    Pending,
    Success,
    Failed,
}

impl PayloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadState::Pending => "PENDING",
            PayloadState::Success => "SUCCESS",
            PayloadState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PayloadState::Success | PayloadState::Failed)
    }
}

impl FromStr for PayloadState {
    type Err = WsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PayloadState::Pending),
            "SUCCESS" => Ok(PayloadState::Success),
            "FAILED" => Ok(PayloadState::Failed),
            other => Err(WsError::Internal(format!(
                "Unknown weak supervision state: {}",
                other
            ))),
        }
    }
}

/// One fit/predict run over a labeling task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakSupervisionTask {
    pub id: String,
    pub project_id: String,
    pub labeling_task_id: String,
    pub state: PayloadState,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Comma-joined names of the sources that took part
    pub selected_information_sources: Option<String>,
    pub distinct_records: Option<i64>,
    pub result_count: Option<i64>,
}
