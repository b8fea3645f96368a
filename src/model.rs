// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Entity types held by the sync engine.
//!
//! The in-memory (and local cache) representation keys the timestamp and
//! project reference in camelCase (`lastWorkedOn`, `projectId`); the
//! backend's snake_case rows live in [`crate::wire`].
//!
//! # Example
//!
//! ```
//! use mindtrail_sync::model::{Project, ProjectStatus, NewProject};
//!
//! let draft = NewProject::titled("Compiler");
//! let project = Project::from_draft("tmp-1".into(), "user-1".into(), draft);
//!
//! assert_eq!(project.status, ProjectStatus::Planned);
//! assert_eq!(project.progress, 0);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clamp an arbitrary progress value into 0..=100.
#[must_use]
pub fn clamp_progress(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// The three entity kinds the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Task,
    Snapshot,
}

impl EntityKind {
    /// Label used for metrics and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
            Self::Snapshot => "snapshot",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Project => 0,
            Self::Task => 1,
            Self::Snapshot => 2,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project lifecycle status. Any transition is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Planned,
    Active,
    Paused,
}

impl ProjectStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown project status '{other}'")),
        }
    }
}

/// Kanban status of a task.
///
/// Values the board does not know are kept verbatim so a round trip through
/// the engine never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Unrecognized(String),
}

impl TaskStatus {
    /// The board columns, in display order.
    pub const COLUMNS: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Unrecognized(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "todo" => Self::Todo,
            "in-progress" => Self::InProgress,
            "done" => Self::Done,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Unrecognized(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
    /// Percent complete, always within 0..=100
    pub progress: u8,
    pub last_worked_on: DateTime<Utc>,
    pub tags: Vec<String>,
    /// Swatch token chosen in the UI
    pub color: String,
    #[serde(rename = "user_id")]
    pub user_id: String,
    #[serde(default, rename = "github_repo_url", skip_serializing_if = "Option::is_none")]
    pub github_repo_url: Option<String>,
}

impl Project {
    /// Build the optimistic record for a create: planned, 0%, worked on now.
    #[must_use]
    pub fn from_draft(id: String, user_id: String, draft: NewProject) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            status: ProjectStatus::Planned,
            progress: 0,
            last_worked_on: Utc::now(),
            tags: draft.tags,
            color: draft.color,
            user_id,
            github_repo_url: draft.github_repo_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub project_id: String,
    #[serde(rename = "user_id")]
    pub user_id: String,
}

impl Task {
    /// Build the optimistic record for a create; new tasks start in `todo`.
    #[must_use]
    pub fn from_draft(id: String, user_id: String, draft: NewTask) -> Self {
        Self {
            id,
            title: draft.title,
            status: TaskStatus::Todo,
            project_id: draft.project_id,
            user_id,
        }
    }
}

/// Repository state captured when a snapshot was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubMetadata {
    /// `owner/repo`
    pub repo: String,
    pub branch: String,
    /// Full commit SHA
    pub commit: String,
}

impl GithubMetadata {
    /// First seven characters of the commit, as shown next to a snapshot.
    #[must_use]
    pub fn short_commit(&self) -> &str {
        self.commit.get(..7).unwrap_or(&self.commit)
    }
}

/// Free-text capture of where the user left off. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub id: String,
    pub project_id: String,
    pub thoughts: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "user_id")]
    pub user_id: String,
    #[serde(default, rename = "github_metadata", skip_serializing_if = "Option::is_none")]
    pub github_metadata: Option<GithubMetadata>,
}

impl MemorySnapshot {
    #[must_use]
    pub fn from_draft(id: String, user_id: String, draft: NewSnapshot) -> Self {
        Self {
            id,
            project_id: draft.project_id,
            thoughts: draft.thoughts,
            timestamp: Utc::now(),
            user_id,
            github_metadata: draft.github_metadata,
        }
    }
}

/// Everything the engine holds: the three collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub snapshots: Vec<MemorySnapshot>,
}

impl Dataset {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.tasks.is_empty() && self.snapshots.is_empty()
    }

    #[must_use]
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Snapshots of one project, newest first.
    #[must_use]
    pub fn snapshots_for(&self, project_id: &str) -> Vec<&MemorySnapshot> {
        let mut found: Vec<&MemorySnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.project_id == project_id)
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        found
    }
}

/// Caller-supplied fields of a new project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub color: String,
    pub github_repo_url: Option<String>,
}

impl NewProject {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Caller-supplied fields of a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub project_id: String,
}

/// Caller-supplied fields of a new memory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub project_id: String,
    pub thoughts: String,
    pub github_metadata: Option<GithubMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-5), 0);
        assert_eq!(clamp_progress(42), 42);
        assert_eq!(clamp_progress(250), 100);
    }

    #[test]
    fn test_task_status_keeps_unknown_values() {
        let status: TaskStatus = serde_json::from_value(json!("blocked")).unwrap();
        assert_eq!(status, TaskStatus::Unrecognized("blocked".into()));
        assert!(!status.is_recognized());
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("blocked"));

        let status: TaskStatus = serde_json::from_value(json!("in-progress")).unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("in-progress"));
    }

    #[test]
    fn test_project_status_parse() {
        assert_eq!("paused".parse::<ProjectStatus>().unwrap(), ProjectStatus::Paused);
        assert!("archived".parse::<ProjectStatus>().is_err());
        assert_eq!(serde_json::to_value(ProjectStatus::Active).unwrap(), json!("active"));
    }

    #[test]
    fn test_defaults_from_drafts() {
        let project = Project::from_draft("p".into(), "u".into(), NewProject::titled("X"));
        assert_eq!(project.status, ProjectStatus::Planned);
        assert_eq!(project.progress, 0);
        assert_eq!(project.user_id, "u");

        let task = Task::from_draft(
            "t".into(),
            "u".into(),
            NewTask { title: "Write tests".into(), project_id: "p".into() },
        );
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.project_id, "p");
    }

    #[test]
    fn test_in_memory_shape_keys() {
        let task = Task {
            id: "t".into(),
            title: "x".into(),
            status: TaskStatus::Done,
            project_id: "p".into(),
            user_id: "u".into(),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["projectId"], "p");
        assert_eq!(value["user_id"], "u");
        assert!(value.get("project_id").is_none());
    }

    #[test]
    fn test_short_commit() {
        let meta = GithubMetadata {
            repo: "o/r".into(),
            branch: "main".into(),
            commit: "0123456789abcdef".into(),
        };
        assert_eq!(meta.short_commit(), "0123456");

        let short = GithubMetadata { commit: "abc".into(), ..meta };
        assert_eq!(short.short_commit(), "abc");
    }

    #[test]
    fn test_dataset_deserializes_missing_collections() {
        let data: Dataset = serde_json::from_value(json!({"projects": []})).unwrap();
        assert!(data.is_empty());
    }
}
