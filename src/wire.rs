// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Backend row shapes and the mapping to and from in-memory entities.
//!
//! The backend stores snake_case columns (`last_worked_on`, `project_id`,
//! `github_metadata` as JSON) and allows NULL in a few text columns. Every
//! in-memory field maps to exactly one column and back:
//!
//! | entity field              | column            |
//! |---------------------------|-------------------|
//! | `Project::last_worked_on` | `last_worked_on`  |
//! | `Project::description`    | `description` (NULL → "") |
//! | `Project::tags`           | `tags` (NULL → [])        |
//! | `Project::color`          | `color` (NULL → "")       |
//! | `Project::progress`       | `progress` (clamped)      |
//! | `Task::project_id`        | `project_id`      |
//! | `MemorySnapshot::project_id` | `project_id`   |
//!
//! Server-only columns (`created_at`) are read but never mapped into entities.
//! Result sets are decoded row by row with [`decode_rows`]: a row that does
//! not fit its shape is logged and skipped.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::model::{
    clamp_progress, GithubMetadata, MemorySnapshot, Project, ProjectStatus, Task, TaskStatus,
};
use crate::patch::{ProjectPatch, TaskPatch};

pub const PROJECTS_TABLE: &str = "projects";
pub const TASKS_TABLE: &str = "tasks";
pub const SNAPSHOTS_TABLE: &str = "memory_snapshots";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub progress: i64,
    pub last_worked_on: DateTime<Utc>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub color: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub github_repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub project_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub id: String,
    pub project_id: String,
    pub thoughts: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    #[serde(default)]
    pub github_metadata: Option<GithubMetadata>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            status: row.status,
            progress: clamp_progress(row.progress),
            last_worked_on: row.last_worked_on,
            tags: row.tags.unwrap_or_default(),
            color: row.color.unwrap_or_default(),
            user_id: row.user_id,
            github_repo_url: row.github_repo_url,
        }
    }
}

impl From<&Project> for ProjectRow {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            title: project.title.clone(),
            description: Some(project.description.clone()),
            status: project.status,
            progress: i64::from(project.progress),
            last_worked_on: project.last_worked_on,
            tags: Some(project.tags.clone()),
            color: Some(project.color.clone()),
            user_id: project.user_id.clone(),
            github_repo_url: project.github_repo_url.clone(),
            created_at: None,
        }
    }
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            status: row.status,
            project_id: row.project_id,
            user_id: row.user_id,
        }
    }
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status.clone(),
            project_id: task.project_id.clone(),
            user_id: task.user_id.clone(),
            created_at: None,
        }
    }
}

impl From<SnapshotRow> for MemorySnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            thoughts: row.thoughts,
            timestamp: row.timestamp,
            user_id: row.user_id,
            github_metadata: row.github_metadata,
        }
    }
}

impl From<&MemorySnapshot> for SnapshotRow {
    fn from(snapshot: &MemorySnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            project_id: snapshot.project_id.clone(),
            thoughts: snapshot.thoughts.clone(),
            timestamp: snapshot.timestamp,
            user_id: snapshot.user_id.clone(),
            github_metadata: snapshot.github_metadata.clone(),
        }
    }
}

/// Update body for a project: only the patched columns are serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectUpdateRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_worked_on: Option<DateTime<Utc>>,
    /// `Some(None)` serializes as `null` and clears the column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_repo_url: Option<Option<String>>,
}

impl From<&ProjectPatch> for ProjectUpdateRow {
    fn from(patch: &ProjectPatch) -> Self {
        Self {
            title: patch.title.clone(),
            description: patch.description.clone(),
            tags: patch.tags.clone(),
            color: patch.color.clone(),
            status: patch.status,
            progress: patch.progress.map(i64::from),
            last_worked_on: patch.last_worked_on,
            github_repo_url: patch.github_repo_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskUpdateRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl From<&TaskPatch> for TaskUpdateRow {
    fn from(patch: &TaskPatch) -> Self {
        Self {
            title: patch.title.clone(),
            status: patch.status.clone(),
            project_id: patch.project_id.clone(),
        }
    }
}

/// Decode the rows of one result set. Rows that fail to decode (an unknown
/// project status, a missing column) are dropped with a warning naming
/// their id, so one bad row does not hide the rest.
pub fn decode_rows<R: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<R> {
    let total = rows.len();
    let decoded: Vec<R> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(Value::as_str).unwrap_or("<no id>").to_string();
            match serde_json::from_value(row) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(table = %table, id = %id, error = %e, "Skipping row that failed to decode");
                    crate::metrics::record_remote_error(table, "decode");
                    None
                }
            }
        })
        .collect();
    if decoded.len() < total {
        warn!(table = %table, skipped = total - decoded.len(), total, "Result set decoded partially");
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn project() -> Project {
        Project {
            id: "p1".into(),
            title: "Parser".into(),
            description: "LR(1) tables".into(),
            status: ProjectStatus::Active,
            progress: 55,
            last_worked_on: at(1_700_000_000),
            tags: vec!["rust".into(), "compilers".into()],
            color: "violet".into(),
            user_id: "u1".into(),
            github_repo_url: Some("https://github.com/o/parser".into()),
        }
    }

    #[test]
    fn test_project_round_trip_is_lossless() {
        let original = project();
        let row = ProjectRow::from(&original);
        assert_eq!(Project::from(row), original);

        let unlinked = Project { github_repo_url: None, tags: vec![], ..project() };
        assert_eq!(Project::from(ProjectRow::from(&unlinked)), unlinked);
    }

    #[test]
    fn test_project_row_uses_snake_case_columns() {
        let value = serde_json::to_value(ProjectRow::from(&project())).unwrap();
        assert!(value.get("last_worked_on").is_some());
        assert!(value.get("lastWorkedOn").is_none());
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["status"], "active");
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_project_row_nulls_become_defaults() {
        let row: ProjectRow = serde_json::from_value(json!({
            "id": "srv-1",
            "title": "Untitled",
            "description": null,
            "status": "planned",
            "progress": 0,
            "last_worked_on": "2024-03-01T10:00:00Z",
            "tags": null,
            "color": null,
            "user_id": "u1",
            "github_repo_url": null,
            "created_at": "2024-03-01T10:00:01Z"
        }))
        .unwrap();

        let project = Project::from(row);
        assert_eq!(project.description, "");
        assert!(project.tags.is_empty());
        assert_eq!(project.color, "");
        assert!(project.github_repo_url.is_none());
    }

    #[test]
    fn test_project_row_progress_is_clamped() {
        let mut row = ProjectRow::from(&project());
        row.progress = 180;
        assert_eq!(Project::from(row.clone()).progress, 100);
        row.progress = -4;
        assert_eq!(Project::from(row).progress, 0);
    }

    #[test]
    fn test_task_round_trip_is_lossless() {
        let task = Task {
            id: "t1".into(),
            title: "Write grammar".into(),
            status: TaskStatus::InProgress,
            project_id: "p1".into(),
            user_id: "u1".into(),
        };
        let row = TaskRow::from(&task);
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["project_id"], "p1");
        assert_eq!(value["status"], "in-progress");
        assert_eq!(Task::from(row), task);

        let odd = Task { status: TaskStatus::Unrecognized("blocked".into()), ..task };
        assert_eq!(Task::from(TaskRow::from(&odd)), odd);
    }

    #[test]
    fn test_snapshot_round_trip_is_lossless() {
        let snapshot = MemorySnapshot {
            id: "s1".into(),
            project_id: "p1".into(),
            thoughts: "stuck on precedence climbing".into(),
            timestamp: at(1_700_000_500),
            user_id: "u1".into(),
            github_metadata: Some(GithubMetadata {
                repo: "o/parser".into(),
                branch: "main".into(),
                commit: "abcdef0123456789".into(),
            }),
        };
        let row = SnapshotRow::from(&snapshot);
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["github_metadata"]["branch"], "main");
        assert_eq!(value["project_id"], "p1");
        assert_eq!(MemorySnapshot::from(row), snapshot);

        let bare = MemorySnapshot { github_metadata: None, ..snapshot };
        assert_eq!(MemorySnapshot::from(SnapshotRow::from(&bare)), bare);
    }

    #[test]
    fn test_update_rows_only_carry_patched_columns() {
        let patch = ProjectPatch {
            last_worked_on: Some(at(1_700_000_900)),
            github_repo_url: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(ProjectUpdateRow::from(&patch)).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("last_worked_on"));
        assert!(object["github_repo_url"].is_null());

        let value = serde_json::to_value(TaskUpdateRow::from(&TaskPatch {
            project_id: Some("p2".into()),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(value, json!({"project_id": "p2"}));
    }

    #[test]
    fn test_decode_rows_skips_unknown_status() {
        let good = serde_json::to_value(ProjectRow::from(&project())).unwrap();
        let mut archived = good.clone();
        archived["id"] = json!("p2");
        archived["status"] = json!("archived");
        let mut other = good.clone();
        other["id"] = json!("p3");

        let rows: Vec<ProjectRow> = decode_rows(PROJECTS_TABLE, vec![good, archived, other, json!("garbage")]);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[test]
    fn test_decode_rows_keeps_clean_result_sets_whole() {
        let rows = vec![serde_json::to_value(ProjectRow::from(&project())).unwrap()];
        assert_eq!(decode_rows::<ProjectRow>(PROJECTS_TABLE, rows).len(), 1);
        assert!(decode_rows::<TaskRow>(TASKS_TABLE, Vec::new()).is_empty());
    }
}
