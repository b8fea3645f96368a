// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Partial updates and their minimization.
//!
//! A patch only ever carries fields that differ from the held entity:
//! [`ProjectPatch::minimize`] drops the rest, and an empty patch means the
//! update is a no-op that never reaches the backend.
//!
//! # Example
//!
//! ```
//! use mindtrail_sync::model::{NewProject, Project};
//! use mindtrail_sync::patch::ProjectPatch;
//!
//! let project = Project::from_draft("p1".into(), "u1".into(), NewProject::titled("Parser"));
//!
//! let same = ProjectPatch { title: Some("Parser".into()), ..Default::default() };
//! assert!(same.minimize(&project).is_empty());
//!
//! let renamed = ProjectPatch { title: Some("Lexer".into()), ..Default::default() };
//! assert!(!renamed.minimize(&project).is_empty());
//! ```

use chrono::{DateTime, Utc};

use crate::model::{clamp_progress, Project, ProjectStatus, Task, TaskStatus};

/// Optional per-field update of a [`Project`].
///
/// `github_repo_url` is doubly optional: `Some(None)` unlinks the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
    pub status: Option<ProjectStatus>,
    pub progress: Option<u8>,
    pub last_worked_on: Option<DateTime<Utc>>,
    pub github_repo_url: Option<Option<String>>,
}

impl ProjectPatch {
    /// Set progress from an unchecked value, clamped into 0..=100.
    #[must_use]
    pub fn with_progress(mut self, value: i64) -> Self {
        self.progress = Some(clamp_progress(value));
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Field-by-field difference between the held project and an edited copy.
    #[must_use]
    pub fn diff(current: &Project, edited: &Project) -> Self {
        Self {
            title: edited.title.clone().into(),
            description: edited.description.clone().into(),
            tags: edited.tags.clone().into(),
            color: edited.color.clone().into(),
            status: edited.status.into(),
            progress: edited.progress.into(),
            last_worked_on: edited.last_worked_on.into(),
            github_repo_url: Some(edited.github_repo_url.clone()),
        }
        .minimize(current)
    }

    /// Drop every field equal to the current value.
    #[must_use]
    pub fn minimize(self, current: &Project) -> Self {
        Self {
            title: changed(self.title, &current.title),
            description: changed(self.description, &current.description),
            tags: changed(self.tags, &current.tags),
            color: changed(self.color, &current.color),
            status: changed(self.status, &current.status),
            progress: changed(self.progress.map(|p| p.min(100)), &current.progress),
            last_worked_on: changed(self.last_worked_on, &current.last_worked_on),
            github_repo_url: changed(self.github_repo_url, &current.github_repo_url),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Names of the fields this patch sets, for logging.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.description.is_some() {
            names.push("description");
        }
        if self.tags.is_some() {
            names.push("tags");
        }
        if self.color.is_some() {
            names.push("color");
        }
        if self.status.is_some() {
            names.push("status");
        }
        if self.progress.is_some() {
            names.push("progress");
        }
        if self.last_worked_on.is_some() {
            names.push("last_worked_on");
        }
        if self.github_repo_url.is_some() {
            names.push("github_repo_url");
        }
        names
    }

    pub fn apply(&self, project: &mut Project) {
        if let Some(title) = &self.title {
            project.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            project.description.clone_from(description);
        }
        if let Some(tags) = &self.tags {
            project.tags.clone_from(tags);
        }
        if let Some(color) = &self.color {
            project.color.clone_from(color);
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(progress) = self.progress {
            project.progress = progress.min(100);
        }
        if let Some(at) = self.last_worked_on {
            project.last_worked_on = at;
        }
        if let Some(url) = &self.github_repo_url {
            project.github_repo_url.clone_from(url);
        }
    }
}

/// Optional per-field update of a [`Task`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub project_id: Option<String>,
}

impl TaskPatch {
    /// A board move: only the status changes.
    #[must_use]
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn diff(current: &Task, edited: &Task) -> Self {
        Self {
            title: Some(edited.title.clone()),
            status: Some(edited.status.clone()),
            project_id: Some(edited.project_id.clone()),
        }
        .minimize(current)
    }

    #[must_use]
    pub fn minimize(self, current: &Task) -> Self {
        Self {
            title: changed(self.title, &current.title),
            status: changed(self.status, &current.status),
            project_id: changed(self.project_id, &current.project_id),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// True when the status is the only field set.
    #[must_use]
    pub fn is_status_only(&self) -> bool {
        self.status.is_some() && self.title.is_none() && self.project_id.is_none()
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.status.is_some() {
            names.push("status");
        }
        if self.project_id.is_some() {
            names.push("project_id");
        }
        names
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(status) = &self.status {
            task.status = status.clone();
        }
        if let Some(project_id) = &self.project_id {
            task.project_id.clone_from(project_id);
        }
    }
}

fn changed<T: PartialEq>(candidate: Option<T>, current: &T) -> Option<T> {
    candidate.filter(|value| value != current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewProject;

    fn project() -> Project {
        let mut p = Project::from_draft(
            "p1".into(),
            "u1".into(),
            NewProject {
                title: "Parser".into(),
                description: "LR(1)".into(),
                tags: vec!["rust".into(), "compilers".into()],
                color: "violet".into(),
                github_repo_url: None,
            },
        );
        p.progress = 40;
        p
    }

    fn task() -> Task {
        Task {
            id: "t1".into(),
            title: "Lexer".into(),
            status: TaskStatus::Todo,
            project_id: "p1".into(),
            user_id: "u1".into(),
        }
    }

    #[test]
    fn test_identical_patch_minimizes_to_empty() {
        let current = project();
        let patch = ProjectPatch {
            title: Some("Parser".into()),
            description: Some("LR(1)".into()),
            tags: Some(vec!["rust".into(), "compilers".into()]),
            color: Some("violet".into()),
            status: Some(ProjectStatus::Planned),
            progress: Some(40),
            last_worked_on: Some(current.last_worked_on),
            github_repo_url: Some(None),
        };
        assert!(patch.minimize(&current).is_empty());
    }

    #[test]
    fn test_tags_compared_by_value_and_order() {
        let current = project();
        let reordered = ProjectPatch {
            tags: Some(vec!["compilers".into(), "rust".into()]),
            ..Default::default()
        };
        let minimized = reordered.minimize(&current);
        assert_eq!(minimized.field_names(), vec!["tags"]);
    }

    #[test]
    fn test_diff_picks_changed_fields_only() {
        let current = project();
        let mut edited = current.clone();
        edited.progress = 90;
        edited.github_repo_url = Some("https://github.com/o/r".into());

        let patch = ProjectPatch::diff(&current, &edited);
        assert_eq!(patch.field_names(), vec!["progress", "github_repo_url"]);
        assert_eq!(patch.progress, Some(90));
    }

    #[test]
    fn test_with_progress_clamps() {
        assert_eq!(ProjectPatch::default().with_progress(140).progress, Some(100));
        assert_eq!(ProjectPatch::default().with_progress(-3).progress, Some(0));
    }

    #[test]
    fn test_apply_merges_fields() {
        let mut p = project();
        ProjectPatch {
            title: Some("Parser v2".into()),
            github_repo_url: Some(Some("https://github.com/o/r".into())),
            ..Default::default()
        }
        .with_status(ProjectStatus::Active)
        .apply(&mut p);

        assert_eq!(p.title, "Parser v2");
        assert_eq!(p.status, ProjectStatus::Active);
        assert_eq!(p.github_repo_url.as_deref(), Some("https://github.com/o/r"));
        assert_eq!(p.description, "LR(1)");
    }

    #[test]
    fn test_unlinking_repo() {
        let mut p = project();
        p.github_repo_url = Some("https://github.com/o/r".into());
        let patch = ProjectPatch { github_repo_url: Some(None), ..Default::default() }.minimize(&p);
        assert_eq!(patch.field_names(), vec!["github_repo_url"]);
        patch.apply(&mut p);
        assert!(p.github_repo_url.is_none());
    }

    #[test]
    fn test_task_status_only() {
        let current = task();
        let patch = TaskPatch::status(TaskStatus::Done).minimize(&current);
        assert!(patch.is_status_only());

        let mut edited = current.clone();
        edited.title = "Lexer + tests".into();
        edited.status = TaskStatus::Done;
        let patch = TaskPatch::diff(&current, &edited);
        assert!(!patch.is_status_only());
        assert_eq!(patch.field_names(), vec!["title", "status"]);
    }

    #[test]
    fn test_field_names_follow_declaration_order() {
        let full = ProjectPatch {
            title: Some("t".into()),
            description: Some("d".into()),
            tags: Some(Vec::new()),
            color: Some("blue".into()),
            last_worked_on: Some(project().last_worked_on),
            github_repo_url: Some(None),
            ..Default::default()
        }
        .with_status(ProjectStatus::Paused)
        .with_progress(5);
        assert_eq!(
            full.field_names(),
            vec!["title", "description", "tags", "color", "status", "progress", "last_worked_on", "github_repo_url"]
        );
        assert!(ProjectPatch::default().field_names().is_empty());

        let moved = TaskPatch { project_id: Some("p2".into()), ..TaskPatch::status(TaskStatus::Done) };
        assert_eq!(moved.field_names(), vec!["status", "project_id"]);
    }

    #[test]
    fn test_task_patch_same_status_is_empty() {
        assert!(TaskPatch::status(TaskStatus::Todo).minimize(&task()).is_empty());
    }
}
