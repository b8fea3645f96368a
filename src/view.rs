// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Derived, read-only projections of the dataset.
//!
//! Nothing here mutates the dataset. [`ProjectView::build`] filters and
//! sorts projects, selects the tasks of the visible projects, and computes
//! the summary statistics; [`timeline`] groups projects by day.
//!
//! # Example
//!
//! ```
//! use mindtrail_sync::view::{ProjectView, SortKey, SortOrder, ViewQuery};
//! use mindtrail_sync::model::Dataset;
//!
//! let query = ViewQuery { sort_by: SortKey::Progress, order: SortOrder::Desc, ..Default::default() };
//! let view = ProjectView::build(&Dataset::default(), &query);
//! assert_eq!(view.stats.average_progress, 0);
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{Dataset, Project, ProjectStatus, Task, TaskStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Most recently worked on first
    #[default]
    LastWorkedOn,
    /// Highest progress first
    Progress,
    /// A→Z
    Title,
}

/// `Desc` keeps the key's natural order; `Asc` negates it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    /// Case-insensitive substring of title, description or any tag
    pub search: String,
    /// Statuses to keep; empty keeps all
    pub statuses: HashSet<ProjectStatus>,
    pub sort_by: SortKey,
    pub order: SortOrder,
}

impl ViewQuery {
    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self { search: term.into(), ..Default::default() }
    }

    fn matches(&self, project: &Project) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&project.status);
        status_ok && matches_search(project, &self.search)
    }

    fn compare(&self, a: &Project, b: &Project) -> Ordering {
        let natural = match self.sort_by {
            SortKey::LastWorkedOn => b.last_worked_on.cmp(&a.last_worked_on),
            SortKey::Progress => b.progress.cmp(&a.progress),
            SortKey::Title => compare_titles(&a.title, &b.title),
        };
        match self.order {
            SortOrder::Desc => natural,
            SortOrder::Asc => natural.reverse(),
        }
    }
}

fn matches_search(project: &Project, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let needle = term.to_lowercase();
    project.title.to_lowercase().contains(&needle)
        || project.description.to_lowercase().contains(&needle)
        || project.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
}

/// Case-insensitive first, then exact, so "alpha" and "Alpha" stay adjacent.
fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Summary figures shown above the project list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStats {
    /// Visible projects with status active
    pub active_projects: usize,
    /// Mean progress of the visible projects, rounded (0 when none)
    pub average_progress: u8,
    /// Done tasks across all projects, visible or not
    pub done_tasks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectView {
    pub projects: Vec<Project>,
    /// Tasks whose project is in `projects`
    pub tasks: Vec<Task>,
    pub stats: ViewStats,
}

impl ProjectView {
    #[must_use]
    pub fn build(data: &Dataset, query: &ViewQuery) -> Self {
        let mut projects: Vec<Project> = data
            .projects
            .iter()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        // Stable: ties keep dataset order
        projects.sort_by(|a, b| query.compare(a, b));

        let visible: HashSet<&str> = projects.iter().map(|p| p.id.as_str()).collect();
        let tasks = data
            .tasks
            .iter()
            .filter(|t| visible.contains(t.project_id.as_str()))
            .cloned()
            .collect();

        let stats = ViewStats {
            active_projects: projects.iter().filter(|p| p.status == ProjectStatus::Active).count(),
            average_progress: average_progress(&projects),
            done_tasks: data.tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
        };

        Self { projects, tasks, stats }
    }
}

/// Mean progress rounded half up; 0 for no projects.
#[must_use]
pub fn average_progress(projects: &[Project]) -> u8 {
    if projects.is_empty() {
        return 0;
    }
    let sum: u64 = projects.iter().map(|p| u64::from(p.progress)).sum();
    let n = projects.len() as u64;
    // Each progress is at most 100, so the mean fits in a u8
    ((2 * sum + n) / (2 * n)) as u8
}

/// Projects last worked on during one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineGroup {
    pub day: NaiveDate,
    /// e.g. "October 15, 2026"
    pub label: String,
    pub projects: Vec<Project>,
}

/// Group projects by the day of `last_worked_on`, in order of first
/// appearance; projects keep their relative order inside a group.
#[must_use]
pub fn timeline(projects: &[Project]) -> Vec<TimelineGroup> {
    let mut groups: Vec<TimelineGroup> = Vec::new();
    for project in projects {
        let day = project.last_worked_on.date_naive();
        match groups.iter_mut().find(|g| g.day == day) {
            Some(group) => group.projects.push(project.clone()),
            None => groups.push(TimelineGroup {
                day,
                label: day.format("%B %-d, %Y").to_string(),
                projects: vec![project.clone()],
            }),
        }
    }
    groups
}

/// Relative age: "Just now", "5m ago", "3h ago", "2d ago", "1w ago".
#[must_use]
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    if seconds < 60 {
        return "Just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = hours / 24;
    if days < 7 {
        return format!("{days}d ago");
    }
    format!("{}w ago", days / 7)
}
