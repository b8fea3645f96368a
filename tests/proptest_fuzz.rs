// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for decoding and the derived views.
//!
//! Uses proptest to generate random/malformed backend rows and cache
//! payloads, plus random datasets for the board and view projections.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

use mindtrail_sync::board::resolve_drop;
use mindtrail_sync::wire::{ProjectRow, SnapshotRow, TaskRow};
use mindtrail_sync::{
    Board, Dataset, DropTarget, Project, ProjectPatch, ProjectStatus, ProjectView, SortKey, SortOrder, Task,
    TaskStatus, ViewQuery,
};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(
        4,   // depth
        64,  // max nodes
        10,  // items per collection
        |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
                prop::collection::hash_map(".*", inner, 0..10)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        },
    )
}

fn status_strategy() -> impl Strategy<Value = ProjectStatus> {
    prop_oneof![
        Just(ProjectStatus::Planned),
        Just(ProjectStatus::Active),
        Just(ProjectStatus::Paused),
    ]
}

fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
        "[a-z]{1,8}".prop_map(TaskStatus::from),
    ]
}

fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..400 * 86_400).prop_map(|secs| Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap())
}

/// Projects with unique ids `p0..pN`.
fn projects_strategy() -> impl Strategy<Value = Vec<Project>> {
    prop::collection::vec(
        (
            "[A-Za-z ]{0,12}",
            "[a-z ]{0,20}",
            status_strategy(),
            0u8..=100,
            timestamp_strategy(),
            prop::collection::vec("[a-z]{1,6}", 0..3),
        ),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (title, description, status, progress, last_worked_on, tags))| Project {
                id: format!("p{i}"),
                title,
                description,
                status,
                progress,
                last_worked_on,
                tags,
                color: "#2563eb".into(),
                user_id: "user-1".into(),
                github_repo_url: None,
            })
            .collect()
    })
}

/// Dataset whose tasks point at its projects (or at a missing one).
fn dataset_strategy() -> impl Strategy<Value = Dataset> {
    projects_strategy().prop_flat_map(|projects| {
        let n = projects.len();
        prop::collection::vec((0..n + 1, task_status_strategy()), 0..20).prop_map(move |tasks| {
            let tasks = tasks
                .into_iter()
                .enumerate()
                .map(|(i, (owner, status))| Task {
                    id: format!("t{i}"),
                    title: format!("task {i}"),
                    status,
                    project_id: format!("p{owner}"),
                    user_id: "user-1".into(),
                })
                .collect();
            Dataset { projects: projects.clone(), tasks, snapshots: Vec::new() }
        })
    })
}

fn query_strategy() -> impl Strategy<Value = ViewQuery> {
    (
        prop_oneof![Just(String::new()), "[a-z]{1,3}"],
        prop::collection::hash_set(status_strategy(), 0..3),
        prop_oneof![Just(SortKey::LastWorkedOn), Just(SortKey::Progress), Just(SortKey::Title)],
        prop_oneof![Just(SortOrder::Asc), Just(SortOrder::Desc)],
    )
        .prop_map(|(search, statuses, sort_by, order)| ViewQuery { search, statuses, sort_by, order })
}

// =============================================================================
// Decoding Fuzz Tests
// =============================================================================

proptest! {
    /// Backend rows should never panic on arbitrary bytes
    #[test]
    fn fuzz_rows_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = serde_json::from_slice::<ProjectRow>(&bytes);
        let _ = serde_json::from_slice::<TaskRow>(&bytes);
        let _ = serde_json::from_slice::<SnapshotRow>(&bytes);
    }

    /// Arbitrary JSON either decodes or fails cleanly, for rows and cache payloads alike
    #[test]
    fn fuzz_decoding_arbitrary_json(value in arbitrary_json_strategy()) {
        let _ = serde_json::from_value::<ProjectRow>(value.clone());
        let _ = serde_json::from_value::<TaskRow>(value.clone());
        let _ = serde_json::from_value::<Vec<SnapshotRow>>(value.clone());
        let _ = serde_json::from_value::<Dataset>(value);
    }

    /// Whatever progress the backend stores, the mapped project holds 0..=100
    #[test]
    fn prop_row_progress_is_clamped(progress in any::<i64>()) {
        let row: ProjectRow = serde_json::from_value(json!({
            "id": "p1",
            "title": "Fuzzed",
            "status": "active",
            "progress": progress,
            "last_worked_on": "2026-10-15T09:00:00Z",
            "user_id": "user-1",
        }))
        .unwrap();
        let project = Project::from(row);
        prop_assert!(project.progress <= 100);
        prop_assert_eq!(i64::from(project.progress), progress.clamp(0, 100));
    }

    /// Task statuses survive the wire unchanged, recognized or not
    #[test]
    fn prop_task_status_preserved(status in task_status_strategy()) {
        let task = Task {
            id: "t1".into(),
            title: "x".into(),
            status: status.clone(),
            project_id: "p1".into(),
            user_id: "user-1".into(),
        };
        let row: TaskRow = serde_json::from_value(serde_json::to_value(TaskRow::from(&task)).unwrap()).unwrap();
        prop_assert_eq!(Task::from(row).status, status);
    }
}

// =============================================================================
// Patch Properties
// =============================================================================

proptest! {
    /// Applying the minimized patch has the same effect as the full one
    #[test]
    fn prop_minimized_patch_same_effect(
        projects in projects_strategy().prop_filter("need one", |p| !p.is_empty()),
        progress in -50i64..150,
        status in status_strategy(),
        title in "[A-Za-z ]{0,12}",
    ) {
        let current = projects[0].clone();
        let patch = ProjectPatch { title: Some(title), ..Default::default() }
            .with_progress(progress)
            .with_status(status);

        let mut full = current.clone();
        patch.apply(&mut full);
        let mut minimal = current.clone();
        patch.clone().minimize(&current).apply(&mut minimal);

        prop_assert_eq!(&full, &minimal);
        prop_assert!(ProjectPatch::diff(&current, &current).is_empty());
        prop_assert!(patch.minimize(&full).is_empty());
    }
}

// =============================================================================
// Board Properties
// =============================================================================

proptest! {
    /// Every recognized task lands in exactly one column, its own
    #[test]
    fn prop_board_partitions_recognized_tasks(data in dataset_strategy()) {
        let board = Board::from_tasks(&data.tasks);
        prop_assert_eq!(board.columns.len(), 3);
        for task in &data.tasks {
            let homes: Vec<&TaskStatus> = board
                .columns
                .iter()
                .filter(|c| c.tasks.iter().any(|t| t.id == task.id))
                .map(|c| &c.status)
                .collect();
            if task.status.is_recognized() {
                prop_assert_eq!(homes, vec![&task.status]);
            } else {
                prop_assert!(homes.is_empty());
            }
        }
    }

    /// A resolved drop always names a different, recognized column
    #[test]
    fn prop_drop_never_targets_own_column(
        data in dataset_strategy(),
        dragged in 0usize..20,
        over in 0usize..20,
    ) {
        let dragged_id = format!("t{dragged}");
        let target = DropTarget::Task(format!("t{over}"));
        if let Some(status) = resolve_drop(&data.tasks, &dragged_id, &target) {
            let current = &data.task(&dragged_id).unwrap().status;
            prop_assert!(status.is_recognized());
            prop_assert_ne!(&status, current);
        }
    }
}

// =============================================================================
// View Properties
// =============================================================================

proptest! {
    /// Visible projects are a filtered subset; tasks follow them
    #[test]
    fn prop_view_filters_consistently(data in dataset_strategy(), query in query_strategy()) {
        let view = ProjectView::build(&data, &query);

        let ids: HashSet<&str> = view.projects.iter().map(|p| p.id.as_str()).collect();
        prop_assert_eq!(ids.len(), view.projects.len());
        for p in &view.projects {
            prop_assert!(data.project(&p.id).is_some());
            prop_assert!(query.statuses.is_empty() || query.statuses.contains(&p.status));
        }
        for t in &view.tasks {
            prop_assert!(ids.contains(t.project_id.as_str()));
        }
        let expected_tasks = data.tasks.iter().filter(|t| ids.contains(t.project_id.as_str())).count();
        prop_assert_eq!(view.tasks.len(), expected_tasks);

        let done = data.tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
        prop_assert_eq!(view.stats.done_tasks, done);
        prop_assert!(view.stats.average_progress <= 100);
        if view.projects.is_empty() {
            prop_assert_eq!(view.stats.average_progress, 0);
        }
    }

    /// Without filters every project is visible
    #[test]
    fn prop_empty_query_keeps_everything(data in dataset_strategy()) {
        let view = ProjectView::build(&data, &ViewQuery::default());
        prop_assert_eq!(view.projects.len(), data.projects.len());
    }

    /// Progress sort: descending is highest first, ascending lowest first
    #[test]
    fn prop_progress_sort_direction(data in dataset_strategy()) {
        for (order, expect_desc) in [(SortOrder::Desc, true), (SortOrder::Asc, false)] {
            let query = ViewQuery { sort_by: SortKey::Progress, order, ..Default::default() };
            let view = ProjectView::build(&data, &query);
            for pair in view.projects.windows(2) {
                if expect_desc {
                    prop_assert!(pair[0].progress >= pair[1].progress);
                } else {
                    prop_assert!(pair[0].progress <= pair[1].progress);
                }
            }
        }
    }

    /// Average is the rounded mean of the visible projects
    #[test]
    fn prop_average_is_rounded_mean(data in dataset_strategy(), query in query_strategy()) {
        let view = ProjectView::build(&data, &query);
        if !view.projects.is_empty() {
            let mean = view.projects.iter().map(|p| f64::from(p.progress)).sum::<f64>()
                / view.projects.len() as f64;
            let diff = (f64::from(view.stats.average_progress) - mean).abs();
            prop_assert!(diff <= 0.5 + f64::EPSILON, "mean {} vs {}", mean, view.stats.average_progress);
        }
    }
}
