// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Kanban projection of the task list.
//!
//! Three fixed columns in display order: todo, in-progress, done. Tasks
//! with any other status are left out of every column.

use crate::model::{Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

impl Column {
    /// Display title of the column.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self.status {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
            TaskStatus::Unrecognized(_) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub columns: Vec<Column>,
}

impl Board {
    /// Group `tasks` into the three columns, keeping their relative order.
    #[must_use]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let columns = TaskStatus::COLUMNS
            .iter()
            .map(|status| Column {
                status: status.clone(),
                tasks: tasks.iter().filter(|t| &t.status == status).cloned().collect(),
            })
            .collect();
        Self { columns }
    }

    #[must_use]
    pub fn column(&self, status: &TaskStatus) -> Option<&Column> {
        self.columns.iter().find(|c| &c.status == status)
    }

    /// Tasks shown on the board (unrecognized statuses excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a dragged task was released over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// A column's container (e.g. an empty column)
    Column(TaskStatus),
    /// Another task card; the target is that card's column
    Task(String),
}

/// Status a drop moves `dragged_id` to, or `None` when nothing changes.
///
/// No change when the task drops on itself, the task or target is
/// unknown, the target is not one of the three columns, or the target
/// column is the one the task is already in.
#[must_use]
pub fn resolve_drop(tasks: &[Task], dragged_id: &str, target: &DropTarget) -> Option<TaskStatus> {
    let dragged = tasks.iter().find(|t| t.id == dragged_id)?;

    let status = match target {
        DropTarget::Column(status) => status.clone(),
        DropTarget::Task(over_id) if over_id == dragged_id => return None,
        DropTarget::Task(over_id) => tasks.iter().find(|t| &t.id == over_id)?.status.clone(),
    };

    (status.is_recognized() && status != dragged.status).then_some(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: &str) -> Task {
        Task {
            id: id.into(),
            title: id.into(),
            status: TaskStatus::from(status),
            project_id: "p1".into(),
            user_id: "u1".into(),
        }
    }

    fn tasks() -> Vec<Task> {
        vec![
            task("a", "todo"),
            task("b", "done"),
            task("c", "in-progress"),
            task("d", "blocked"),
            task("e", "todo"),
        ]
    }

    #[test]
    fn test_three_columns_in_order() {
        let board = Board::from_tasks(&tasks());
        let statuses: Vec<&str> = board.columns.iter().map(|c| c.status.as_str()).collect();
        assert_eq!(statuses, vec!["todo", "in-progress", "done"]);
        assert_eq!(board.columns[0].title(), "To Do");
    }

    #[test]
    fn test_done_task_only_in_done_column() {
        let board = Board::from_tasks(&tasks());
        for column in &board.columns {
            let has_b = column.tasks.iter().any(|t| t.id == "b");
            assert_eq!(has_b, column.status == TaskStatus::Done);
        }
    }

    #[test]
    fn test_unrecognized_status_in_no_column() {
        let board = Board::from_tasks(&tasks());
        assert!(board.columns.iter().all(|c| c.tasks.iter().all(|t| t.id != "d")));
        assert_eq!(board.len(), 4);
    }

    #[test]
    fn test_column_keeps_order() {
        let board = Board::from_tasks(&tasks());
        let todo: Vec<&str> = board
            .column(&TaskStatus::Todo)
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(todo, vec!["a", "e"]);
    }

    #[test]
    fn test_drop_on_column() {
        let tasks = tasks();
        assert_eq!(
            resolve_drop(&tasks, "a", &DropTarget::Column(TaskStatus::Done)),
            Some(TaskStatus::Done)
        );
    }

    #[test]
    fn test_drop_on_task_uses_its_column() {
        let tasks = tasks();
        assert_eq!(
            resolve_drop(&tasks, "a", &DropTarget::Task("c".into())),
            Some(TaskStatus::InProgress)
        );
    }

    #[test]
    fn test_drop_in_own_column_is_noop() {
        let tasks = tasks();
        assert_eq!(resolve_drop(&tasks, "a", &DropTarget::Column(TaskStatus::Todo)), None);
        assert_eq!(resolve_drop(&tasks, "a", &DropTarget::Task("e".into())), None);
        assert_eq!(resolve_drop(&tasks, "a", &DropTarget::Task("a".into())), None);
    }

    #[test]
    fn test_unresolvable_drops() {
        let tasks = tasks();
        assert_eq!(resolve_drop(&tasks, "zz", &DropTarget::Column(TaskStatus::Done)), None);
        assert_eq!(resolve_drop(&tasks, "a", &DropTarget::Task("zz".into())), None);
        // Onto a card that is not on the board
        assert_eq!(resolve_drop(&tasks, "a", &DropTarget::Task("d".into())), None);
        assert_eq!(
            resolve_drop(&tasks, "a", &DropTarget::Column(TaskStatus::from("archived"))),
            None
        );
    }
}
