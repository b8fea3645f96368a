// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offline board example.
//!
//! Demonstrates:
//! 1. Bootstrapping against the in-memory remote simulation
//! 2. Creating a project and tasks (visible before the round trip ends)
//! 3. Moving a task across the kanban board
//! 4. A rejected write being rolled back, with its error notice
//! 5. The filtered project view and the timeline
//! 6. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example offline_board
//! ```

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use mindtrail_sync::storage::memory::InMemoryRemote;
use mindtrail_sync::view::{format_time_ago, timeline};
use mindtrail_sync::{
    DropTarget, LocalSnapshotStore, NewProject, NewTask, ProjectPatch, ProjectStatus, RemoteError, Session,
    SyncConfig, SyncEngine, TaskStatus, ViewQuery,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindtrail_sync=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n=== mindtrail-sync: offline board ===\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Engine over the in-memory remote
    // ─────────────────────────────────────────────────────────────────────────
    let remote = Arc::new(InMemoryRemote::new());
    let engine = SyncEngine::new(
        SyncConfig::default(),
        Some(Session::new("demo-user")),
        remote.clone(),
        LocalSnapshotStore::in_memory(),
    );
    let source = engine.bootstrap().await;
    println!("Bootstrapped from {:?}, state {}", source, engine.state());

    let mut notices = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            println!("  [{:?}] {}", notice.level, notice.message);
        }
    });

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Project and tasks
    // ─────────────────────────────────────────────────────────────────────────
    let pending = engine.create_project(NewProject {
        title: "Toy compiler".into(),
        description: "Lexer, parser, bytecode VM".into(),
        tags: vec!["rust".into(), "lang".into()],
        color: "#7c3aed".into(),
        github_repo_url: None,
    })?;
    println!("Optimistic id: {}", engine.projects()[0].id);
    let project = pending.await?;
    println!("Server id:     {}", project.id);

    for title in ["Lexer", "Parser", "VM"] {
        engine
            .create_task(NewTask { title: title.into(), project_id: project.id.clone() })?
            .await?;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Board move
    // ─────────────────────────────────────────────────────────────────────────
    let lexer = engine.tasks().into_iter().find(|t| t.title == "Lexer").expect("lexer task");
    if let Some(moved) = engine.move_task(&lexer.id, &DropTarget::Column(TaskStatus::Done))? {
        moved.await?;
    }
    for column in engine.board().columns {
        let titles: Vec<String> = column.tasks.iter().map(|t| t.title.clone()).collect();
        println!("{:>12}: {:?}", column.title(), titles);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Rejected write
    // ─────────────────────────────────────────────────────────────────────────
    remote.set_failure(Some(RemoteError::Transport("network down".into())));
    let update = engine.update_project(&project.id, ProjectPatch::default().with_progress(80))?;
    println!("Progress while in flight: {}", engine.project(&project.id).map_or(0, |p| p.progress));
    if let Err(e) = update.await {
        println!("Rolled back: {e}");
    }
    println!("Progress after rollback:  {}", engine.project(&project.id).map_or(0, |p| p.progress));
    remote.set_failure(None);

    engine
        .update_project(&project.id, ProjectPatch::default().with_progress(35).with_status(ProjectStatus::Active))?
        .await?;

    // ─────────────────────────────────────────────────────────────────────────
    // 5. View and timeline
    // ─────────────────────────────────────────────────────────────────────────
    let view = engine.view(&ViewQuery::search("RUST"));
    println!(
        "\nView: {} project(s), {} active, avg {}%, {} task(s) done",
        view.projects.len(),
        view.stats.active_projects,
        view.stats.average_progress,
        view.stats.done_tasks
    );
    let now = chrono::Utc::now();
    for group in timeline(&view.projects) {
        println!("{}", group.label);
        for p in &group.projects {
            println!("  {} ({})", p.title, format_time_ago(p.last_worked_on, now));
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    tokio::task::yield_now().await;
    println!("\nMetrics:");
    dump_metrics(&snapshotter);

    engine.sign_out();
    println!("\nState: {}", engine.state());
    Ok(())
}

/// Print captured counters and gauges, sorted by name.
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let rendered = match value {
            DebugValue::Counter(v) => format!("{v}"),
            DebugValue::Gauge(v) => format!("{:.0}", v.into_inner()),
            DebugValue::Histogram(samples) => format!("{} sample(s)", samples.len()),
        };
        lines.push(format!("  {}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();
    for line in lines {
        println!("{line}");
    }
}
