// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Hosted backend adapter speaking the PostgREST dialect.
//!
//! Tables live under `{remote_url}/rest/v1/{table}`. Every request carries
//! the anonymous key as `apikey` and the session's access token (or the
//! anonymous key) as bearer auth; row-level security scopes results to the
//! owner. Single-row writes ask for the object representation so the
//! response is the saved row, not an array.
//!
//! ```text
//! GET    /rest/v1/projects?select=*&order=created_at.desc
//! POST   /rest/v1/tasks                 Prefer: return=representation
//! PATCH  /rest/v1/tasks?id=eq.{id}      Prefer: return=representation
//! DELETE /rest/v1/tasks?id=eq.{id}
//! ```

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::traits::{RemoteError, RemoteStore};
use crate::config::SyncConfig;
use crate::metrics::LatencyTimer;
use crate::model::{MemorySnapshot, Project, Task};
use crate::patch::{ProjectPatch, TaskPatch};
use crate::resilience::retry::{retry_if, RetryConfig};
use crate::session::Session;
use crate::wire::{
    decode_rows, ProjectRow, ProjectUpdateRow, SnapshotRow, TaskRow, TaskUpdateRow, PROJECTS_TABLE,
    SNAPSHOTS_TABLE, TASKS_TABLE,
};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub struct RestRemote {
    client: reqwest::Client,
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
    read_retry: RetryConfig,
}

impl RestRemote {
    pub fn new(
        remote_url: impl Into<String>,
        anon_key: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        let remote_url = remote_url.into();
        Self {
            client: reqwest::Client::new(),
            rest_url: format!("{}/rest/v1", remote_url.trim_end_matches('/')),
            anon_key: anon_key.into(),
            access_token,
            read_retry: RetryConfig::query(),
        }
    }

    /// Build from config; None when the backend is not configured.
    #[must_use]
    pub fn from_config(config: &SyncConfig, session: Option<&Session>) -> Option<Self> {
        if !config.is_remote_configured() {
            return None;
        }
        let url = config.remote_url.clone()?;
        let key = config.remote_anon_key.clone()?;
        Some(Self::new(url, key, session.and_then(|s| s.access_token.clone())))
    }

    #[must_use]
    pub fn with_read_retry(mut self, config: RetryConfig) -> Self {
        self.read_retry = config;
        self
    }

    fn request(&self, method: Method, table: &'static str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.client
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Raw rows of `table`; callers decode them with [`decode_rows`].
    async fn select(&self, table: &'static str, order: Option<&'static str>) -> Result<Vec<Value>, RemoteError> {
        let _timer = LatencyTimer::new(table, "select");
        retry_if(&format!("select_{table}"), &self.read_retry, is_transient, || async move {
            let mut request = self.request(Method::GET, table).query(&[("select", "*")]);
            if let Some(order) = order {
                request = request.query(&[("order", order)]);
            }
            let response = request.send().await.map_err(transport)?;
            decode(response).await
        })
        .await
    }

    async fn insert_row<B, R>(&self, table: &'static str, body: &B) -> Result<R, RemoteError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let _timer = LatencyTimer::new(table, "insert");
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn update_row<B, R>(&self, table: &'static str, id: &str, body: &B) -> Result<R, RemoteError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let _timer = LatencyTimer::new(table, "update");
        let response = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn delete_row(&self, table: &'static str, id: &str) -> Result<(), RemoteError> {
        let _timer = LatencyTimer::new(table, "delete");
        let response = self
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await.map(|_| ())
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

fn is_transient(err: &RemoteError) -> bool {
    match err {
        RemoteError::Transport(_) => true,
        RemoteError::Rejected { status, .. } => *status >= 500,
        RemoteError::NotConfigured | RemoteError::Decode(_) => false,
    }
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %message, "Remote store rejected request");
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message: extract_message(&message),
    })
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, RemoteError> {
    let response = check_status(response).await?;
    let body = response.text().await.map_err(transport)?;
    serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
}

/// PostgREST errors are `{"message": ..., "code": ...}`; fall back to the raw body.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl RemoteStore for RestRemote {
    async fn fetch_projects(&self) -> Result<Vec<Project>, RemoteError> {
        let rows = self.select(PROJECTS_TABLE, Some("created_at.desc")).await?;
        let rows: Vec<ProjectRow> = decode_rows(PROJECTS_TABLE, rows);
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        let rows: Vec<TaskRow> = decode_rows(TASKS_TABLE, self.select(TASKS_TABLE, None).await?);
        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn fetch_snapshots(&self) -> Result<Vec<MemorySnapshot>, RemoteError> {
        let rows: Vec<SnapshotRow> = decode_rows(SNAPSHOTS_TABLE, self.select(SNAPSHOTS_TABLE, None).await?);
        Ok(rows.into_iter().map(MemorySnapshot::from).collect())
    }

    async fn insert_project(&self, project: &Project) -> Result<Project, RemoteError> {
        let row: ProjectRow = self.insert_row(PROJECTS_TABLE, &ProjectRow::from(project)).await?;
        Ok(row.into())
    }

    async fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project, RemoteError> {
        let row: ProjectRow = self
            .update_row(PROJECTS_TABLE, id, &ProjectUpdateRow::from(patch))
            .await?;
        Ok(row.into())
    }

    async fn delete_project(&self, id: &str) -> Result<(), RemoteError> {
        self.delete_row(PROJECTS_TABLE, id).await
    }

    async fn insert_task(&self, task: &Task) -> Result<Task, RemoteError> {
        let row: TaskRow = self.insert_row(TASKS_TABLE, &TaskRow::from(task)).await?;
        Ok(row.into())
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, RemoteError> {
        let row: TaskRow = self
            .update_row(TASKS_TABLE, id, &TaskUpdateRow::from(patch))
            .await?;
        Ok(row.into())
    }

    async fn delete_task(&self, id: &str) -> Result<(), RemoteError> {
        self.delete_row(TASKS_TABLE, id).await
    }

    async fn insert_snapshot(&self, snapshot: &MemorySnapshot) -> Result<MemorySnapshot, RemoteError> {
        let row: SnapshotRow = self
            .insert_row(SNAPSHOTS_TABLE, &SnapshotRow::from(snapshot))
            .await?;
        Ok(row.into())
    }
}
