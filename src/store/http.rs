use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DateRange, EntityStore};
use crate::error::{Result, StoreError};
use crate::models::{
    format_date, ActivityEntry, CalendarTask, NewProject, NewTask, Project, Task, TaskStatus,
};

/// Entity Store backed by a workspace server's REST API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and maps non-success statuses onto `StoreError`.
    /// A 404 on an addressed entity becomes `NotFound`.
    async fn send(&self, req: RequestBuilder, target: Option<(&'static str, i64)>) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some((entity, id)) = target {
                return Err(StoreError::NotFound { entity, id });
            }
        }

        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message: error_message(&body, status),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let resp = self.send(self.client.get(self.url(path)), None).await?;
        Ok(resp.json::<Value>().await?)
    }

    /// Decodes an array response row by row, skipping rows that do not fit `T`.
    async fn get_rows<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<Vec<T>> {
        let body = self.send(req, None).await?.json::<Value>().await?;
        let rows = parse_rows(body, what)?;
        debug!(count = rows.len(), what, "fetched rows");
        Ok(rows)
    }
}

fn parse_rows<T: DeserializeOwned>(body: Value, what: &str) -> Result<Vec<T>> {
    let Value::Array(items) = body else {
        return Err(StoreError::Malformed(format!("expected a list of {}", what)));
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(what, "skipping malformed row: {}", e);
                None
            }
        })
        .collect())
}

/// Prefers the server's `{"error": "..."}` body over the bare status text.
fn error_message(body: &str, status: StatusCode) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && trimmed.len() <= 200).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

#[async_trait]
impl EntityStore for HttpStore {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_rows(self.client.get(self.url("/api/projects")), "projects")
            .await
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        let req = self.client.post(self.url("/api/projects")).json(project);
        Ok(self.send(req, None).await?.json().await?)
    }

    async fn update_project(&self, project: &Project) -> Result<()> {
        let req = self
            .client
            .put(self.url(&format!("/api/projects/{}", project.id)))
            .json(project);
        self.send(req, Some(("project", project.id))).await?;
        Ok(())
    }

    async fn delete_project(&self, id: i64) -> Result<()> {
        let req = self.client.delete(self.url(&format!("/api/projects/{}", id)));
        self.send(req, Some(("project", id))).await?;
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.get_rows(self.client.get(self.url("/api/tasks")), "tasks")
            .await
    }

    async fn get_task(&self, id: i64) -> Result<Task> {
        let req = self.client.get(self.url(&format!("/api/tasks/{}", id)));
        Ok(self.send(req, Some(("task", id))).await?.json().await?)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task> {
        let req = self.client.post(self.url("/api/tasks")).json(task);
        Ok(self.send(req, None).await?.json().await?)
    }

    async fn create_subtask(&self, parent_id: i64, task: &NewTask) -> Result<Task> {
        let req = self
            .client
            .post(self.url(&format!("/api/tasks/{}/subtasks", parent_id)))
            .json(task);
        Ok(self.send(req, Some(("task", parent_id))).await?.json().await?)
    }

    /// The server only updates fields present in the body, so a derived
    /// `overdue` is left out and the stored status stays as it was.
    async fn update_task(&self, task: &Task) -> Result<()> {
        let mut body = serde_json::to_value(task)?;
        if task.status == TaskStatus::Overdue {
            if let Value::Object(fields) = &mut body {
                fields.remove("status");
            }
        }
        let req = self
            .client
            .put(self.url(&format!("/api/tasks/{}", task.id)))
            .json(&body);
        self.send(req, Some(("task", task.id))).await?;
        Ok(())
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        let req = self.client.delete(self.url(&format!("/api/tasks/{}", id)));
        self.send(req, Some(("task", id))).await?;
        Ok(())
    }

    async fn list_activity(&self) -> Result<Vec<ActivityEntry>> {
        self.get_rows(self.client.get(self.url("/api/activity")), "activity entries")
            .await
    }

    async fn clear_activity(&self) -> Result<u64> {
        let req = self.client.delete(self.url("/api/activity/clear"));
        let body: Value = self.send(req, None).await?.json().await?;
        body.get("deleted_count")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::Malformed("missing deleted_count".into()))
    }

    async fn list_calendar_tasks(&self, range: Option<DateRange>) -> Result<Vec<CalendarTask>> {
        let mut req = self.client.get(self.url("/api/calendar/tasks"));
        if let Some((from, to)) = range {
            req = req.query(&[("from", format_date(from)), ("to", format_date(to))]);
        }
        self.get_rows(req, "calendar tasks").await
    }

    async fn fetch_graph(&self) -> Result<Vec<Value>> {
        match self.get_json("/api/graph").await? {
            Value::Array(elements) => Ok(elements),
            _ => Err(StoreError::Malformed("expected a list of graph elements".into())),
        }
    }
}
