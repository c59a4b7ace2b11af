// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! HTTP client for the gateway's REST surface. Grounded on the teacher's
//! `daemon::client::DaemonClient` shape — one `reqwest::Client`, one
//! `base_url`, thin methods that build a request, check `status().is_success()`,
//! and deserialize the JSON body.

use anyhow::{Context, Result};
use futures::StreamExt;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.context("request to gateway failed")?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("gateway returned {status}"));
            anyhow::bail!(message);
        }
        Ok(body)
    }

    pub async fn create_task(&self, payload: Value) -> Result<Value> {
        self.send(self.client.post(format!("{}/tasks", self.base_url)).json(&payload)).await
    }

    pub async fn get_task(&self, id: &str, workspace: &str) -> Result<Value> {
        self.send(
            self.client
                .get(format!("{}/tasks/{id}", self.base_url))
                .query(&[("workspace", workspace)]),
        )
        .await
    }

    pub async fn list_tasks(&self, workspace: &str) -> Result<Value> {
        self.send(
            self.client
                .get(format!("{}/tasks", self.base_url))
                .query(&[("workspace", workspace)]),
        )
        .await
    }

    /// Streams `GET /tasks/{id}/events`, printing each Server-Sent Event's
    /// `data:` line as it arrives. Returns once the server closes the
    /// connection or after the first event if `follow` is false.
    pub async fn stream_task_events(&self, id: &str, workspace: &str, follow: bool, mut on_event: impl FnMut(Value)) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/tasks/{id}/events", self.base_url))
            .query(&[("workspace", workspace)])
            .send()
            .await
            .context("failed to connect to event stream")?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("failed to stream task events: {text}");
        }

        let mut stream = response.bytes_stream();
        let mut buffered = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("failed to read event stream chunk")?;
            buffered.push_str(&String::from_utf8_lossy(&chunk));
            for line in buffered.clone().lines() {
                if let Some(json_str) = line.strip_prefix("data: ") {
                    if let Ok(event) = serde_json::from_str::<Value>(json_str) {
                        let is_terminal = matches!(
                            event.get("event_type").and_then(Value::as_str),
                            Some("task.completed") | Some("task.failed") | Some("task.denied")
                        );
                        on_event(event);
                        if is_terminal && !follow {
                            return Ok(());
                        }
                    }
                }
            }
            buffered.clear();
        }
        Ok(())
    }

    pub async fn create_source(&self, payload: Value) -> Result<Value> {
        self.send(self.client.post(format!("{}/sources", self.base_url)).json(&payload)).await
    }

    pub async fn list_sources(&self, workspace: &str) -> Result<Value> {
        self.send(
            self.client
                .get(format!("{}/sources", self.base_url))
                .query(&[("workspace", workspace)]),
        )
        .await
    }

    pub async fn delete_source(&self, id: &str) -> Result<()> {
        self.send(self.client.delete(format!("{}/sources/{id}", self.base_url))).await.map(|_| ())
    }

    pub async fn create_policy(&self, payload: Value) -> Result<Value> {
        self.send(self.client.post(format!("{}/policies", self.base_url)).json(&payload)).await
    }

    pub async fn list_policies(&self, workspace: &str) -> Result<Value> {
        self.send(
            self.client
                .get(format!("{}/policies", self.base_url))
                .query(&[("workspace", workspace)]),
        )
        .await
    }

    pub async fn delete_policy(&self, id: &str) -> Result<()> {
        self.send(self.client.delete(format!("{}/policies/{id}", self.base_url))).await.map(|_| ())
    }

    pub async fn create_credential(&self, payload: Value) -> Result<Value> {
        self.send(self.client.post(format!("{}/credentials", self.base_url)).json(&payload)).await
    }

    pub async fn list_approvals(&self, workspace: &str, status: Option<&str>) -> Result<Value> {
        let mut query = vec![("workspace", workspace.to_string())];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        self.send(self.client.get(format!("{}/approvals", self.base_url)).query(&query)).await
    }

    pub async fn get_approval(&self, id: &str, workspace: &str) -> Result<Value> {
        self.send(
            self.client
                .get(format!("{}/approvals/{id}", self.base_url))
                .query(&[("workspace", workspace)]),
        )
        .await
    }

    pub async fn resolve_approval(&self, id: &str, payload: Value) -> Result<Value> {
        self.send(
            self.client
                .post(format!("{}/approvals/{id}/resolve", self.base_url))
                .json(&payload),
        )
        .await
    }
}
