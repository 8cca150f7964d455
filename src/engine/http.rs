//! HTTP implementation of the data-engine seam.
//!
//! Talks to a warehouse REST gateway:
//! - `GET  /v1/datasets/{dataset}/tables`        -> `{"tables": [..]}`
//! - `GET  /v1/tables/{table}/schema`            -> `{"columns": [..]}`
//! - `POST /v1/queries`                          -> `{"rows": [..]}`
//! - `POST /v1/jobs`                             -> `{"id", "location"}`
//! - `GET  /v1/jobs/{location}/{id}`             -> `{"state", "error"?}`
//!
//! Every call is wrapped in a timeout so a slow warehouse cannot hang a turn.

use super::{ColumnInfo, DataEngine, JobHandle, JobState, Row, WriteMode};
use crate::errors::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct HttpEngine {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    call_timeout: Duration,
}

#[derive(Deserialize)]
struct TablesResponse {
    tables: Vec<String>,
}

#[derive(Deserialize)]
struct SchemaResponse {
    columns: Vec<ColumnInfo>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    sql: &'a str,
    max_rows: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Serialize)]
struct JobRequest<'a> {
    sql: &'a str,
    destination: &'a str,
    write_mode: WriteMode,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    state: String,
    #[serde(default)]
    error: Option<JobErrorBody>,
}

#[derive(Deserialize)]
struct JobErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl HttpEngine {
    pub fn new(base_url: &str, token: Option<String>, call_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            call_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Run a request under the call timeout, mapping transport-level failures.
    async fn send(
        &self,
        operation: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, EngineError> {
        let fut = self.authorize(req).send();
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(EngineError::Transport {
                message: e.to_string(),
            }),
            Err(_) => Err(EngineError::Timeout {
                operation: operation.to_string(),
                secs: self.call_timeout.as_secs(),
            }),
        }
    }

    /// Extract the server's error message, falling back to the HTTP status.
    async fn error_message(resp: reqwest::Response) -> String {
        let status = resp.status();
        match resp.json::<ErrorBody>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => format!("HTTP {}", status),
        }
    }
}

#[async_trait]
impl DataEngine for HttpEngine {
    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>, EngineError> {
        let url = self.url(&format!("/v1/datasets/{}/tables", dataset));
        let resp = self.send("list_tables", self.client.get(&url)).await?;

        if !resp.status().is_success() {
            return Err(EngineError::Transport {
                message: Self::error_message(resp).await,
            });
        }

        let body: TablesResponse = resp.json().await.map_err(|e| EngineError::Transport {
            message: e.to_string(),
        })?;
        Ok(body.tables)
    }

    async fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>, EngineError> {
        let url = self.url(&format!("/v1/tables/{}/schema", table));
        let resp = self.send("table_schema", self.client.get(&url)).await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound {
                table: table.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(EngineError::Transport {
                message: Self::error_message(resp).await,
            });
        }

        let body: SchemaResponse = resp.json().await.map_err(|e| EngineError::Transport {
            message: e.to_string(),
        })?;
        Ok(body.columns)
    }

    async fn run_query(&self, sql: &str, row_limit: usize) -> Result<Vec<Row>, EngineError> {
        let url = self.url("/v1/queries");
        let req = self.client.post(&url).json(&QueryRequest {
            sql,
            max_rows: row_limit,
        });
        let resp = self.send("run_query", req).await?;

        // 4xx from the query endpoint means the SQL itself was rejected.
        if resp.status().is_client_error() {
            return Err(EngineError::Query {
                message: Self::error_message(resp).await,
            });
        }
        if !resp.status().is_success() {
            return Err(EngineError::Transport {
                message: Self::error_message(resp).await,
            });
        }

        let body: QueryResponse = resp.json().await.map_err(|e| EngineError::Transport {
            message: e.to_string(),
        })?;
        Ok(body.rows)
    }

    async fn submit_job(
        &self,
        sql: &str,
        destination: &str,
        write_mode: WriteMode,
    ) -> Result<JobHandle, EngineError> {
        let url = self.url("/v1/jobs");
        let req = self.client.post(&url).json(&JobRequest {
            sql,
            destination,
            write_mode,
        });
        let resp = self.send("submit_job", req).await?;

        if !resp.status().is_success() {
            return Err(EngineError::Submission {
                message: Self::error_message(resp).await,
            });
        }

        let handle: JobHandle = resp.json().await.map_err(|e| EngineError::Submission {
            message: e.to_string(),
        })?;
        tracing::info!(job_id = %handle.id, location = %handle.location, "job submitted");
        Ok(handle)
    }

    async fn poll_job(&self, handle: &JobHandle) -> Result<JobState, EngineError> {
        let url = self.url(&format!("/v1/jobs/{}/{}", handle.location, handle.id));
        let resp = self.send("poll_job", self.client.get(&url)).await?;

        if !resp.status().is_success() {
            return Err(EngineError::Transport {
                message: Self::error_message(resp).await,
            });
        }

        let body: JobStatusResponse = resp.json().await.map_err(|e| EngineError::Transport {
            message: e.to_string(),
        })?;

        let state = match body.state.as_str() {
            "DONE" => match body.error {
                Some(err) => JobState::Failed(err.message),
                None => JobState::Succeeded,
            },
            _ => JobState::Running,
        };
        Ok(state)
    }
}
