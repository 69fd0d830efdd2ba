use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ChunkGoApi, Endpoints};
use crate::config::AppConfig;
use crate::error::ClientError;
use crate::fs_tree::LocalFile;
use crate::models::{
    BatchJobRequest, BatchSubmitResponse, ChunkStatus, ChunkSubmitResponse, ConnectionCheck,
    DeleteResponse, KnowledgeBaseList, StrategyList, TaskStatus,
};
use crate::upload::{NamedFile, RawResponse, UploadProgress, UploadTransport};
use crate::validation::ChunkParams;

/// Backend client for the headless binary.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    endpoints: Endpoints,
    request_timeout: Duration,
    chunk_submit_timeout: Duration,
}

impl HttpClient {
    pub fn new(
        endpoints: Endpoints,
        request_timeout: Duration,
        chunk_submit_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("chunkgo/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed building http client")?;
        Ok(Self {
            client,
            endpoints,
            request_timeout,
            chunk_submit_timeout,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Self::new(
            cfg.endpoints(),
            cfg.request_timeout(),
            cfg.chunk_submit_timeout(),
        )
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        request.send().await.map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(err.to_string())
    }
}

async fn read_body(response: Response) -> Result<(u16, String, String), ClientError> {
    let status = response.status();
    let text = status.canonical_reason().unwrap_or_default().to_string();
    let body = response.text().await.map_err(transport_error)?;
    Ok((status.as_u16(), text, body))
}

/// Decodes the body whatever the status; only an undecodable error body is
/// reported as [`ClientError::Status`].
async fn json_any_status<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let (code, text, body) = read_body(response).await?;
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(_) if !(200..300).contains(&code) => Err(ClientError::Status { code, text, body }),
        Err(err) => Err(ClientError::Decode(err.to_string())),
    }
}

async fn json_ok<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let (code, text, body) = read_body(response).await?;
    if !(200..300).contains(&code) {
        return Err(ClientError::Status { code, text, body });
    }
    serde_json::from_str(&body).map_err(|err| ClientError::Decode(err.to_string()))
}

impl ChunkGoApi for HttpClient {
    async fn submit_batch(
        &self,
        folder_id: i64,
        request: &BatchJobRequest,
    ) -> Result<BatchSubmitResponse, ClientError> {
        let url = self.endpoints.batch_submit(folder_id, request);
        debug!(%url, "POST batch job");
        let response = self.send(self.client.post(&url).json(request)).await?;
        json_any_status(response).await
    }

    /// Not bounded by the request timeout; a batch watch waits for every
    /// answer.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, ClientError> {
        let response = self
            .send(self.client.get(self.endpoints.task(task_id)))
            .await?;
        json_any_status(response).await
    }

    async fn test_dify_connection(&self) -> Result<ConnectionCheck, ClientError> {
        let response = self
            .send(
                self.client
                    .get(self.endpoints.dify_test_connection())
                    .timeout(self.request_timeout),
            )
            .await?;
        json_any_status(response).await
    }

    async fn knowledge_bases(&self) -> Result<KnowledgeBaseList, ClientError> {
        let response = self
            .send(
                self.client
                    .get(self.endpoints.dify_knowledge_bases())
                    .timeout(self.request_timeout),
            )
            .await?;
        json_any_status(response).await
    }

    async fn strategies_for(&self, file_ext: &str) -> Result<StrategyList, ClientError> {
        let response = self
            .send(
                self.client
                    .get(self.endpoints.strategies_for_filetype())
                    .query(&[("file_ext", file_ext)])
                    .timeout(self.request_timeout),
            )
            .await?;
        json_ok(response).await
    }

    async fn submit_document_chunk(
        &self,
        document_id: i64,
        params: &ChunkParams,
    ) -> Result<ChunkSubmitResponse, ClientError> {
        let form = Form::new()
            .text("chunk_strategy", params.strategy.clone())
            .text("chunk_size", params.chunk_size.to_string())
            .text("overlap", params.overlap.to_string());
        let response = self
            .send(
                self.client
                    .post(self.endpoints.document_chunk(document_id))
                    .timeout(self.chunk_submit_timeout)
                    .multipart(form),
            )
            .await?;
        json_ok(response).await
    }

    async fn chunk_status(&self, document_id: i64) -> Result<ChunkStatus, ClientError> {
        let response = self
            .send(
                self.client
                    .get(self.endpoints.document_chunk_status(document_id))
                    .timeout(self.request_timeout),
            )
            .await?;
        json_any_status(response).await
    }

    async fn delete_document(&self, document_id: i64) -> Result<DeleteResponse, ClientError> {
        let response = self
            .send(
                self.client
                    .delete(self.endpoints.document(document_id))
                    .timeout(self.request_timeout),
            )
            .await?;
        json_any_status(response).await
    }
}

impl UploadTransport for HttpClient {
    type File = LocalFile;

    /// Progress counts bytes staged into the multipart body; the final
    /// report comes once the server answered.
    async fn upload<P>(
        &self,
        url: &str,
        field: &str,
        files: Vec<LocalFile>,
        mut on_progress: P,
    ) -> Result<RawResponse, ClientError>
    where
        P: FnMut(UploadProgress) + 'static,
    {
        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            let bytes = tokio::fs::read(&file.path).await.map_err(|err| {
                ClientError::Transport(format!("failed reading {}: {err}", file.path.display()))
            })?;
            staged.push((file.relative_path(), bytes));
        }

        let total: u64 = staged.iter().map(|(_, bytes)| bytes.len() as u64).sum();
        let mut loaded = 0;
        let mut form = Form::new();
        for (relative, bytes) in staged {
            loaded += bytes.len() as u64;
            form = form.part(field.to_string(), Part::bytes(bytes).file_name(relative));
            on_progress(UploadProgress {
                loaded: loaded.min(total.saturating_sub(1)),
                total,
            });
        }

        debug!(%url, bytes = total, "POST multipart upload");
        let response = self.send(self.client.post(url).multipart(form)).await?;
        let (status, status_text, body) = read_body(response).await?;
        on_progress(UploadProgress { loaded: total, total });
        Ok(RawResponse {
            status,
            status_text,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::batch::{JobWatch, WatchOutcome, poll_batch_task};
    use crate::models::{BatchKind, JobState};
    use crate::testing::{FakeControl, FakePage, InstantSleeper, PageEvent};

    /// Answers one request per body, holding the first answer back.
    async fn serve(bodies: Vec<&'static str>, first_delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (index, body) in bodies.into_iter().enumerate() {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    let read = socket.read(&mut buf).await.unwrap();
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..read]);
                }
                if index == 0 {
                    tokio::time::sleep(first_delay).await;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn client(base: &str, timeout: Duration) -> HttpClient {
        HttpClient::new(Endpoints::new(base, "/chunkgo", "/chunklab"), timeout, timeout).unwrap()
    }

    #[tokio::test]
    async fn slow_task_status_keeps_the_batch_watch_alive() {
        let base = serve(
            vec![
                r#"{"status": "processing", "name": "批量切块", "success_count": 1}"#,
                r#"{"status": "completed", "name": "批量切块", "success_count": 4, "total_count": 4}"#,
            ],
            Duration::from_millis(400),
        )
        .await;
        let api = client(&base, Duration::from_millis(100));
        let page = FakePage::default();

        let outcome = poll_batch_task(
            &api,
            &page,
            &InstantSleeper::default(),
            &FakeControl::default(),
            JobWatch::new(BatchKind::Chunk, "T").interval(Duration::from_millis(10)),
        )
        .await;

        let status = match outcome {
            WatchOutcome::Finished(status) => status,
            other => panic!("watch ended with {other:?}"),
        };
        assert_eq!(status.status, JobState::Completed);
        assert_eq!(status.success_count, 4);
        assert_eq!(
            page.events(),
            vec![
                PageEvent::Alert {
                    title: "任务已完成：批量切块".into(),
                    text: "成功: 4，失败: 0".into(),
                    timer: Some(Duration::from_millis(3000)),
                },
                PageEvent::Reload,
            ]
        );
    }

    #[tokio::test]
    async fn document_status_query_stays_bounded() {
        let base = serve(
            vec![r#"{"status": "processing", "progress": 20}"#],
            Duration::from_millis(400),
        )
        .await;
        let api = client(&base, Duration::from_millis(100));

        let err = api.chunk_status(5).await.unwrap_err();

        assert_eq!(err, ClientError::Timeout);
    }
}
