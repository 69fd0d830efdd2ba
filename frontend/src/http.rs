use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use chunkgo::api::{ChunkGoApi, Endpoints};
use chunkgo::error::ClientError;
use chunkgo::models::{
    BatchJobRequest, BatchSubmitResponse, ChunkStatus, ChunkSubmitResponse, ConnectionCheck,
    DeleteResponse, KnowledgeBaseList, StrategyList, TaskStatus,
};
use chunkgo::upload::{NamedFile, RawResponse, UploadProgress, UploadTransport};
use chunkgo::validation::ChunkParams;
use futures::channel::oneshot;
use gloo_net::http::{Request, RequestBuilder, Response};
use gloo_timers::callback::Timeout;
use serde::de::DeserializeOwned;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{AbortController, FormData, ProgressEvent, XmlHttpRequest};

use crate::upload::PickedFile;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const CHUNK_SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Aborts a request once its timeout runs out and remembers that it did, so
/// the abort is reported as [`ClientError::Timeout`].
struct Deadline {
    controller: AbortController,
    expired: Rc<Cell<bool>>,
    _timer: Timeout,
}

impl Deadline {
    fn start(timeout: Duration) -> Result<Self, ClientError> {
        let controller = AbortController::new()
            .map_err(|_| ClientError::Transport("AbortController unavailable".into()))?;
        let expired = Rc::new(Cell::new(false));
        let timer = {
            let controller = controller.clone();
            let expired = expired.clone();
            Timeout::new(timeout.as_millis() as u32, move || {
                expired.set(true);
                controller.abort();
            })
        };
        Ok(Self {
            controller,
            expired,
            _timer: timer,
        })
    }

    fn arm(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.abort_signal(Some(&self.controller.signal()))
    }

    fn error(&self, err: gloo_net::Error) -> ClientError {
        if self.expired.get() {
            ClientError::Timeout
        } else {
            transport_error(err)
        }
    }

    async fn json_any_status<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, ClientError> {
        decode_any_status(read_body(response, |err| self.error(err)).await?)
    }

    async fn json_ok<T: DeserializeOwned>(&self, response: Response) -> Result<T, ClientError> {
        decode_ok(read_body(response, |err| self.error(err)).await?)
    }
}

fn transport_error(err: gloo_net::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

type Body = (u16, String, String);

async fn read_body<E>(response: Response, on_error: E) -> Result<Body, ClientError>
where
    E: FnOnce(gloo_net::Error) -> ClientError,
{
    let code = response.status();
    let text = response.status_text();
    let body = response.text().await.map_err(on_error)?;
    Ok((code, text, body))
}

fn decode_any_status<T: DeserializeOwned>((code, text, body): Body) -> Result<T, ClientError> {
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(_) if !(200..300).contains(&code) => Err(ClientError::Status { code, text, body }),
        Err(err) => Err(ClientError::Decode(err.to_string())),
    }
}

fn decode_ok<T: DeserializeOwned>((code, text, body): Body) -> Result<T, ClientError> {
    if !(200..300).contains(&code) {
        return Err(ClientError::Status { code, text, body });
    }
    serde_json::from_str(&body).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Same-origin backend client built on `fetch`.
#[derive(Debug, Clone, Default)]
pub struct FetchApi {
    endpoints: Endpoints,
}

impl FetchApi {
    /// GET whose body is decoded whatever the status.
    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        let deadline = Deadline::start(REQUEST_TIMEOUT)?;
        let response = deadline
            .arm(Request::get(url))
            .send()
            .await
            .map_err(|err| deadline.error(err))?;
        deadline.json_any_status(response).await
    }
}

impl ChunkGoApi for FetchApi {
    async fn submit_batch(
        &self,
        folder_id: i64,
        request: &BatchJobRequest,
    ) -> Result<BatchSubmitResponse, ClientError> {
        let response = Request::post(&self.endpoints.batch_submit(folder_id, request))
            .json(request)
            .map_err(transport_error)?
            .send()
            .await
            .map_err(transport_error)?;
        decode_any_status(read_body(response, transport_error).await?)
    }

    /// Unbounded, like the submit: a batch watch waits for every answer.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, ClientError> {
        let response = Request::get(&self.endpoints.task(task_id))
            .send()
            .await
            .map_err(transport_error)?;
        decode_any_status(read_body(response, transport_error).await?)
    }

    async fn test_dify_connection(&self) -> Result<ConnectionCheck, ClientError> {
        self.get(&self.endpoints.dify_test_connection()).await
    }

    async fn knowledge_bases(&self) -> Result<KnowledgeBaseList, ClientError> {
        self.get(&self.endpoints.dify_knowledge_bases()).await
    }

    async fn strategies_for(&self, file_ext: &str) -> Result<StrategyList, ClientError> {
        let deadline = Deadline::start(REQUEST_TIMEOUT)?;
        let response = deadline
            .arm(Request::get(&self.endpoints.strategies_for_filetype()))
            .query([("file_ext", file_ext)])
            .send()
            .await
            .map_err(|err| deadline.error(err))?;
        deadline.json_ok(response).await
    }

    async fn submit_document_chunk(
        &self,
        document_id: i64,
        params: &ChunkParams,
    ) -> Result<ChunkSubmitResponse, ClientError> {
        let form = FormData::new().map_err(|_| ClientError::Transport("FormData unavailable".into()))?;
        let _ = form.append_with_str("chunk_strategy", &params.strategy);
        let _ = form.append_with_str("chunk_size", &params.chunk_size.to_string());
        let _ = form.append_with_str("overlap", &params.overlap.to_string());

        let deadline = Deadline::start(CHUNK_SUBMIT_TIMEOUT)?;
        let response = deadline
            .arm(Request::post(&self.endpoints.document_chunk(document_id)))
            .body(form)
            .map_err(|err| ClientError::Transport(err.to_string()))?
            .send()
            .await
            .map_err(|err| deadline.error(err))?;
        deadline.json_ok(response).await
    }

    async fn chunk_status(&self, document_id: i64) -> Result<ChunkStatus, ClientError> {
        self.get(&self.endpoints.document_chunk_status(document_id)).await
    }

    async fn delete_document(&self, document_id: i64) -> Result<DeleteResponse, ClientError> {
        let deadline = Deadline::start(REQUEST_TIMEOUT)?;
        let response = deadline
            .arm(Request::delete(&self.endpoints.document(document_id)))
            .send()
            .await
            .map_err(|err| deadline.error(err))?;
        deadline.json_any_status(response).await
    }
}

/// Multipart uploads through `XMLHttpRequest`, the only browser API that
/// reports upload progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct XhrUploader;

fn js_error(context: &str) -> impl Fn(wasm_bindgen::JsValue) -> ClientError + '_ {
    move |err| ClientError::Transport(format!("{context}: {err:?}"))
}

impl UploadTransport for XhrUploader {
    type File = PickedFile;

    async fn upload<P>(
        &self,
        url: &str,
        field: &str,
        files: Vec<PickedFile>,
        mut on_progress: P,
    ) -> Result<RawResponse, ClientError>
    where
        P: FnMut(UploadProgress) + 'static,
    {
        let form = FormData::new().map_err(js_error("FormData unavailable"))?;
        for file in &files {
            form.append_with_blob_and_filename(field, &file.file, &file.relative_path())
                .map_err(js_error("failed adding file"))?;
        }

        let xhr = XmlHttpRequest::new().map_err(js_error("XMLHttpRequest unavailable"))?;
        xhr.open_with_async("POST", url, true)
            .map_err(js_error("failed opening request"))?;

        let progress = Closure::<dyn FnMut(ProgressEvent)>::new(move |event: ProgressEvent| {
            if event.length_computable() {
                on_progress(UploadProgress {
                    loaded: event.loaded() as u64,
                    total: event.total() as u64,
                });
            }
        });
        xhr.upload()
            .map_err(js_error("upload progress unavailable"))?
            .set_onprogress(Some(progress.as_ref().unchecked_ref()));

        let (done_tx, done_rx) = oneshot::channel::<bool>();
        let done_tx = Rc::new(RefCell::new(Some(done_tx)));
        let finish = |loaded: bool| {
            let done_tx = done_tx.clone();
            Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
                if let Some(tx) = done_tx.borrow_mut().take() {
                    let _ = tx.send(loaded);
                }
            })
        };
        let on_load = finish(true);
        let on_error = finish(false);
        xhr.set_onload(Some(on_load.as_ref().unchecked_ref()));
        xhr.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        xhr.set_onabort(Some(on_error.as_ref().unchecked_ref()));

        xhr.send_with_opt_form_data(Some(&form))
            .map_err(js_error("failed sending upload"))?;
        let loaded = done_rx.await.unwrap_or(false);

        xhr.set_onload(None);
        xhr.set_onerror(None);
        xhr.set_onabort(None);
        if let Ok(upload) = xhr.upload() {
            upload.set_onprogress(None);
        }
        drop((progress, on_load, on_error));

        if !loaded {
            return Err(ClientError::Transport("network error".into()));
        }
        Ok(RawResponse {
            status: xhr.status().unwrap_or_default(),
            status_text: xhr.status_text().unwrap_or_default(),
            body: xhr.response_text().ok().flatten().unwrap_or_default(),
        })
    }
}
