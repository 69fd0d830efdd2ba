use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::Endpoints;
use crate::error::{ClientError, server_message};
use crate::models::UploadReport;
use crate::page::{Alert, DialogIcon, Page, ToastLevel};
use crate::poller::Sleeper;
use crate::traversal::TraversalError;

pub const FOLDER_UPLOAD_FIELD: &str = "files";
pub const SINGLE_UPLOAD_FIELD: &str = "file";
pub const DEFAULT_ALLOWED_EXTENSIONS: &str = ".pdf,.docx,.xlsx,.pptx,.txt,.dwg";

const FOLDER_RELOAD_DELAY: Duration = Duration::from_millis(1000);
const SINGLE_RELOAD_DELAY: Duration = Duration::from_millis(600);

/// Lower-cased extension of `name` including the dot, e.g. `.docx`.
pub fn file_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(format!(".{}", ext.to_lowercase()))
}

/// Extensions accepted by the single-file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedExtensions(Vec<String>);

impl AllowedExtensions {
    /// Parses a comma separated list such as `.pdf, .DOCX,txt`.
    pub fn parse(raw: &str) -> Self {
        let extensions = raw
            .split(',')
            .map(|ext| ext.trim().to_lowercase())
            .filter(|ext| !ext.is_empty() && ext != ".")
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        Self(extensions)
    }

    /// Like [`AllowedExtensions::parse`], but a list without any usable
    /// entry means the defaults.
    pub fn parse_or_default(raw: &str) -> Self {
        let parsed = Self::parse(raw);
        if parsed.is_empty() {
            Self::default()
        } else {
            parsed
        }
    }

    pub fn allows(&self, filename: &str) -> bool {
        file_extension(filename).is_some_and(|ext| self.0.contains(&ext))
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AllowedExtensions {
    fn default() -> Self {
        Self::parse(DEFAULT_ALLOWED_EXTENSIONS)
    }
}

impl fmt::Display for AllowedExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Rounded percentage, `None` while the total size is unknown.
    pub fn percent(self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let ratio = self.loaded.min(self.total) as f64 / self.total as f64;
        Some((ratio * 100.0).round() as u8)
    }
}

/// Status line and body of a finished upload request, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait NamedFile {
    fn file_name(&self) -> String;

    /// Path below the dropped or picked root; sent as the part's filename
    /// so the backend can recreate sub-folders.
    fn relative_path(&self) -> String {
        self.file_name()
    }
}

/// Sends files as one multipart request.
pub trait UploadTransport {
    type File: NamedFile;

    fn upload<P>(
        &self,
        url: &str,
        field: &str,
        files: Vec<Self::File>,
        on_progress: P,
    ) -> impl Future<Output = Result<RawResponse, ClientError>>
    where
        P: FnMut(UploadProgress) + 'static;
}

/// Progress bar and status line of an upload widget.
pub trait UploadView {
    fn show(&self);
    fn set_progress(&self, percent: u8);
    fn set_status(&self, text: &str);
    fn mark_failed(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("没有可上传的文件")]
    NoFiles,
    #[error("不支持的文件类型: {filename}")]
    Rejected { filename: String },
    #[error("上传失败: {code} {text}")]
    Status {
        code: u16,
        text: String,
        message: Option<String>,
    },
    #[error("上传失败: {0}")]
    Network(ClientError),
    #[error("解析响应失败")]
    Decode,
}

/// Shows why a dropped folder could not be read. Nothing is uploaded.
pub fn show_traversal_failure<V: UploadView>(view: &V, err: &TraversalError) {
    warn!(path = %err.path, reason = %err.reason, "reading dropped folder failed");
    view.show();
    view.mark_failed();
    view.set_status(&format!("读取文件夹失败: {}", err.path));
}

/// Uploads files into a folder as one request and reports per-file results.
/// The page reloads one second after a parsed response.
pub async fn upload_to_folder<T, P, S, V>(
    transport: &T,
    page: &P,
    sleeper: &S,
    view: &V,
    endpoints: &Endpoints,
    folder_id: i64,
    files: Vec<T::File>,
) -> Result<UploadReport, UploadError>
where
    T: UploadTransport,
    P: Page,
    S: Sleeper,
    V: UploadView + Clone + 'static,
{
    if files.is_empty() {
        return Err(UploadError::NoFiles);
    }

    view.show();
    view.set_status(&format!("准备上传 {} 个文件...", files.len()));
    info!(folder_id, files = files.len(), "uploading files");

    let progress_view = view.clone();
    let result = transport
        .upload(
            &endpoints.folder_upload(folder_id),
            FOLDER_UPLOAD_FIELD,
            files,
            move |progress| {
                if let Some(percent) = progress.percent() {
                    progress_view.set_progress(percent);
                    progress_view.set_status(&format!("正在上传... {percent}%"));
                }
            },
        )
        .await;

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            warn!(folder_id, error = %err, "folder upload failed");
            view.set_status("上传失败: 网络错误");
            page.toast(ToastLevel::Error, "上传失败: 网络错误");
            return Err(UploadError::Network(err));
        }
    };

    if !response.is_success() {
        let text = format!("上传失败: {} {}", response.status, response.status_text);
        view.set_status(&text);
        page.toast(ToastLevel::Error, &text);
        return Err(UploadError::Status {
            code: response.status,
            text: response.status_text,
            message: server_message(&response.body),
        });
    }

    let Ok(report) = serde_json::from_str::<UploadReport>(&response.body) else {
        view.set_status("解析响应失败");
        page.toast(ToastLevel::Error, "处理上传响应时发生错误");
        return Err(UploadError::Decode);
    };

    let (succeeded, failed) = (report.success.len(), report.failed.len());
    view.set_status(&format!("上传完成！成功: {succeeded}, 失败: {failed}"));
    page.toast(
        ToastLevel::Success,
        &format!("上传成功：{succeeded} 个文件，失败：{failed} 个文件"),
    );
    for failure in &report.failed {
        warn!(filename = %failure.filename, reason = %failure.reason, "file rejected by server");
    }

    if page.reloads() {
        sleeper.sleep(FOLDER_RELOAD_DELAY).await;
    }
    page.reload();
    Ok(report)
}

/// Uploads one document outside any folder after checking its extension.
pub async fn upload_single<T, P, S, V>(
    transport: &T,
    page: &P,
    sleeper: &S,
    view: &V,
    endpoints: &Endpoints,
    allowed: &AllowedExtensions,
    file: T::File,
) -> Result<(), UploadError>
where
    T: UploadTransport,
    P: Page,
    S: Sleeper,
    V: UploadView + Clone + 'static,
{
    let filename = file.file_name();
    if !allowed.allows(&filename) {
        page.alert(&Alert::new(
            DialogIcon::Error,
            "不支持的文件类型",
            format!("请上传以下格式的文件: {allowed}"),
        ))
        .await;
        return Err(UploadError::Rejected { filename });
    }

    view.show();
    info!(%filename, "uploading document");

    let progress_view = view.clone();
    let result = transport
        .upload(
            &endpoints.single_upload(),
            SINGLE_UPLOAD_FIELD,
            vec![file],
            move |progress| {
                if let Some(percent) = progress.percent() {
                    progress_view.set_progress(percent);
                    progress_view.set_status("上传中...");
                }
            },
        )
        .await;

    let error = match result {
        Ok(response) if response.status == 200 => {
            view.set_progress(100);
            view.set_status("上传完成，正在刷新...");
            if page.reloads() {
                sleeper.sleep(SINGLE_RELOAD_DELAY).await;
            }
            page.reload();
            return Ok(());
        }
        Ok(response) => UploadError::Status {
            code: response.status,
            message: server_message(&response.body),
            text: response.status_text,
        },
        Err(err) => UploadError::Network(err),
    };

    warn!(%filename, error = %error, "document upload failed");
    let message = match &error {
        UploadError::Status {
            message: Some(message),
            ..
        } => message.clone(),
        _ => "上传过程中发生错误".to_string(),
    };
    view.mark_failed();
    view.set_status("上传失败");
    page.alert(&Alert::new(DialogIcon::Error, "上传失败", message))
        .await;
    Err(error)
}
