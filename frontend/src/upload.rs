use chunkgo::traversal::{Entry, EntrySource, TraversalError, flatten};
use chunkgo::upload::{
    AllowedExtensions, NamedFile, UploadView, show_traversal_failure, upload_single,
    upload_to_folder,
};
use js_sys::{Array, Promise, Reflect};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    DragEvent, Element, File, FileList, FileSystemDirectoryEntry, FileSystemDirectoryReader,
    FileSystemEntry, FileSystemFileEntry, HtmlElement, HtmlInputElement,
};

use crate::dom::{
    element_by_id, folder_id_from_path, listen, log_error, set_class_flag, set_display, set_text,
};
use crate::http::XhrUploader;
use crate::page::{BrowserPage, TimerSleeper};

/// A browser file together with its path below the dropped or picked root.
#[derive(Debug, Clone)]
pub struct PickedFile {
    pub file: File,
    pub relative: String,
}

impl PickedFile {
    /// Files from a folder picker carry `webkitRelativePath`; plain picks do
    /// not, and fall back to their name.
    fn from_input(file: File) -> Self {
        let relative = Reflect::get(&file, &"webkitRelativePath".into())
            .ok()
            .and_then(|value| value.as_string())
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| file.name());
        Self { file, relative }
    }
}

impl NamedFile for PickedFile {
    fn file_name(&self) -> String {
        self.file.name()
    }

    fn relative_path(&self) -> String {
        self.relative.clone()
    }
}

fn picked_files(list: Option<FileList>) -> Vec<PickedFile> {
    let Some(list) = list else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|index| list.item(index))
        .map(PickedFile::from_input)
        .collect()
}

/// Dropped directory trees, read through the File and Directory Entries API.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropSource;

fn entry_error(entry: &FileSystemEntry, err: JsValue) -> TraversalError {
    TraversalError::new(entry.full_path(), format!("{err:?}"))
}

/// Runs a success/error callback style call as a future.
async fn callback_promise<F>(start: F) -> Result<JsValue, JsValue>
where
    F: FnOnce(&js_sys::Function, &js_sys::Function),
{
    let mut start = Some(start);
    let promise = Promise::new(&mut |resolve, reject| {
        if let Some(start) = start.take() {
            start(&resolve, &reject);
        }
    });
    JsFuture::from(promise).await
}

impl EntrySource for DropSource {
    type FileEntry = FileSystemFileEntry;
    type DirEntry = FileSystemDirectoryEntry;
    type Reader = (FileSystemDirectoryEntry, FileSystemDirectoryReader);
    type File = PickedFile;

    fn reader(&self, dir: &FileSystemDirectoryEntry) -> Self::Reader {
        (dir.clone(), dir.create_reader())
    }

    async fn read_page(
        &self,
        reader: &mut Self::Reader,
    ) -> Result<Vec<Entry<FileSystemFileEntry, FileSystemDirectoryEntry>>, TraversalError> {
        let (dir, reader) = reader;
        let page = callback_promise(|ok, err| {
            if let Err(thrown) = reader.read_entries_with_callback_and_callback(ok, err) {
                let _ = err.call1(&JsValue::NULL, &thrown);
            }
        })
        .await
        .map_err(|err| entry_error(dir, err))?;
        Ok(Array::from(&page)
            .iter()
            .filter_map(|value| value.dyn_into::<FileSystemEntry>().ok())
            .filter_map(classify)
            .collect())
    }

    async fn file(&self, entry: FileSystemFileEntry) -> Result<PickedFile, TraversalError> {
        let file = callback_promise(|ok, err| {
            entry.file_with_callback_and_callback(ok, err);
        })
        .await
        .and_then(|value| value.dyn_into::<File>())
        .map_err(|err| entry_error(&entry, err))?;
        Ok(PickedFile {
            relative: entry.full_path().trim_start_matches('/').to_string(),
            file,
        })
    }
}

fn classify(entry: FileSystemEntry) -> Option<Entry<FileSystemFileEntry, FileSystemDirectoryEntry>> {
    if entry.is_directory() {
        entry.dyn_into::<FileSystemDirectoryEntry>().ok().map(Entry::Directory)
    } else if entry.is_file() {
        entry.dyn_into::<FileSystemFileEntry>().ok().map(Entry::File)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
struct DomUploadView {
    container: HtmlElement,
    bar: HtmlElement,
    status: Element,
}

impl DomUploadView {
    fn from_page() -> Option<Self> {
        Some(Self {
            container: element_by_id("progressContainer")?,
            bar: element_by_id("uploadProgress")?,
            status: element_by_id("uploadStatus")?,
        })
    }
}

impl UploadView for DomUploadView {
    fn show(&self) {
        set_display(&self.container, true);
    }

    fn set_progress(&self, percent: u8) {
        let _ = self.bar.style().set_property("width", &format!("{percent}%"));
        set_text(&self.bar, format!("{percent}%"));
        let _ = self.bar.set_attribute("aria-valuenow", &percent.to_string());
    }

    fn set_status(&self, text: &str) {
        set_text(&self.status, text);
    }

    fn mark_failed(&self) {
        set_class_flag(&self.bar, "bg-danger", true);
    }
}

/// Where picked or dropped files go.
#[derive(Debug, Clone)]
enum Target {
    Folder(i64),
    /// The document list page: one file at a time, extension checked first.
    Single(AllowedExtensions),
}

impl Target {
    fn from_page() -> Option<Self> {
        if let Some(marker) = element_by_id::<Element>("allowedExtensions") {
            let raw = marker.get_attribute("data-extensions").unwrap_or_default();
            return Some(Self::Single(AllowedExtensions::parse_or_default(&raw)));
        }
        folder_id_from_path().map(Self::Folder)
    }
}

fn start_upload(target: Target, view: DomUploadView, files: Vec<PickedFile>) {
    if files.is_empty() {
        return;
    }
    spawn_local(async move {
        let transport = XhrUploader;
        let endpoints = chunkgo::api::Endpoints::default();
        let result = match target {
            Target::Folder(folder_id) => upload_to_folder(
                &transport,
                &BrowserPage,
                &TimerSleeper,
                &view,
                &endpoints,
                folder_id,
                files,
            )
            .await
            .map(|report| {
                if !report.failed.is_empty() {
                    let lines: Vec<String> = report
                        .failed
                        .iter()
                        .map(|failed| format!("- {}: {}", failed.filename, failed.reason))
                        .collect();
                    log_error(&format!("上传失败的文件:\n{}", lines.join("\n")));
                }
            }),
            Target::Single(allowed) => {
                let Some(file) = files.into_iter().next() else {
                    return;
                };
                upload_single(
                    &transport,
                    &BrowserPage,
                    &TimerSleeper,
                    &view,
                    &endpoints,
                    &allowed,
                    file,
                )
                .await
            }
        };
        if let Err(err) = result {
            log_error(&format!("upload failed: {err}"));
        }
    });
}

/// Wires the drop zone and the file/folder pickers of an upload widget.
pub fn init_upload_widget() {
    let (Some(view), Some(target)) = (DomUploadView::from_page(), Target::from_page()) else {
        return;
    };
    let file_input = element_by_id::<HtmlInputElement>("fileInput");
    let folder_input = element_by_id::<HtmlInputElement>("folderInput");

    for (button_id, input) in [
        ("browseButton", file_input.clone()),
        ("browseFolderButton", folder_input.clone()),
    ] {
        let (Some(button), Some(input)) = (element_by_id::<HtmlElement>(button_id), input) else {
            continue;
        };
        listen(&button, "click", move |event| {
            event.prevent_default();
            event.stop_propagation();
            input.click();
        });
    }

    for input in [file_input.clone(), folder_input].into_iter().flatten() {
        let (target, view, source) = (target.clone(), view.clone(), input.clone());
        listen(&input, "change", move |_event| {
            let files = picked_files(source.files());
            source.set_value("");
            start_upload(target.clone(), view.clone(), files);
        });
    }

    let Some(zone) = element_by_id::<HtmlElement>("dropZone") else {
        return;
    };
    if let (Target::Single(_), Some(input)) = (&target, file_input) {
        listen(&zone, "click", move |_event| input.click());
    }
    for name in ["dragenter", "dragover"] {
        let zone_ref = zone.clone();
        listen(&zone, name, move |event| {
            event.prevent_default();
            event.stop_propagation();
            set_class_flag(&zone_ref, "drop-zone-active", true);
        });
    }
    {
        let zone_ref = zone.clone();
        listen(&zone, "dragleave", move |event| {
            event.prevent_default();
            set_class_flag(&zone_ref, "drop-zone-active", false);
        });
    }
    let zone_ref = zone.clone();
    listen(&zone, "drop", move |event| {
        event.prevent_default();
        event.stop_propagation();
        set_class_flag(&zone_ref, "drop-zone-active", false);
        let Ok(event) = event.dyn_into::<DragEvent>() else {
            return;
        };
        let (target, view) = (target.clone(), view.clone());
        match dropped_roots(&event) {
            Some(roots) => spawn_local(async move {
                match flatten(&DropSource, roots).await {
                    Ok(files) => start_upload(target, view, files),
                    Err(err) => {
                        log_error(&err.to_string());
                        show_traversal_failure(&view, &err);
                    }
                }
            }),
            None => {
                let files =
                    picked_files(event.data_transfer().and_then(|transfer| transfer.files()));
                start_upload(target, view, files);
            }
        }
    });
}

/// Entries have to be taken while the drop event is dispatched; browsers
/// without entry support yield `None`.
fn dropped_roots(
    event: &DragEvent,
) -> Option<Vec<Entry<FileSystemFileEntry, FileSystemDirectoryEntry>>> {
    let items = event.data_transfer()?.items();
    let roots: Vec<_> = (0..items.length())
        .filter_map(|index| items.get(index))
        .filter_map(|item| item.webkit_get_as_entry().ok().flatten())
        .filter_map(classify)
        .collect();
    (!roots.is_empty()).then_some(roots)
}
