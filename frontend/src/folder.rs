//! Folder and document-list pages: selection, batch jobs, the Dify panel
//! and deletion.

use std::rc::Rc;

use chunkgo::batch::{
    BatchAction, BatchControl, BatchPhase, JobWatch, TriggerOutcome, WatchOutcome, trigger_batch,
    watch_batch_job,
};
use chunkgo::delete::{DocumentRows, delete_document, delete_documents};
use chunkgo::dify::{ConnectionPanel, connect};
use chunkgo::models::KnowledgeBase;
use chunkgo::selection::{
    Checkbox, apply_toggle, deselect_all, select_all, selected_enabled_ids, selected_ids,
};
use chunkgo::validation::ChunkForm;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Element, HtmlButtonElement, HtmlElement, HtmlInputElement, HtmlOptionElement,
    HtmlSelectElement,
};

use crate::dom::{
    element_by_id, folder_id_from_path, listen, log_error, query_all, set_class_flag,
    web_document,
};
use crate::http::FetchApi;
use crate::page::{BrowserPage, TimerSleeper};

const BUSY_HTML: &str = r#"<i class="fas fa-spinner fa-spin me-2"></i>处理中..."#;
const CONNECTING_HTML: &str = r#"<i class="fas fa-spinner fa-spin me-2"></i>正在连接..."#;
const CONNECT_HTML: &str = r#"<i class="fas fa-plug me-2"></i>测试连接"#;
const CONNECTED_HTML: &str = r#"<i class="fas fa-check-circle me-2"></i>连接成功"#;
const NOT_ELIGIBLE_TITLE: &str = "该文档未完成切块或正在推送中，无法选择";

struct DocumentCheckbox(HtmlInputElement);

impl Checkbox for DocumentCheckbox {
    fn is_checked(&self) -> bool {
        self.0.checked()
    }

    fn set_checked(&self, checked: bool) {
        self.0.set_checked(checked);
    }

    fn is_disabled(&self) -> bool {
        self.0.disabled()
    }

    fn value(&self) -> String {
        self.0.value()
    }
}

fn document_checkboxes() -> Vec<DocumentCheckbox> {
    query_all::<HtmlInputElement>(".document-checkbox")
        .into_iter()
        .map(DocumentCheckbox)
        .collect()
}

/// Value of a form control, whether it is an input or a select.
fn field_value(id: &str) -> String {
    if let Some(input) = element_by_id::<HtmlInputElement>(id) {
        return input.value();
    }
    element_by_id::<HtmlSelectElement>(id)
        .map(|select| select.value())
        .unwrap_or_default()
}

/// A batch trigger button; its markup is restored when the job is refused.
#[derive(Debug, Clone)]
struct ButtonControl {
    button: HtmlButtonElement,
    idle_html: String,
}

impl ButtonControl {
    fn new(button: HtmlButtonElement) -> Self {
        let idle_html = button.inner_html();
        Self { button, idle_html }
    }
}

impl BatchControl for ButtonControl {
    fn show_phase(&self, phase: &BatchPhase) {
        match phase {
            BatchPhase::Idle => {
                self.button.set_disabled(false);
                self.button.set_inner_html(&self.idle_html);
            }
            BatchPhase::Submitting | BatchPhase::Processing { .. } => {
                self.button.set_disabled(true);
                self.button.set_inner_html(BUSY_HTML);
            }
            BatchPhase::Completed | BatchPhase::Failed => {}
        }
    }
}

async fn run_batch(folder_id: i64, control: ButtonControl, action: BatchAction) {
    let api = FetchApi::default();
    let selected = selected_ids(&document_checkboxes());
    let outcome = trigger_batch(&api, &BrowserPage, &control, folder_id, selected, &action).await;
    let TriggerOutcome::Started { task_id } = outcome else {
        return;
    };
    let watch = JobWatch::new(action.kind(), task_id);
    if let WatchOutcome::Aborted(err) =
        watch_batch_job(&api, &BrowserPage, &TimerSleeper, &control, watch).await
    {
        log_error(&format!("轮询任务状态失败: {err}"));
    }
}

fn init_batch_trigger<F>(button_id: &str, folder_id: i64, read_action: F)
where
    F: Fn() -> BatchAction + 'static,
{
    let Some(button) = element_by_id::<HtmlButtonElement>(button_id) else {
        return;
    };
    let control = ButtonControl::new(button.clone());
    listen(&button, "click", move |_event| {
        spawn_local(run_batch(folder_id, control.clone(), read_action()));
    });
}

struct DifyPanel {
    test_button: HtmlButtonElement,
    select: Option<HtmlSelectElement>,
    push_button: Option<HtmlButtonElement>,
}

impl ConnectionPanel for DifyPanel {
    fn set_connecting(&self) {
        self.test_button.set_disabled(true);
        self.test_button.set_inner_html(CONNECTING_HTML);
    }

    fn restore(&self) {
        self.test_button.set_disabled(false);
        self.test_button.set_inner_html(CONNECT_HTML);
    }

    fn show_knowledge_bases(&self, bases: &[KnowledgeBase]) {
        if let Some(select) = &self.select {
            select.set_inner_html("");
            if let Some(placeholder) = option("", "请选择知识库") {
                placeholder.set_disabled(true);
                placeholder.set_selected(true);
                let _ = select.append_child(&placeholder);
            }
            for base in bases {
                if let Some(entry) = option(&base.id, &base.name) {
                    let _ = select.append_child(&entry);
                }
            }
        }
        if let Some(push) = &self.push_button {
            push.set_disabled(false);
        }
        self.test_button.set_disabled(false);
        self.test_button.set_inner_html(CONNECTED_HTML);
        set_class_flag(&self.test_button, "btn-outline-primary", false);
        set_class_flag(&self.test_button, "btn-success", true);
    }
}

fn option(value: &str, text: &str) -> Option<HtmlOptionElement> {
    let option = web_document()?
        .create_element("option")
        .ok()?
        .dyn_into::<HtmlOptionElement>()
        .ok()?;
    option.set_value(value);
    option.set_text(text);
    Some(option)
}

fn init_dify_panel() {
    let Some(test_button) = element_by_id::<HtmlButtonElement>("testConnectionBtn") else {
        return;
    };
    let listener_target = test_button.clone();
    let panel = Rc::new(DifyPanel {
        test_button,
        select: element_by_id("difyKnowledgeBase"),
        push_button: element_by_id("startBatchDifyBtn"),
    });
    listen(&listener_target, "click", move |_event| {
        let panel = panel.clone();
        spawn_local(async move {
            connect(&FetchApi::default(), &BrowserPage, &*panel).await;
        });
    });
}

struct ListingRows;

impl DocumentRows for ListingRows {
    fn remove_row(&self, document_id: i64) -> bool {
        let row = web_document()
            .and_then(|doc| {
                doc.query_selector(&format!(".document-item input[value=\"{document_id}\"]"))
                    .ok()
                    .flatten()
            })
            .and_then(|input| input.closest(".document-item").ok().flatten());
        match row {
            Some(row) => {
                row.remove();
                true
            }
            None => false,
        }
    }
}

fn init_delete_buttons() {
    for button in query_all::<Element>(".delete-doc-btn") {
        let Some(document_id) = button
            .get_attribute("data-doc-id")
            .and_then(|raw| raw.trim().parse::<i64>().ok())
        else {
            continue;
        };
        let name = button.get_attribute("data-doc-name").unwrap_or_default();
        listen(&button, "click", move |_event| {
            let name = name.clone();
            spawn_local(async move {
                delete_document(&FetchApi::default(), &BrowserPage, &ListingRows, document_id, &name)
                    .await;
            });
        });
    }

    if let Some(button) = element_by_id::<HtmlElement>("batchDeleteBtn") {
        listen(&button, "click", move |_event| {
            let ids = selected_enabled_ids(&document_checkboxes());
            spawn_local(async move {
                delete_documents(&FetchApi::default(), &BrowserPage, &ListingRows, ids).await;
            });
        });
    }
}

/// Select-all toggle on folder pages; select/deselect links and eligibility
/// marking on the document list.
fn init_selection() {
    if let Some(toggle) = element_by_id::<HtmlInputElement>("selectAllDocs") {
        let source = toggle.clone();
        listen(&toggle, "change", move |_event| {
            apply_toggle(&document_checkboxes(), source.checked());
        });
    }

    let Some(select_link) = element_by_id::<HtmlElement>("selectAll") else {
        return;
    };
    // Only documents offering a push action can be picked on the list page.
    for checkbox in query_all::<HtmlInputElement>(".document-checkbox") {
        let eligible = checkbox
            .closest(".document-item")
            .ok()
            .flatten()
            .and_then(|row| row.query_selector(".btn-info").ok().flatten())
            .is_some();
        if !eligible {
            checkbox.set_disabled(true);
            checkbox.set_title(NOT_ELIGIBLE_TITLE);
        }
    }
    listen(&select_link, "click", |event| {
        event.prevent_default();
        select_all(&document_checkboxes());
    });
    if let Some(deselect_link) = element_by_id::<HtmlElement>("deselectAll") {
        listen(&deselect_link, "click", |event| {
            event.prevent_default();
            deselect_all(&document_checkboxes());
        });
    }
}

pub fn init_folder_page() {
    init_selection();
    init_delete_buttons();

    let Some(folder_id) = folder_id_from_path() else {
        return;
    };
    init_batch_trigger("startBatchChunkBtn", folder_id, || {
        BatchAction::Chunk(ChunkForm::new(
            field_value("chunkStrategy"),
            field_value("chunkSize"),
            field_value("overlap"),
        ))
    });
    init_batch_trigger("startBatchDifyBtn", folder_id, || BatchAction::Push {
        dataset_id: field_value("difyKnowledgeBase"),
    });
    init_dify_panel();
}
