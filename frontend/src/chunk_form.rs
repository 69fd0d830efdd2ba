//! Chunk form on the document detail page.

use std::cell::RefCell;
use std::rc::Rc;

use chunkgo::document::{
    ChunkProgressView, ChunkSubmitOutcome, ChunkWatch, DocumentContext, load_strategies,
    submit_document_chunk, watch_document_chunk,
};
use chunkgo::upload::file_extension;
use chunkgo::validation::{ChunkForm, Field};
use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Element, HtmlButtonElement, HtmlElement, HtmlFormElement, HtmlInputElement, HtmlSelectElement,
};

use crate::dom::{
    element_by_id, listen, log_error, set_class_flag, set_display, set_text, web_document,
};
use crate::http::FetchApi;
use crate::page::{BrowserPage, TimerSleeper};

const LIVE_CHECK_DEBOUNCE_MS: u32 = 200;
const SUBMITTING_HTML: &str =
    r#"<span class="spinner-border spinner-border-sm" role="status" aria-hidden="true"></span> 处理中..."#;

struct FormView {
    container: Option<HtmlElement>,
    bar: Option<HtmlElement>,
    status: Option<Element>,
    submit: Option<HtmlButtonElement>,
    idle_html: String,
}

impl FormView {
    fn from_page() -> Self {
        let submit = element_by_id::<HtmlButtonElement>("submitButton");
        let idle_html = submit.as_ref().map(|button| button.inner_html()).unwrap_or_default();
        Self {
            container: element_by_id("progressContainer"),
            bar: element_by_id("chunkProgress"),
            status: element_by_id("processingStatus"),
            submit,
            idle_html,
        }
    }
}

impl ChunkProgressView for FormView {
    fn show(&self) {
        if let Some(container) = &self.container {
            set_display(container, true);
        }
    }

    fn hide(&self) {
        if let Some(container) = &self.container {
            set_display(container, false);
        }
    }

    fn set_busy(&self, busy: bool) {
        let Some(submit) = &self.submit else {
            return;
        };
        submit.set_disabled(busy);
        submit.set_inner_html(if busy { SUBMITTING_HTML } else { &self.idle_html });
    }

    fn set_status(&self, text: &str) {
        if let Some(status) = &self.status {
            set_text(status, text);
        }
    }

    fn set_progress(&self, percent: f64) {
        let Some(bar) = &self.bar else {
            return;
        };
        let _ = bar.style().set_property("width", &format!("{percent}%"));
        set_text(bar, format!("{percent}%"));
        let _ = bar.set_attribute("aria-valuenow", &percent.to_string());
    }

    fn mark_done(&self) {
        if let Some(bar) = &self.bar {
            set_class_flag(bar, "progress-bar-animated", false);
        }
    }

    fn mark_failed(&self) {
        if let Some(bar) = &self.bar {
            let _ = bar.class_list().replace("bg-primary", "bg-danger");
            set_class_flag(bar, "progress-bar-animated", false);
        }
    }
}

fn input_value(id: &str) -> String {
    element_by_id::<HtmlInputElement>(id)
        .map(|input| input.value())
        .unwrap_or_default()
}

fn document_from_page() -> Option<DocumentContext> {
    let id = input_value("documentId").trim().parse().ok()?;
    Some(DocumentContext {
        id,
        filename: input_value("documentFilename"),
        status: input_value("documentStatus").parse().ok(),
    })
}

fn form_values() -> ChunkForm {
    let strategy = element_by_id::<HtmlSelectElement>("chunkStrategy")
        .map(|select| select.value())
        .unwrap_or_default();
    ChunkForm::new(strategy, input_value("chunkSize"), input_value("overlap"))
}

fn flag_invalid(field: Field, invalid: bool) {
    if let Some(input) = element_by_id::<Element>(field.element_id()) {
        set_class_flag(&input, "is-invalid", invalid);
    }
}

fn live_check() {
    let check = form_values().live_check();
    flag_invalid(Field::ChunkSize, check.chunk_size_invalid);
    if let Some(invalid) = check.overlap_invalid {
        flag_invalid(Field::Overlap, invalid);
    }
}

fn follow(view: Rc<FormView>, watch: ChunkWatch) {
    spawn_local(async move {
        watch_document_chunk(&FetchApi::default(), &BrowserPage, &TimerSleeper, &*view, watch)
            .await;
    });
}

/// Fills the strategy select with what the backend supports for this file
/// type.
fn fill_strategies(filename: &str) {
    let Some(file_ext) = file_extension(filename) else {
        return;
    };
    spawn_local(async move {
        let choice = match load_strategies(&FetchApi::default(), &BrowserPage, &file_ext).await {
            Ok(Some(choice)) => choice,
            Ok(None) => return,
            Err(err) => {
                log_error(&format!("获取切块策略出错: {err}"));
                return;
            }
        };
        let (Some(doc), Some(select)) = (
            web_document(),
            element_by_id::<HtmlSelectElement>("chunkStrategy"),
        ) else {
            return;
        };

        select.set_inner_html("");
        for strategy in &choice.strategies {
            if let Ok(option) = doc.create_element("option") {
                let _ = option.set_attribute("value", &strategy.name);
                option.set_text_content(Some(&strategy.display_name));
                let _ = select.append_child(&option);
            }
        }

        if let (Some(hint), Some(parent)) = (choice.hint, select.parent_node()) {
            if let Ok(note) = doc.create_element("div") {
                note.set_class_name("form-text text-info");
                note.set_text_content(Some(&hint));
                let _ = parent.append_child(&note);
            }
        }
    });
}

pub fn init_chunk_form() {
    let Some(document) = document_from_page() else {
        return;
    };
    let view = Rc::new(FormView::from_page());

    if document.is_processing() {
        follow(view.clone(), ChunkWatch::resumed(document.id));
    }
    if !document.filename.is_empty() {
        fill_strategies(&document.filename);
    }

    let Some(form) = element_by_id::<HtmlFormElement>("chunkForm") else {
        return;
    };

    {
        let form_ref = form.clone();
        let document = document.clone();
        let view = view.clone();
        listen(&form, "submit", move |event| {
            event.prevent_default();
            if !form_ref.check_validity() {
                event.stop_propagation();
                set_class_flag(&form_ref, "was-validated", true);
                return;
            }
            let (document, view) = (document.clone(), view.clone());
            spawn_local(async move {
                let outcome = submit_document_chunk(
                    &FetchApi::default(),
                    &BrowserPage,
                    &*view,
                    &document,
                    &form_values(),
                )
                .await;
                match outcome {
                    ChunkSubmitOutcome::Invalid(err) => flag_invalid(err.field(), true),
                    ChunkSubmitOutcome::Processing => {
                        follow(view, ChunkWatch::submitted(document.id));
                    }
                    ChunkSubmitOutcome::Declined
                    | ChunkSubmitOutcome::Done
                    | ChunkSubmitOutcome::Failed(_) => {}
                }
            });
        });
    }

    let debounce = Rc::new(RefCell::new(None::<Timeout>));
    listen(&form, "input", move |event| {
        let target_id = event
            .target()
            .and_then(|node| node.dyn_into::<Element>().ok())
            .map(|node| node.id())
            .unwrap_or_default();
        if target_id != Field::ChunkSize.element_id() && target_id != Field::Overlap.element_id() {
            return;
        }
        if let Some(timeout) = debounce.borrow_mut().take() {
            timeout.cancel();
        }
        *debounce.borrow_mut() = Some(Timeout::new(LIVE_CHECK_DEBOUNCE_MS, live_check));
    });
}
