use std::time::Duration;

use chunkgo::page::{Alert, Confirm, Page, ToastLevel};
use chunkgo::poller::Sleeper;
use gloo_timers::callback::Timeout;
use js_sys::{Promise, Reflect};
use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlElement;

use crate::dom::{element_by_id, log_warn, web_document};

const TOAST_LIFETIME_MS: u32 = 5000;

#[wasm_bindgen]
extern "C" {
    /// SweetAlert2, loaded by the page template.
    #[wasm_bindgen(js_namespace = Swal, js_name = fire, catch)]
    fn swal_fire(options: &JsValue) -> Result<Promise, JsValue>;
}

/// Toasts in a Bootstrap container, dialogs through SweetAlert2. Pages
/// without SweetAlert2 fall back to the native dialogs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserPage;

impl BrowserPage {
    async fn fire(&self, options: serde_json::Value) -> Option<JsValue> {
        let options = js_sys::JSON::parse(&options.to_string()).ok()?;
        let promise = match swal_fire(&options) {
            Ok(promise) => promise,
            Err(_) => {
                log_warn("SweetAlert2 is not available, using native dialogs");
                return None;
            }
        };
        JsFuture::from(promise).await.ok()
    }
}

impl Page for BrowserPage {
    fn toast(&self, level: ToastLevel, message: &str) {
        let Some(doc) = web_document() else {
            return;
        };
        let Some(container) = toast_container() else {
            return;
        };
        let Ok(toast) = doc.create_element("div") else {
            return;
        };
        toast.set_class_name(&format!(
            "toast show align-items-center text-white bg-{} border-0",
            level.css_variant()
        ));
        let _ = toast.set_attribute("role", "alert");
        let _ = toast.set_attribute("aria-live", "assertive");
        let _ = toast.set_attribute("aria-atomic", "true");
        let _ = toast.set_attribute("data-level", level.as_str());

        if let Ok(body) = doc.create_element("div") {
            body.set_class_name("toast-body");
            body.set_text_content(Some(message));
            let _ = toast.append_child(&body);
        }
        let _ = container.append_child(&toast);

        Timeout::new(TOAST_LIFETIME_MS, move || toast.remove()).forget();
    }

    async fn confirm(&self, dialog: &Confirm) -> bool {
        let options = json!({
            "title": dialog.title,
            "text": dialog.text,
            "icon": dialog.icon.as_str(),
            "showCancelButton": true,
            "confirmButtonText": dialog.confirm_label,
            "cancelButtonText": dialog.cancel_label,
        });
        match self.fire(options).await {
            Some(result) => Reflect::get(&result, &"isConfirmed".into())
                .ok()
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
            None => web_sys::window()
                .and_then(|window| {
                    window
                        .confirm_with_message(&format!("{}\n\n{}", dialog.title, dialog.text))
                        .ok()
                })
                .unwrap_or(false),
        }
    }

    async fn alert(&self, dialog: &Alert) {
        let mut options = json!({
            "title": dialog.title,
            "text": dialog.text,
            "icon": dialog.icon.as_str(),
            "confirmButtonColor": "#2c3e50",
        });
        if let Some(timer) = dialog.timer {
            options["timer"] = json!(timer.as_millis() as u64);
            options["showConfirmButton"] = json!(false);
        }
        if self.fire(options).await.is_none() {
            if let Some(window) = web_sys::window() {
                let _ = window.alert_with_message(&format!("{}\n\n{}", dialog.title, dialog.text));
            }
        }
    }

    fn reload(&self) {
        if let Some(window) = web_sys::window() {
            let _ = window.location().reload();
        }
    }

    fn activate_tab(&self, tab_id: &str) {
        if let Some(tab) = element_by_id::<HtmlElement>(tab_id) {
            tab.click();
        }
    }

    fn has_task_row(&self, task_id: &str) -> bool {
        web_document()
            .and_then(|doc| {
                doc.query_selector(&format!(".task-item[data-task-id=\"{task_id}\"]"))
                    .ok()
                    .flatten()
            })
            .is_some()
    }
}

fn toast_container() -> Option<web_sys::Element> {
    if let Some(existing) = element_by_id::<web_sys::Element>("toastContainer") {
        return Some(existing);
    }
    let doc = web_document()?;
    let container = doc
        .create_element("div")
        .ok()?
        .dyn_into::<HtmlElement>()
        .ok()?;
    container.set_id("toastContainer");
    container.set_class_name("toast-container position-fixed top-0 end-0 p-3");
    let _ = container.style().set_property("z-index", "1050");
    doc.body()?.append_child(&container).ok()?;
    Some(container.into())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimerSleeper;

impl Sleeper for TimerSleeper {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}
