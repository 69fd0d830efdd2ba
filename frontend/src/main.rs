mod chunk_form;
mod dom;
mod folder;
mod http;
mod page;
mod upload;

use leptos::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

use crate::dom::web_document;

#[component]
fn App() -> impl IntoView {
    view! {
        <div
            id="leptos-runtime-marker"
            data-runtime="chunkgo-frontend"
            style="display:none;"
        ></div>
    }
}

fn main() {
    console_error_panic_hook::set_once();

    if let Some(root) = web_document()
        .and_then(|doc| doc.get_element_by_id("leptos-runtime-root"))
        .and_then(|node| node.dyn_into::<HtmlElement>().ok())
    {
        mount_to(root, || view! { <App /> });
    } else {
        mount_to_body(|| view! { <App /> });
    }

    upload::init_upload_widget();
    folder::init_folder_page();
    chunk_form::init_chunk_form();
}
