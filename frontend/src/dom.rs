use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Document, Element, EventTarget, HtmlElement};

pub fn web_document() -> Option<Document> {
    web_sys::window().and_then(|window| window.document())
}

/// Element with `id`, cast to the expected element type.
pub fn element_by_id<T: JsCast>(id: &str) -> Option<T> {
    web_document()?
        .get_element_by_id(id)
        .and_then(|node| node.dyn_into::<T>().ok())
}

pub fn query_all<T: JsCast>(selector: &str) -> Vec<T> {
    let Some(list) = web_document().and_then(|doc| doc.query_selector_all(selector).ok()) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|index| list.item(index))
        .filter_map(|node| node.dyn_into::<T>().ok())
        .collect()
}

pub fn set_text(node: &Element, value: impl AsRef<str>) {
    let next = value.as_ref();
    if node.text_content().as_deref() == Some(next) {
        return;
    }
    node.set_text_content(Some(next));
}

pub fn set_display(node: &HtmlElement, visible: bool) {
    let _ = node
        .style()
        .set_property("display", if visible { "block" } else { "none" });
}

pub fn set_class_flag(node: &Element, class_name: &str, on: bool) {
    let classes = node.class_list();
    if on {
        let _ = classes.add_1(class_name);
    } else {
        let _ = classes.remove_1(class_name);
    }
}

/// Attaches a listener for the lifetime of the page.
pub fn listen<F>(target: &EventTarget, event: &str, handler: F)
where
    F: FnMut(web_sys::Event) + 'static,
{
    let callback = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
    let _ = target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref());
    callback.forget();
}

/// Folder pages end in the folder id: `/chunkgo/folders/12`.
pub fn folder_id_from_path() -> Option<i64> {
    let path = web_sys::window()?.location().pathname().ok()?;
    path.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

pub fn log_error(message: &str) {
    web_sys::console::error_1(&message.into());
}

pub fn log_warn(message: &str) {
    web_sys::console::warn_1(&message.into());
}
