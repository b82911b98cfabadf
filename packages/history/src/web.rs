use std::cell::RefCell;

use futures_util::future::LocalBoxFuture;
use gloo::events::{EventListener, EventListenerOptions};
use serde::Serialize;
use serde_json::Value;
use url::Url;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{window, Document, Element, Event, History, HtmlAnchorElement, MouseEvent, Window};

use crate::{ClickEvent, LinkTarget, Listener, Platform, PlatformEvent};

fn to_js(state: &Value) -> Option<JsValue> {
    match state.serialize(&serde_wasm_bindgen::Serializer::json_compatible()) {
        Ok(state) => Some(state),
        Err(err) => {
            tracing::error!("failed to convert history state to a JsValue: {err}");
            None
        }
    }
}

/// Read a click off a DOM event, resolving the nearest `a[href]` ancestor of its target.
fn click_event(event: &Event) -> Option<ClickEvent> {
    let mouse = event.dyn_ref::<MouseEvent>()?;
    let link = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .and_then(|element| element.closest("a[href]").ok().flatten())
        .and_then(|link| link.dyn_into::<HtmlAnchorElement>().ok())
        .map(|anchor| {
            let target = anchor.target();
            LinkTarget {
                href: anchor.href(),
                target: (!target.is_empty()).then_some(target),
            }
        });

    Some(ClickEvent {
        ctrl_key: mouse.ctrl_key(),
        meta_key: mouse.meta_key(),
        alt_key: mouse.alt_key(),
        shift_key: mouse.shift_key(),
        button: mouse.button(),
        default_prevented: event.default_prevented(),
        link,
    })
}

/// A [`Platform`] that integrates with a browser via the [History API](https://developer.mozilla.org/en-US/docs/Web/API/History_API).
///
/// History state is stored as plain JSON-compatible JavaScript values, so entries written by other
/// scripts on the page read back as [`serde_json::Value`] as long as they are JSON-shaped.
pub struct WebPlatform {
    window: Window,
    document: Document,
    history: History,
    listeners: RefCell<Vec<EventListener>>,
}

impl Default for WebPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl WebPlatform {
    /// Create a new [`WebPlatform`] bound to the global `window`.
    pub fn new() -> Self {
        let window = window().expect("access to `window`");
        let document = window.document().expect("`window` has access to `document`");
        let history = window.history().expect("`window` has access to `history`");

        Self {
            window,
            document,
            history,
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl Platform for WebPlatform {
    fn location(&self) -> Url {
        let href = self
            .window
            .location()
            .href()
            .expect("`window` has access to `location`");
        Url::parse(&href).expect("`location.href` is an absolute url")
    }

    fn history_state(&self) -> Value {
        let state = match self.history.state() {
            Ok(state) => state,
            Err(err) => {
                tracing::error!("failed to read history state: {err:?}");
                return Value::Null;
            }
        };
        serde_wasm_bindgen::from_value(state).unwrap_or_else(|err| {
            tracing::warn!("history state is not JSON-shaped, treating it as null: {err}");
            Value::Null
        })
    }

    fn push_state(&self, state: &Value, url: &str) {
        let Some(state) = to_js(state) else {
            return;
        };
        if let Err(err) = self.history.push_state_with_url(&state, "", Some(url)) {
            tracing::error!("failed to push state: {err:?}");
        }
    }

    fn replace_state(&self, state: &Value, url: Option<&str>) {
        let Some(state) = to_js(state) else {
            return;
        };
        if let Err(err) = self.history.replace_state_with_url(&state, "", url) {
            tracing::error!("failed to replace state: {err:?}");
        }
    }

    fn load(&self, url: &Url) {
        if let Err(err) = self.window.location().set_href(url.as_str()) {
            tracing::error!("failed to navigate to {url}: {err:?}");
        }
    }

    fn scroll_into_view(&self, id: &str) -> bool {
        match self.document.get_element_by_id(id) {
            Some(element) => {
                element.scroll_into_view();
                true
            }
            None => false,
        }
    }

    fn set_scroll_top(&self, offset: f64) {
        if let Some(root) = self.document.document_element() {
            root.set_scroll_top(offset as i32);
        }
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn listen(&self, listener: Listener) {
        let popstate = {
            let listener = listener.clone();
            EventListener::new(&self.window, "popstate", move |_| {
                listener(&PlatformEvent::PopState);
            })
        };

        let click = EventListener::new_with_options(
            &self.window,
            "click",
            EventListenerOptions::enable_prevent_default(),
            move |event| {
                let Some(click) = click_event(event) else {
                    return;
                };
                if listener(&PlatformEvent::Click(click)) {
                    event.prevent_default();
                }
            },
        );

        self.listeners.borrow_mut().extend([popstate, click]);
    }
}
