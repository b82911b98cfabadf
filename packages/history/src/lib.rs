//! Platform integration for spa-router.
//!
//! spa-router never talks to the browser directly. Everything it needs from the environment it is
//! running in (the current location, the history stack, full page loads, scrolling, task spawning
//! and the click/popstate event stream) goes through the [`Platform`] trait defined here.
//!
//! Two implementations ship with this crate:
//! - [`MemoryPlatform`], a headless model of a single document with its own history stack and a
//!   local executor. It is what the router's tests run against.
//! - `WebPlatform` (behind the `web` feature), which binds the trait to `window.history`,
//!   `window.location` and the document via `web-sys`.

#![deny(missing_docs)]

use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use serde_json::Value;
use url::Url;

mod memory;
pub use memory::*;

#[cfg(feature = "web")]
mod web;
#[cfg(feature = "web")]
pub use web::*;

/// The nearest `a[href]` ancestor of the element that received a click.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkTarget {
    /// The link's `href`. Platforms report it fully resolved when they can.
    pub href: String,

    /// The link's `target` attribute, if it has a non-empty one.
    pub target: Option<String>,
}

/// A snapshot of a pointer click, reduced to the parts that decide whether a navigation happens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickEvent {
    /// Whether the control key was held.
    pub ctrl_key: bool,

    /// Whether the meta (command / windows) key was held.
    pub meta_key: bool,

    /// Whether the alt (option) key was held.
    pub alt_key: bool,

    /// Whether the shift key was held.
    pub shift_key: bool,

    /// The button that was pressed. `0` is the primary button.
    pub button: i16,

    /// Whether some earlier listener already cancelled the event.
    pub default_prevented: bool,

    /// The link the click landed in, if any.
    pub link: Option<LinkTarget>,
}

impl ClickEvent {
    /// A plain primary-button click on a link to `href` with no modifiers held.
    ///
    /// ```rust
    /// # use spa_history::ClickEvent;
    /// let click = ClickEvent::on_link("/about");
    /// assert_eq!(click.button, 0);
    /// assert_eq!(click.link.unwrap().href, "/about");
    /// ```
    pub fn on_link(href: impl Into<String>) -> Self {
        Self {
            link: Some(LinkTarget {
                href: href.into(),
                target: None,
            }),
            ..Default::default()
        }
    }

    /// Set the `target` attribute of the clicked link.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        if let Some(link) = &mut self.link {
            link.target = Some(target.into());
        }
        self
    }
}

/// Events the platform forwards to whoever called [`Platform::listen`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A click somewhere in the document.
    Click(ClickEvent),

    /// The platform moved to another history entry (back, forward, or a native hash change).
    PopState,
}

/// A callback for [`PlatformEvent`]s. Returning `true` from a click prevents the platform's
/// default action for that click. The return value is ignored for every other event.
pub type Listener = Rc<dyn Fn(&PlatformEvent) -> bool>;

/// The environment a router runs in.
///
/// Implementations are single threaded: all methods are called from the document's one execution
/// timeline and spawned tasks are never moved between threads.
pub trait Platform {
    /// The current, absolute location of the document.
    fn location(&self) -> Url;

    /// The state stored in the current history entry. [`Value::Null`] when there is none.
    fn history_state(&self) -> Value;

    /// Push a new history entry. `url` is resolved against the current location.
    ///
    /// This only changes the address and the history stack, it never loads anything.
    fn push_state(&self, state: &Value, url: &str);

    /// Overwrite the current history entry. When `url` is [`None`] the address stays the same.
    fn replace_state(&self, state: &Value, url: Option<&str>);

    /// Perform a full, platform-driven load of `url`, leaving the current document.
    fn load(&self, url: &Url);

    /// Scroll the element with the given id into view. Returns `false` if there is no such element.
    fn scroll_into_view(&self, id: &str) -> bool;

    /// Set the vertical scroll offset of the document.
    fn set_scroll_top(&self, offset: f64);

    /// Run `task` to completion on the platform's local executor.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);

    /// Start forwarding clicks and history pops to `listener`.
    fn listen(&self, listener: Listener);
}
