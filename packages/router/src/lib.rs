//! Same-origin navigation interception for single page apps.
//!
//! ## Overview
//! ------------
//! spa-router takes over link clicks, back/forward and programmatic navigations within one origin
//! and hands them to your application as [`NavigationContext`]s instead of letting the browser load
//! a new document. The address bar, the history stack and the scroll position are kept consistent
//! with what a full load would have produced.
//!
//! Each navigation goes through two phases:
//! 1. Your handler runs with the context. It can inspect or adjust the destination and the history
//!    state, load whatever it needs, and keep an eye on [`NavigationContext::signal`].
//! 2. Your handler calls [`NavigationContext::ready`] (or [`NavigationContext::ready_with`]). Only
//!    now is the navigation written to the history stack, and the viewport scrolled to the
//!    destination's fragment or to the top.
//!
//! ## Preemption
//! ------------
//! Navigations can overlap when handlers are asynchronous. Whenever a new one is accepted, the
//! previous one is aborted first. An aborted navigation can never commit, so a slow handler cannot
//! clobber the location after the user already moved on. Cancellation is cooperative: handlers
//! should check [`AbortSignal::aborted`] or call [`NavigationContext::maybe_abort`] at safe points.
//! Anything a preempted handler does outside the history API is not undone for it.
//!
//! ```rust
//! use std::rc::Rc;
//! use spa_router::prelude::*;
//!
//! let platform = Rc::new(MemoryPlatform::new("http://localhost/".parse().unwrap()));
//! let router = Router::new(platform.clone());
//!
//! router
//!     .configure(
//!         |context: NavigationContext| async move {
//!             context.maybe_abort()?;
//!             context.ready();
//!             Ok::<_, anyhow::Error>(())
//!         },
//!         RouterConfig::default().first_run(false),
//!     )
//!     .unwrap();
//!
//! platform.click_link("/about");
//! platform.run_until_stalled();
//! assert_eq!(platform.location().path(), "/about");
//! ```

#![deny(missing_docs)]

pub mod abort;
mod context;
mod error;
mod router;
mod router_cfg;
mod scroll;
pub mod utils;

pub use abort::{AbortController, AbortSignal};
pub use context::{Commit, CommitKind, NavigationContext, NavigationPhase};
pub use error::{AbortError, NavigationError, RouterError};
pub use router::{RouteHandle, Router};
pub use router_cfg::RouterConfig;
pub use scroll::scroll_to_hash;

pub use spa_history as history;

/// A collection of useful items most applications might need.
pub mod prelude {
    pub use crate::{
        AbortError, AbortSignal, Commit, CommitKind, NavigationContext, NavigationError,
        NavigationPhase, RouteHandle, Router, RouterConfig, RouterError,
    };
    pub use spa_history::{MemoryPlatform, Platform};

    #[cfg(feature = "web")]
    pub use spa_history::WebPlatform;
}
