use std::{fmt, rc::Rc};

use url::Url;

use crate::{error::NavigationError, utils::default_validate};

pub(crate) type Validator = Rc<dyn Fn(&Url) -> bool>;
pub(crate) type ErrorHook = Rc<dyn Fn(NavigationError)>;

/// Configuration for [`Router::configure`](crate::Router::configure).
///
/// This implements [`Default`] and follows the builder pattern, so you can use it like this:
/// ```rust
/// # use spa_router::RouterConfig;
/// let cfg = RouterConfig::default()
///     .first_run(false)
///     .validate(|url| url.path().starts_with("/app"));
/// ```
pub struct RouterConfig {
    pub(crate) validate: Validator,
    pub(crate) first_run: bool,
    pub(crate) on_unhandled_error: ErrorHook,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            validate: Rc::new(default_validate),
            first_run: true,
            on_unhandled_error: Rc::new(|err| {
                tracing::error!("unhandled navigation error: {err}");
            }),
        }
    }
}

impl RouterConfig {
    /// Decide which same-origin urls the router takes over. Urls that fail validation are loaded
    /// by the platform as usual.
    ///
    /// Defaults to [`default_validate`], which accepts any path without a `.` except for a
    /// trailing `.html`.
    pub fn validate(self, validate: impl Fn(&Url) -> bool + 'static) -> Self {
        Self {
            validate: Rc::new(validate),
            ..self
        }
    }

    /// Whether the handler is called for the current location as soon as the router is configured.
    ///
    /// Defaults to `true`.
    pub fn first_run(self, first_run: bool) -> Self {
        Self { first_run, ..self }
    }

    /// Called with errors from navigations nobody is waiting on: clicks, history pops, reloads,
    /// the first run, and [`RouteHandle`](crate::RouteHandle)s that were dropped. Each error is
    /// reported once.
    ///
    /// Defaults to logging the error with [`tracing::error!`].
    pub fn on_unhandled_error(self, callback: impl Fn(NavigationError) + 'static) -> Self {
        Self {
            on_unhandled_error: Rc::new(callback),
            ..self
        }
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("first_run", &self.first_run)
            .finish_non_exhaustive()
    }
}
