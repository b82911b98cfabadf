use std::{
    cell::RefCell,
    fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures_channel::oneshot;
use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use spa_history::{ClickEvent, Platform, PlatformEvent};
use url::Url;

use crate::{
    abort::AbortController,
    context::{Commit, CommitFn, CommitKind, NavigationContext},
    error::{NavigationError, RouterError},
    router_cfg::{ErrorHook, RouterConfig, Validator},
    scroll::scroll_to_hash,
    utils::{hash, is_navigation_hash, path_and_search, resolve_click_target, same_origin},
};

type Handler = Rc<dyn Fn(NavigationContext) -> LocalBoxFuture<'static, anyhow::Result<()>>>;
type Reply = oneshot::Sender<Result<(), NavigationError>>;

/// What caused a navigation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    FirstRun,
    Click,
    Programmatic,
    HistoryPop,
    Reload,
}

struct Listening {
    handler: Handler,
    validate: Validator,
    on_unhandled_error: ErrorHook,
    /// `pathname + search` of the last location the router settled on.
    settled: String,
    active: Option<AbortController>,
    first_run_pending: bool,
}

enum RouterState {
    Unconfigured,
    Listening(Listening),
}

struct RouterInner {
    platform: Rc<dyn Platform>,
    state: RefCell<RouterState>,
}

/// Intercepts same-origin navigations and hands them to a handler.
///
/// A [`Router`] is created for a [`Platform`] and starts doing anything once
/// [`Router::configure`] installs a handler. From then on, qualifying link clicks, history pops,
/// [`Router::route`] and [`Router::reload`] are turned into [`NavigationContext`]s for the handler
/// instead of full page loads.
///
/// At most one navigation is in flight at a time. Accepting a new one aborts the signal of the
/// previous one before its handler is even called, and a preempted navigation can no longer commit.
///
/// Routers are cheap to clone; all clones drive the same state.
#[derive(Clone)]
pub struct Router {
    inner: Rc<RouterInner>,
}

impl Router {
    /// Create a router for `platform`. It does nothing until [`Router::configure`] is called.
    pub fn new(platform: Rc<dyn Platform>) -> Self {
        Self {
            inner: Rc::new(RouterInner {
                platform,
                state: RefCell::new(RouterState::Unconfigured),
            }),
        }
    }

    /// The platform this router drives.
    pub fn platform(&self) -> &Rc<dyn Platform> {
        &self.inner.platform
    }

    /// Whether [`Router::configure`] has been called.
    pub fn is_listening(&self) -> bool {
        matches!(*self.inner.state.borrow(), RouterState::Listening(_))
    }

    /// Install `handler` and start intercepting navigations.
    ///
    /// The handler is called with a [`NavigationContext`] for every accepted navigation and should
    /// eventually call [`NavigationContext::ready`]. If it doesn't, the router commits the
    /// navigation itself once the returned future completes successfully. If the future fails, the
    /// router loads the navigation's url from scratch, since the page may be half updated; this is
    /// skipped for the first run and for preempted navigations.
    ///
    /// With [`RouterConfig::first_run`] set (the default) the handler is called right away for
    /// the current location.
    ///
    /// The platform keeps the router alive from here on, so interception continues after every
    /// [`Router`] handle has been dropped.
    ///
    /// A router can only be configured once.
    pub fn configure<F, Fut>(&self, handler: F, config: RouterConfig) -> Result<(), RouterError>
    where
        F: Fn(NavigationContext) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let RouterConfig {
            validate,
            first_run,
            on_unhandled_error,
        } = config;

        {
            let mut state = self.inner.state.borrow_mut();
            if let RouterState::Listening(_) = *state {
                return Err(RouterError::AlreadyConfigured);
            }
            *state = RouterState::Listening(Listening {
                handler: Rc::new(move |context| handler(context).boxed_local()),
                validate,
                on_unhandled_error,
                settled: path_and_search(&self.inner.platform.location()),
                active: None,
                first_run_pending: first_run,
            });
        }

        let router = self.inner.clone();
        self.inner.platform.listen(Rc::new(move |event| match event {
            PlatformEvent::Click(click) => router.on_click(click),
            PlatformEvent::PopState => {
                router.on_pop_state();
                false
            }
        }));

        tracing::debug!(first_run, "router is listening");
        if first_run {
            self.inner.accept(None, Trigger::FirstRun, None);
        }
        Ok(())
    }

    /// Navigate to `to`, resolved against the current location.
    ///
    /// Targets on another origin or rejected by the validator are loaded by the platform and the
    /// returned handle fails with [`NavigationError::NotIntercepted`]. A target that only differs
    /// from the current location in its fragment scrolls there and pushes a history entry without
    /// calling the handler. Anything else becomes a navigation, and the handle resolves once its
    /// handler finished.
    ///
    /// The navigation runs whether or not the handle is awaited.
    pub fn route(&self, to: &str) -> RouteHandle {
        match self.inner.platform.location().join(to) {
            Ok(url) => self.route_to(url),
            Err(err) => RouteHandle::ready(Err(err.into())),
        }
    }

    /// Like [`Router::route`], with an already resolved url.
    pub fn route_to(&self, url: Url) -> RouteHandle {
        let platform = &self.inner.platform;
        let location = platform.location();

        if !same_origin(&url, &location) || !self.inner.validate(&url) {
            tracing::debug!("handing {url} to the platform");
            platform.load(&url);
            return RouteHandle::ready(Err(NavigationError::NotIntercepted(url)));
        }

        if is_navigation_hash(&url, &location) {
            tracing::trace!("hash-only navigation to {url}");
            scroll_to_hash(&**platform, &hash(&url), 0.0);
            platform.push_state(&Value::Null, url.as_str());
            return RouteHandle::ready(Ok(()));
        }

        let (tx, rx) = oneshot::channel();
        self.inner.accept(Some(url), Trigger::Programmatic, Some(tx));
        RouteHandle::pending(rx)
    }

    /// Run the handler again for the current location, as a revisit of the current entry.
    ///
    /// An unconfigured router asks the platform for a full reload instead.
    pub fn reload(&self) {
        if self.is_listening() {
            self.inner.accept(None, Trigger::Reload, None);
        } else {
            self.inner.platform.load(&self.inner.platform.location());
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

impl RouterInner {
    fn with_listening<T>(&self, f: impl FnOnce(&mut Listening) -> T) -> Option<T> {
        match &mut *self.state.borrow_mut() {
            RouterState::Listening(listening) => Some(f(listening)),
            RouterState::Unconfigured => None,
        }
    }

    fn validate(&self, url: &Url) -> bool {
        match self.with_listening(|listening| listening.validate.clone()) {
            Some(validate) => validate(url),
            None => false,
        }
    }

    fn on_click(self: &Rc<Self>, click: &ClickEvent) -> bool {
        let Some(href) = resolve_click_target(click) else {
            return false;
        };
        let location = self.platform.location();
        let Ok(url) = location.join(href) else {
            return false;
        };

        // hash links on this page are scrolled natively
        if !same_origin(&url, &location)
            || is_navigation_hash(&url, &location)
            || !self.validate(&url)
        {
            tracing::trace!("leaving click on {url} to the platform");
            return false;
        }

        self.accept(Some(url), Trigger::Click, None);
        true
    }

    fn on_pop_state(self: &Rc<Self>) {
        let active = path_and_search(&self.platform.location());
        let changed = self.with_listening(|listening| {
            if listening.settled == active {
                return false;
            }
            listening.settled = active;
            true
        });

        if changed == Some(true) {
            self.accept(None, Trigger::HistoryPop, None);
        }
    }

    fn settle(&self, location: &Url) {
        let settled = path_and_search(location);
        self.with_listening(|listening| listening.settled = settled);
    }

    /// Accept a navigation request: preempt whatever is in flight, then hand a fresh context to
    /// the handler. Everything up to calling the handler happens synchronously.
    ///
    /// `target` is [`None`] for revisits of the current location.
    fn accept(self: &Rc<Self>, target: Option<Url>, trigger: Trigger, reply: Option<Reply>) {
        let Some((handler, on_unhandled_error, first_run)) = self.with_listening(|listening| {
            let first_run = std::mem::take(&mut listening.first_run_pending);
            (
                listening.handler.clone(),
                listening.on_unhandled_error.clone(),
                first_run,
            )
        }) else {
            return;
        };

        let is_navigation = target.is_some();
        let url = target.unwrap_or_else(|| self.platform.location());

        // abort listeners may start navigations of their own, so drain until nothing is active
        while let Some(previous) = self.with_listening(|listening| listening.active.take()).flatten() {
            tracing::debug!(?trigger, "preempting in-flight navigation for {url}");
            previous.abort();
        }

        let controller = AbortController::new();
        let signal = controller.signal();
        self.with_listening(|listening| listening.active = Some(controller));

        tracing::debug!(?trigger, first_run, is_navigation, "accepted navigation to {url}");
        let context = NavigationContext::new(
            url,
            signal,
            first_run,
            is_navigation,
            self.platform.clone(),
            self.commit_fn(is_navigation),
        );

        let pending = handler(context.clone());
        let platform = self.platform.clone();
        let task = async move {
            let result = match pending.await {
                Ok(()) => {
                    context.ready();
                    Ok(())
                }
                Err(err) => {
                    if !context.signal().aborted() && !first_run {
                        tracing::warn!("navigation handler failed, reloading {}", context.url());
                        platform.load(&context.url());
                    }
                    Err(NavigationError::from_handler(err))
                }
            };

            let unhandled = match reply {
                Some(reply) => reply.send(result).err(),
                None => Some(result),
            };
            if let Some(Err(err)) = unhandled {
                on_unhandled_error(err);
            }
        };
        self.platform.spawn(task.boxed_local());
    }

    fn commit_fn(self: &Rc<Self>, is_navigation: bool) -> CommitFn {
        let router = Rc::downgrade(self);
        let platform = self.platform.clone();

        Box::new(move |context| {
            let url = context.url();
            let href = context.href();
            let state = context.state();

            let kind = match is_navigation {
                true => {
                    platform.push_state(&state, &href);
                    CommitKind::Push
                }
                false => {
                    platform.replace_state(&state, Some(&href));
                    CommitKind::Replace
                }
            };
            if let Some(router) = router.upgrade() {
                router.settle(&platform.location());
            }

            tracing::debug!(?kind, "committed navigation to {href}");
            Commit { url, state, kind }
        })
    }
}

enum RouteHandleInner {
    Ready(Option<Result<(), NavigationError>>),
    Pending(oneshot::Receiver<Result<(), NavigationError>>),
}

/// Resolves when a navigation started by [`Router::route`] has finished.
///
/// Dropping the handle does not cancel the navigation; its errors are then reported to
/// [`RouterConfig::on_unhandled_error`] instead.
pub struct RouteHandle {
    inner: RouteHandleInner,
}

impl RouteHandle {
    fn ready(result: Result<(), NavigationError>) -> Self {
        Self {
            inner: RouteHandleInner::Ready(Some(result)),
        }
    }

    fn pending(rx: oneshot::Receiver<Result<(), NavigationError>>) -> Self {
        Self {
            inner: RouteHandleInner::Pending(rx),
        }
    }
}

impl Future for RouteHandle {
    type Output = Result<(), NavigationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            RouteHandleInner::Ready(result) => {
                Poll::Ready(result.take().expect("RouteHandle polled after completion"))
            }
            RouteHandleInner::Pending(rx) => rx
                .poll_unpin(cx)
                .map(|result| result.unwrap_or(Err(NavigationError::Dropped))),
        }
    }
}

impl fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner {
            RouteHandleInner::Ready(_) => "ready",
            RouteHandleInner::Pending(_) => "pending",
        };
        f.debug_tuple("RouteHandle").field(&state).finish()
    }
}
