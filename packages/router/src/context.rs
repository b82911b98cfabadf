use std::{
    cell::{Cell, RefCell},
    fmt,
    future::Future,
    rc::Rc,
};

use serde_json::Value;
use spa_history::Platform;
use url::Url;

use crate::{abort::AbortSignal, error::AbortError, scroll::scroll_to_hash, utils};

/// How a [`Commit`] was written to the history stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitKind {
    /// A new entry was pushed. Used for fresh navigations.
    Push,

    /// The current entry was overwritten. Used when revisiting an entry (back, forward, reload).
    Replace,
}

/// What a navigation wrote to the history stack when it committed.
#[derive(Clone, Debug, PartialEq)]
pub struct Commit {
    /// The committed location.
    pub url: Url,

    /// The state stored with the entry.
    pub state: Value,

    /// Whether the entry was pushed or replaced.
    pub kind: CommitKind,
}

impl Commit {
    /// The committed location relative to its origin.
    pub fn href(&self) -> String {
        utils::href(&self.url)
    }
}

/// Where a navigation is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationPhase {
    /// Neither committed nor preempted yet.
    Pending,

    /// [`NavigationContext::ready`] wrote the navigation to the history stack.
    Committed,

    /// A newer navigation preempted this one before it committed.
    Aborted,
}

pub(crate) type CommitFn = Box<dyn Fn(&NavigationContext) -> Commit>;

/// Revisits read and write the live history entry until they commit or are preempted. Fresh
/// navigations buffer their state until they are pushed.
enum ContextState {
    Attached,
    Detached(Value),
}

enum ReadyStep {
    First(Commit),
    Repeat(Option<Commit>),
    Aborted,
}

struct ContextInner {
    url: RefCell<Url>,
    state: RefCell<ContextState>,
    ready_run: Cell<bool>,
    committed: RefCell<Option<Commit>>,
    signal: AbortSignal,
    first_run: bool,
    is_navigation: bool,
    platform: Rc<dyn Platform>,
    commit: CommitFn,
}

impl ContextInner {
    fn detach(&self) {
        let mut state = self.state.borrow_mut();
        if let ContextState::Attached = *state {
            *state = ContextState::Detached(self.platform.history_state());
        }
    }
}

/// The handle a navigation handler receives for one navigation.
///
/// The context lets the handler inspect and adjust where the navigation is going, read and write
/// the history state that goes with it, notice when a newer navigation preempts it, and finally
/// commit it with [`NavigationContext::ready`]. Until then the address bar and history stack are
/// left untouched.
///
/// Contexts are cheap to clone; all clones refer to the same navigation.
#[derive(Clone)]
pub struct NavigationContext {
    inner: Rc<ContextInner>,
}

impl NavigationContext {
    pub(crate) fn new(
        url: Url,
        signal: AbortSignal,
        first_run: bool,
        is_navigation: bool,
        platform: Rc<dyn Platform>,
        commit: CommitFn,
    ) -> Self {
        let state = match is_navigation {
            true => ContextState::Detached(Value::Null),
            false => ContextState::Attached,
        };

        let context = Self {
            inner: Rc::new(ContextInner {
                url: RefCell::new(url),
                state: RefCell::new(state),
                ready_run: Cell::new(false),
                committed: RefCell::new(None),
                signal,
                first_run,
                is_navigation,
                platform,
                commit,
            }),
        };

        if !is_navigation {
            let inner = Rc::downgrade(&context.inner);
            context.inner.signal.add_listener(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.detach();
                }
            });
        }

        context
    }

    /// Where this navigation is going.
    pub fn url(&self) -> Url {
        self.inner.url.borrow().clone()
    }

    /// Change where this navigation is going. `url` is resolved against the current destination,
    /// so relative updates work.
    pub fn set_url(&self, url: &str) -> Result<(), url::ParseError> {
        let next = self.inner.url.borrow().join(url)?;
        *self.inner.url.borrow_mut() = next;
        Ok(())
    }

    /// The destination relative to its origin: `pathname + search + hash`.
    pub fn href(&self) -> String {
        utils::href(&self.inner.url.borrow())
    }

    /// Same as [`NavigationContext::set_url`].
    pub fn set_href(&self, href: &str) -> Result<(), url::ParseError> {
        self.set_url(href)
    }

    /// The path of the destination.
    pub fn pathname(&self) -> String {
        self.inner.url.borrow().path().to_string()
    }

    /// Replace the path of the destination.
    pub fn set_pathname(&self, pathname: &str) {
        self.inner.url.borrow_mut().set_path(pathname);
    }

    /// The query of the destination, starting with `?`, or blank.
    pub fn search(&self) -> String {
        utils::search(&self.inner.url.borrow())
    }

    /// Replace the query of the destination. A leading `?` is optional.
    pub fn set_search(&self, search: &str) {
        let query = search.strip_prefix('?').unwrap_or(search);
        self.inner
            .url
            .borrow_mut()
            .set_query((!query.is_empty()).then_some(query));
    }

    /// The fragment of the destination, starting with `#`, or blank.
    pub fn hash(&self) -> String {
        utils::hash(&self.inner.url.borrow())
    }

    /// Replace the fragment of the destination. A leading `#` is optional.
    pub fn set_hash(&self, hash: &str) {
        let fragment = hash.strip_prefix('#').unwrap_or(hash);
        self.inner
            .url
            .borrow_mut()
            .set_fragment((!fragment.is_empty()).then_some(fragment));
    }

    /// The history state for this navigation.
    ///
    /// For a revisit that has not committed yet this is whatever the current history entry holds.
    /// Fresh navigations start out with [`Value::Null`].
    pub fn state(&self) -> Value {
        match &*self.inner.state.borrow() {
            ContextState::Attached => self.inner.platform.history_state(),
            ContextState::Detached(state) => state.clone(),
        }
    }

    /// Set the history state for this navigation.
    ///
    /// A revisit that has not committed yet writes straight through to the current history entry,
    /// since that entry already exists. Anything else is kept until commit. Writes after commit
    /// never reach the history stack.
    pub fn set_state(&self, state: impl Into<Value>) {
        let state = state.into();
        match &mut *self.inner.state.borrow_mut() {
            ContextState::Attached => self.inner.platform.replace_state(&state, None),
            ContextState::Detached(slot) => *slot = state,
        }
    }

    /// Aborted once a newer navigation preempts this one.
    pub fn signal(&self) -> &AbortSignal {
        &self.inner.signal
    }

    /// Whether this is the navigation the router dispatched for the initial location.
    pub fn first_run(&self) -> bool {
        self.inner.first_run
    }

    /// `true` for a fresh navigation to a new entry, `false` for a revisit of an existing entry
    /// (back, forward, reload, or the first run).
    pub fn is_navigation(&self) -> bool {
        self.inner.is_navigation
    }

    /// Where this navigation is in its lifecycle.
    pub fn phase(&self) -> NavigationPhase {
        if self.inner.committed.borrow().is_some() {
            NavigationPhase::Committed
        } else if self.inner.signal.aborted() {
            NavigationPhase::Aborted
        } else {
            NavigationPhase::Pending
        }
    }

    /// Bail out if this navigation has been preempted.
    ///
    /// ```rust,ignore
    /// let data = fetch_page(&context.href()).await?;
    /// context.maybe_abort()?;
    /// render(data);
    /// context.ready();
    /// ```
    pub fn maybe_abort(&self) -> Result<(), AbortError> {
        self.maybe_abort_with(|| {})
    }

    /// Like [`NavigationContext::maybe_abort`], running `on_abort` before bailing out.
    pub fn maybe_abort_with(&self, on_abort: impl FnOnce()) -> Result<(), AbortError> {
        if self.inner.signal.aborted() {
            on_abort();
            return Err(AbortError);
        }
        Ok(())
    }

    /// Commit this navigation: write it to the history stack and restore the scroll position.
    ///
    /// Only the first call does anything; later calls return the same [`Commit`]. A navigation that
    /// was preempted before it got here never commits and returns [`None`].
    pub fn ready(&self) -> Option<Commit> {
        match self.begin_commit() {
            ReadyStep::First(commit) => {
                self.restore_scroll(&commit);
                Some(commit)
            }
            ReadyStep::Repeat(commit) => commit,
            ReadyStep::Aborted => None,
        }
    }

    /// Commit this navigation, running `ready_handler` between updating the history stack and
    /// restoring the scroll position.
    ///
    /// The history write and the call to `ready_handler` happen right away. The returned future
    /// waits for the future `ready_handler` returned, then restores the scroll position. Use this to
    /// swap in the new page while the address bar already shows the new location.
    ///
    /// `ready_handler` is called even when this navigation already committed or was preempted, but
    /// then nothing is committed, its outcome is ignored, and the result matches
    /// [`NavigationContext::ready`].
    pub fn ready_with<F, Fut>(
        &self,
        ready_handler: F,
    ) -> impl Future<Output = anyhow::Result<Option<Commit>>> + 'static
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let step = self.begin_commit();
        let pending = ready_handler();
        let context = self.clone();

        async move {
            let commit = match step {
                ReadyStep::First(commit) => commit,
                ReadyStep::Repeat(commit) => {
                    if let Err(err) = pending.await {
                        tracing::debug!("ignoring ready handler error after commit: {err}");
                    }
                    return Ok(commit);
                }
                ReadyStep::Aborted => {
                    if let Err(err) = pending.await {
                        tracing::debug!("ignoring ready handler error of preempted navigation: {err}");
                    }
                    return Ok(None);
                }
            };

            pending.await?;
            context.restore_scroll(&commit);
            Ok(Some(commit))
        }
    }

    fn begin_commit(&self) -> ReadyStep {
        if self.inner.ready_run.get() {
            return ReadyStep::Repeat(self.inner.committed.borrow().clone());
        }
        if self.inner.signal.aborted() {
            tracing::debug!("not committing preempted navigation to {}", self.href());
            return ReadyStep::Aborted;
        }

        self.inner.ready_run.set(true);
        self.inner.detach();
        let commit = (self.inner.commit)(self);
        *self.inner.committed.borrow_mut() = Some(commit.clone());
        ReadyStep::First(commit)
    }

    fn restore_scroll(&self, commit: &Commit) {
        // revisits leave scrolling to the platform, and a newer navigation owns the viewport
        if commit.kind == CommitKind::Push && !self.inner.signal.aborted() {
            scroll_to_hash(&*self.inner.platform, &utils::hash(&commit.url), 0.0);
        }
    }
}

impl fmt::Debug for NavigationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationContext")
            .field("url", &self.inner.url.borrow().as_str())
            .field("first_run", &self.inner.first_run)
            .field("is_navigation", &self.inner.is_navigation)
            .field("phase", &self.phase())
            .finish()
    }
}
