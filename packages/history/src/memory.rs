use std::cell::RefCell;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use futures_util::future::LocalBoxFuture;
use serde_json::Value;
use url::Url;

use crate::{ClickEvent, Listener, Platform, PlatformEvent};

struct Entry {
    url: Url,
    state: Value,
}

struct MemoryPlatformState {
    entries: Vec<Entry>,
    index: usize,
    elements: Vec<(String, f64)>,
    scroll_top: f64,
    loads: Vec<Url>,
}

impl MemoryPlatformState {
    fn current(&self) -> &Entry {
        &self.entries[self.index]
    }

    fn current_mut(&mut self) -> &mut Entry {
        &mut self.entries[self.index]
    }

    fn resolve(&self, url: &str) -> Option<Url> {
        match self.current().url.join(url) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!("ignoring unresolvable url {url:?}: {err}");
                None
            }
        }
    }

    fn push(&mut self, url: Url, state: Value) {
        self.entries.truncate(self.index + 1);
        self.entries.push(Entry { url, state });
        self.index = self.entries.len() - 1;
    }

    fn scroll_into_view(&mut self, id: &str) -> bool {
        match self.elements.iter().find(|(element, _)| element == id) {
            Some((_, offset)) => {
                self.scroll_top = *offset;
                true
            }
            None => false,
        }
    }
}

/// A [`Platform`] that models a single document entirely in memory.
///
/// It keeps its own history stack (with per-entry state), a list of element ids with their scroll
/// offsets, and a local executor for spawned tasks. Full loads are recorded instead of performed.
/// Nothing runs on its own: drive spawned tasks with [`MemoryPlatform::run_until_stalled`] and user
/// interaction with [`MemoryPlatform::click`], [`MemoryPlatform::back`] and friends.
///
/// ```rust
/// # use spa_history::{MemoryPlatform, Platform};
/// let platform = MemoryPlatform::new("http://localhost/start".parse().unwrap());
/// platform.push_state(&serde_json::Value::Null, "/next");
/// assert_eq!(platform.location().path(), "/next");
///
/// platform.back();
/// assert_eq!(platform.location().path(), "/start");
/// ```
pub struct MemoryPlatform {
    state: RefCell<MemoryPlatformState>,
    listeners: RefCell<Vec<Listener>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl MemoryPlatform {
    /// Create a [`MemoryPlatform`] whose only history entry is `url`, with no state.
    pub fn new(url: Url) -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            state: RefCell::new(MemoryPlatformState {
                entries: vec![Entry {
                    url,
                    state: Value::Null,
                }],
                index: 0,
                elements: Vec::new(),
                scroll_top: 0.0,
                loads: Vec::new(),
            }),
            listeners: RefCell::new(Vec::new()),
            pool: RefCell::new(pool),
            spawner,
        }
    }

    /// Add an element with the given id, located `offset` pixels down the document.
    pub fn add_element(&self, id: impl ToString, offset: f64) {
        self.state
            .borrow_mut()
            .elements
            .push((id.to_string(), offset));
    }

    /// The current vertical scroll offset of the document.
    pub fn scroll_top(&self) -> f64 {
        self.state.borrow().scroll_top
    }

    /// Every url a full load was requested for, oldest first.
    pub fn loads(&self) -> Vec<Url> {
        self.state.borrow().loads.clone()
    }

    /// The number of entries in the history stack.
    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// The position of the current entry in the history stack.
    pub fn index(&self) -> usize {
        self.state.borrow().index
    }

    /// Whether there is an entry before the current one.
    pub fn can_go_back(&self) -> bool {
        self.index() > 0
    }

    /// Whether there is an entry after the current one.
    pub fn can_go_forward(&self) -> bool {
        let state = self.state.borrow();
        state.index + 1 < state.entries.len()
    }

    /// Move `delta` entries through the history stack and emit [`PlatformEvent::PopState`].
    ///
    /// Moves that would leave the stack are ignored, just like `history.go` does.
    pub fn go(&self, delta: isize) {
        {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.index.checked_add_signed(delta) else {
                return;
            };
            if delta == 0 || index >= state.entries.len() {
                return;
            }
            state.index = index;
        }
        self.dispatch(&PlatformEvent::PopState);
    }

    /// Go one entry back.
    pub fn back(&self) {
        self.go(-1)
    }

    /// Go one entry forward.
    pub fn forward(&self) {
        self.go(1)
    }

    /// Deliver a click to the listeners. Returns `true` if one of them prevented the default.
    ///
    /// If nobody prevented it, the default action runs: a plain click on a link to a fragment of the
    /// current page pushes a new entry, scrolls, and emits [`PlatformEvent::PopState`]; any other
    /// plain click on a link is recorded as a full load.
    pub fn click(&self, event: ClickEvent) -> bool {
        let prevented = self.dispatch(&PlatformEvent::Click(event.clone()));
        if !prevented && !event.default_prevented {
            self.follow_link(&event);
        }
        prevented
    }

    /// Click a link to `href` with the primary button and no modifiers.
    pub fn click_link(&self, href: &str) -> bool {
        self.click(ClickEvent::on_link(href))
    }

    /// Run spawned tasks until none of them can make progress.
    ///
    /// Must not be called from inside a spawned task.
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    fn dispatch(&self, event: &PlatformEvent) -> bool {
        let listeners = self.listeners.borrow().clone();
        listeners
            .iter()
            .fold(false, |prevented, listener| listener(event) | prevented)
    }

    fn follow_link(&self, event: &ClickEvent) {
        let Some(link) = &event.link else {
            return;
        };
        let modified = event.ctrl_key || event.meta_key || event.alt_key || event.shift_key;
        let elsewhere = link.target.as_deref().is_some_and(|target| !target.is_empty());
        if modified || elsewhere || event.button != 0 {
            // opens in another browsing context, nothing happens to this document
            return;
        }

        let hash_only = {
            let mut state = self.state.borrow_mut();
            let Some(url) = state.resolve(&link.href) else {
                return;
            };
            let current = &state.current().url;
            let same_document = url.path() == current.path() && url.query() == current.query();
            let fragment = url
                .fragment()
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            match fragment {
                Some(id) if same_document => {
                    state.push(url, Value::Null);
                    if !state.scroll_into_view(&id) {
                        state.scroll_top = 0.0;
                    }
                    true
                }
                _ => {
                    state.loads.push(url);
                    false
                }
            }
        };

        if hash_only {
            self.dispatch(&PlatformEvent::PopState);
        }
    }
}

impl Platform for MemoryPlatform {
    fn location(&self) -> Url {
        self.state.borrow().current().url.clone()
    }

    fn history_state(&self) -> Value {
        self.state.borrow().current().state.clone()
    }

    fn push_state(&self, state: &Value, url: &str) {
        let mut write = self.state.borrow_mut();
        if let Some(url) = write.resolve(url) {
            write.push(url, state.clone());
        }
    }

    fn replace_state(&self, state: &Value, url: Option<&str>) {
        let mut write = self.state.borrow_mut();
        let url = match url {
            Some(url) => match write.resolve(url) {
                Some(url) => Some(url),
                None => return,
            },
            None => None,
        };
        let entry = write.current_mut();
        entry.state = state.clone();
        if let Some(url) = url {
            entry.url = url;
        }
    }

    fn load(&self, url: &Url) {
        tracing::debug!("memory platform recorded a full load of {url}");
        self.state.borrow_mut().loads.push(url.clone());
    }

    fn scroll_into_view(&self, id: &str) -> bool {
        self.state.borrow_mut().scroll_into_view(id)
    }

    fn set_scroll_top(&self, offset: f64) {
        self.state.borrow_mut().scroll_top = offset;
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawner.spawn_local(task) {
            tracing::error!("failed to spawn task on the memory platform: {err}");
        }
    }

    fn listen(&self, listener: Listener) {
        self.listeners.borrow_mut().push(listener);
    }
}
