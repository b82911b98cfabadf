//! Cooperative cancellation for navigations.

use std::{cell::RefCell, fmt, future::Future, rc::Rc};

use futures_channel::oneshot;
use futures_util::future::{self, Either};

type AbortListener = Box<dyn FnOnce()>;

enum SignalState {
    Active(Vec<AbortListener>),
    Aborted,
}

/// The read side of an [`AbortController`].
///
/// Once aborted, a signal stays aborted. Cancellation is advisory: nothing is forcibly stopped, code
/// holding a signal is expected to check [`AbortSignal::aborted`] at safe points and wind down.
#[derive(Clone)]
pub struct AbortSignal {
    state: Rc<RefCell<SignalState>>,
}

impl AbortSignal {
    fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SignalState::Active(Vec::new()))),
        }
    }

    /// Whether the controller has been aborted.
    pub fn aborted(&self) -> bool {
        matches!(*self.state.borrow(), SignalState::Aborted)
    }

    /// Run `listener` when the signal is aborted.
    ///
    /// Listeners run exactly once, in the order they were added, and see [`AbortSignal::aborted`]
    /// return `true`. Adding a listener to a signal that is already aborted does nothing; check
    /// [`AbortSignal::aborted`] first if that matters.
    pub fn add_listener(&self, listener: impl FnOnce() + 'static) {
        if let SignalState::Active(listeners) = &mut *self.state.borrow_mut() {
            listeners.push(Box::new(listener));
        }
    }

    /// A future that resolves once the signal is aborted.
    ///
    /// If the signal is dropped without ever being aborted, the future never resolves.
    pub fn cancelled(&self) -> impl Future<Output = ()> + 'static {
        if self.aborted() {
            return Either::Left(future::ready(()));
        }

        let (tx, rx) = oneshot::channel::<()>();
        self.add_listener(move || {
            let _ = tx.send(());
        });
        Either::Right(async move {
            if rx.await.is_err() {
                future::pending::<()>().await
            }
        })
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.aborted())
            .finish()
    }
}

/// The trigger side of an [`AbortSignal`].
#[derive(Debug)]
pub struct AbortController {
    signal: AbortSignal,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    /// Create a controller with a fresh, un-aborted signal.
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::new(),
        }
    }

    /// The signal this controller aborts.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort the signal and run its listeners. Only the first call has any effect.
    ///
    /// All listeners have run by the time this returns.
    pub fn abort(&self) {
        let previous = std::mem::replace(&mut *self.signal.state.borrow_mut(), SignalState::Aborted);
        let SignalState::Active(listeners) = previous else {
            return;
        };
        for listener in listeners {
            listener();
        }
    }
}
