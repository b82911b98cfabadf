use url::Url;

/// Returned by [`NavigationContext::maybe_abort`](crate::NavigationContext::maybe_abort) once the
/// navigation has been preempted by a newer one.
///
/// Handlers are expected to let it propagate with `?` instead of catching it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("navigation was preempted by a newer navigation")]
pub struct AbortError;

/// An error produced while setting up a [`Router`](crate::Router).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// [`Router::configure`](crate::Router::configure) was called on a router that is already listening.
    #[error("the router can only be configured once")]
    AlreadyConfigured,
}

/// Why a navigation did not complete.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    /// The target was handed to the platform for a full load instead of being intercepted.
    #[error("navigation to {0} was not intercepted")]
    NotIntercepted(Url),

    /// The target could not be resolved against the current location.
    #[error("failed to resolve navigation target: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The handler bailed out because a newer navigation preempted it.
    #[error(transparent)]
    Aborted(#[from] AbortError),

    /// The handler failed.
    #[error("navigation handler failed: {0}")]
    Handler(anyhow::Error),

    /// The task driving the navigation was dropped before it finished.
    #[error("navigation task was dropped before it finished")]
    Dropped,
}

impl NavigationError {
    /// Sort a handler failure into [`NavigationError::Aborted`] or [`NavigationError::Handler`].
    pub(crate) fn from_handler(err: anyhow::Error) -> Self {
        match err.downcast::<AbortError>() {
            Ok(aborted) => Self::Aborted(aborted),
            Err(err) => Self::Handler(err),
        }
    }

    /// Whether this is the cancellation signal of a preempted navigation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}
