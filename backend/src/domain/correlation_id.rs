//! Request-scoped correlation identifier for tracing across logs, errors,
//! and outbound provider calls.
//!
//! `CorrelationId` uses task-local storage so the current identifier is
//! available without explicit parameter threading.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`CorrelationId::scope`] when spawning new tasks to propagate the active
//! identifier.

use std::future::Future;

use tokio::task_local;
use uuid::Uuid;

/// Header carrying the correlation identifier on requests and responses.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

task_local! {
    static CORRELATION_ID: CorrelationId;
}

/// Per-request correlation identifier exposed via task-local storage.
///
/// # Examples
/// ```
/// use payouts::domain::CorrelationId;
///
/// async fn handler() {
///     if let Some(id) = CorrelationId::current() {
///         tracing::info!(correlation_id = %id, "handling request");
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new random correlation identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct a correlation identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the correlation identifier in scope, if any.
    #[must_use]
    #[rustfmt::skip]
    pub fn current() -> Option<Self> { CORRELATION_ID.try_with(|id| *id).ok() }

    /// Access the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Execute the provided future with the supplied identifier in scope.
    ///
    /// # Examples
    /// ```
    /// use payouts::domain::CorrelationId;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let id = CorrelationId::generate();
    /// let observed = CorrelationId::scope(id, async move { CorrelationId::current() }).await;
    /// assert_eq!(observed, Some(id));
    /// # });
    /// ```
    pub async fn scope<Fut>(id: Self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        CORRELATION_ID.scope(id, fut).await
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}
