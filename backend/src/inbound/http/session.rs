//! Session helpers keeping handlers free of actix-session details.
//!
//! Authentication itself is external; the service only reads the user id
//! stored in the signed session cookie.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Error, UserId};

pub(crate) const USER_ID_KEY: &str = "user_id";

/// Newtype over [`Session`] exposing user-id operations only.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Wrap the request's session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self(session)
    }

    /// Store `user_id` in the session cookie.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the session cannot serialise the value.
    pub fn persist_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.0
            .insert(USER_ID_KEY, user_id.as_ref())
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    /// Current user id, or `None` when absent or unreadable.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the session state cannot be read.
    pub fn user_id(&self) -> Result<Option<UserId>, Error> {
        let stored = self
            .0
            .get::<String>(USER_ID_KEY)
            .map_err(|error| Error::internal(format!("failed to read session: {error}")))?;
        Ok(stored.and_then(|raw| {
            UserId::new(raw)
                .inspect_err(|error| warn!(%error, "invalid user id in session cookie"))
                .ok()
        }))
    }

    /// Require an authenticated user or fail with 401.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::ErrorCode::Unauthorized`] when no user is
    /// logged in.
    pub fn require_user_id(&self) -> Result<UserId, Error> {
        self.user_id()?
            .ok_or_else(|| Error::unauthorized("login required"))
    }

    /// Drop every session value.
    pub fn clear(&self) {
        self.0.purge();
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionContext::new) })
    }
}
