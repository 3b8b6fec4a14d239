//! Caller identity, resolved outside the core and handed in via headers.
//!
//! Upstream authentication terminates before this service and forwards
//! `x-user-id` for signed-in callers and `x-cart-id` for guest sessions.
//! Handlers never look identity up implicitly.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use checkout::CartOwner;
use common::{CartId, UserId};
use uuid::Uuid;

use crate::error::ApiError;

/// Who is calling.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user: Option<UserId>,
    pub cart: Option<CartId>,
}

impl Identity {
    /// The cart resolution path for this caller: user id when signed in,
    /// otherwise the session's anonymous cart id, if any.
    pub fn owner(&self) -> CartOwner {
        match self.user {
            Some(user) => CartOwner::User(user),
            None => CartOwner::Anonymous(self.cart),
        }
    }

    /// The signed-in user, or a uniform authorization failure.
    pub fn require_user(&self) -> Result<UserId, ApiError> {
        self.user.ok_or(ApiError::Forbidden)
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Option<Uuid>, ApiError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ApiError::BadRequest(format!("invalid {name} header")))?;
            Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| ApiError::BadRequest(format!("invalid {name} header")))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            user: header_uuid(parts, "x-user-id")?.map(UserId::from_uuid),
            cart: header_uuid(parts, "x-cart-id")?.map(CartId::from_uuid),
        })
    }
}
