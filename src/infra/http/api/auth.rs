//! Bearer-token extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::application::auth::AuthError;
use crate::application::error::HttpError;
use crate::domain::entities::UserRecord;
use crate::infra::http::middleware::RequestContext;

use super::state::ApiState;

/// The author resolved from `Authorization: Bearer <token>`; rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserRecord);

/// Like [`AuthUser`] but anonymous when the header is absent or the token
/// does not resolve.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<UserRecord>);

impl MaybeAuthUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::Malformed)?;
        let user = state.auth.authenticate(token).await?;
        record_author(parts, &user);
        Ok(Self(user))
    }
}

impl FromRequestParts<ApiState> for MaybeAuthUser {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self(None));
        };

        match state.auth.authenticate(token).await {
            Ok(user) => {
                record_author(parts, &user);
                Ok(Self(Some(user)))
            }
            Err(AuthError::Repo(err)) => Err(AuthError::Repo(err).into()),
            Err(_) => Ok(Self(None)),
        }
    }
}

fn record_author(parts: &Parts, user: &UserRecord) {
    if let Some(ctx) = parts.extensions.get::<RequestContext>() {
        ctx.record_author(user.id);
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let raw = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
