//! Authentication extractors.
//!
//! The session token travels in the `yatube_session` cookie set at login, or
//! in an `Authorization: Bearer` header for non-browser clients.

use std::fmt;
use std::future::{Ready, ready};

use actix_web::http::{StatusCode, header};
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, dev::Payload, web};

use yatube_core::ports::{AuthError, TokenClaims};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "yatube_session";

/// Authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}

fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn identify(req: &HttpRequest) -> Result<Identity, AuthError> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        tracing::error!("AppState not found in app data");
        return Err(AuthError::InvalidToken(
            "Server configuration error".to_string(),
        ));
    };

    let token = session_token(req).ok_or(AuthError::MissingAuth)?;
    state.tokens.validate_token(&token).map(Identity::from)
}

/// Optional identity extractor - anonymous visitors get `None`.
pub struct OptionalIdentity(pub Option<Identity>);

impl FromRequest for OptionalIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match identify(req) {
            Ok(identity) => ready(Ok(OptionalIdentity(Some(identity)))),
            Err(AuthError::MissingAuth) => ready(Ok(OptionalIdentity(None))),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unusable session token");
                ready(Ok(OptionalIdentity(None)))
            }
        }
    }
}

/// Identity for pages that need a logged-in user.
///
/// Anonymous requests never reach the handler: they are redirected to the
/// login page with the original path and query in `next`.
pub struct LoginRequired(pub Identity);

#[derive(Debug)]
pub struct LoginRedirect {
    location: String,
}

impl LoginRedirect {
    fn for_request(req: &HttpRequest) -> Self {
        let login_url = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.login_url.clone())
            .unwrap_or_else(|| "/auth/login/".to_string());

        let next = match req.query_string() {
            "" => req.path().to_string(),
            query => format!("{}?{}", req.path(), query),
        };

        Self {
            location: format!("{login_url}?next={}", urlencoding::encode(&next)),
        }
    }
}

impl fmt::Display for LoginRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Login required, redirecting to {}", self.location)
    }
}

impl ResponseError for LoginRedirect {
    fn status_code(&self) -> StatusCode {
        StatusCode::FOUND
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Found()
            .insert_header((header::LOCATION, self.location.clone()))
            .finish()
    }
}

impl FromRequest for LoginRequired {
    type Error = LoginRedirect;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match identify(req) {
            Ok(identity) => ready(Ok(LoginRequired(identity))),
            Err(e) => {
                tracing::debug!(path = %req.path(), reason = %e, "Login required");
                ready(Err(LoginRedirect::for_request(req)))
            }
        }
    }
}
