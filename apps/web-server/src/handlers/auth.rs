//! Account handlers: sign-up, login and logout.

use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use yatube_core::domain::NewUser;
use yatube_core::error::RepoError;
use yatube_core::forms::{LoginForm, LoginInput, SignupForm, SignupInput};
use yatube_shared::RenderedPage;

use crate::middleware::auth::{Identity, SESSION_COOKIE};
use crate::middleware::error::AppResult;
use crate::render::render;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Only same-site paths are acceptable as a post-login destination.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn session_cookie(token: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

/// Redirect to `location` carrying a fresh session for `identity`.
fn logged_in(state: &AppState, identity: &Identity, location: &str) -> AppResult<HttpResponse> {
    let token = state
        .tokens
        .generate_token(identity.user_id, &identity.username)?;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .cookie(session_cookie(token, state.tokens.expiration_seconds()))
        .finish())
}

fn signup_page(form: &SignupForm) -> HttpResponse {
    render(RenderedPage::new("users/signup.html").with("form", form.view()))
}

fn login_page(form: &LoginForm, next: Option<&str>) -> HttpResponse {
    render(
        RenderedPage::new("users/login.html")
            .with("form", form.view())
            .with("next", next),
    )
}

/// GET /auth/signup/
pub async fn signup_form() -> HttpResponse {
    signup_page(&SignupForm::new())
}

/// POST /auth/signup/
pub async fn signup(
    state: web::Data<AppState>,
    form: web::Form<SignupInput>,
) -> AppResult<HttpResponse> {
    let input = match SignupForm::clean(form.into_inner()) {
        Ok(input) => input,
        Err(form) => return Ok(signup_page(&form)),
    };

    if state.users.find_by_username(&input.username).await?.is_some() {
        return Ok(signup_page(&SignupForm::taken(input.username)));
    }

    let password_hash = state.passwords.hash(&input.password)?;
    let user = match state
        .users
        .create(NewUser::new(input.username.clone(), password_hash))
        .await
    {
        Ok(user) => user,
        Err(RepoError::Constraint(_)) => {
            return Ok(signup_page(&SignupForm::taken(input.username)));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, username = %user.username, "User signed up");

    let identity = Identity {
        user_id: user.id,
        username: user.username,
    };
    logged_in(&state, &identity, "/")
}

/// GET /auth/login/
pub async fn login_form(query: web::Query<NextQuery>) -> HttpResponse {
    login_page(&LoginForm::new(), query.next.as_deref())
}

/// POST /auth/login/
pub async fn login(
    state: web::Data<AppState>,
    query: web::Query<NextQuery>,
    form: web::Form<LoginInput>,
) -> AppResult<HttpResponse> {
    let input = form.into_inner();
    let next = input.next.as_deref().or(query.next.as_deref());

    let user = state.users.find_by_username(input.username.trim()).await?;
    let verified = match &user {
        Some(user) => state.passwords.verify(&input.password, &user.password_hash)?,
        None => false,
    };

    let Some(user) = user.filter(|_| verified) else {
        tracing::debug!(username = %input.username, "Login rejected");
        return Ok(login_page(&LoginForm::rejected(input.username.clone()), next));
    };

    tracing::info!(user_id = user.id, "User logged in");

    let identity = Identity {
        user_id: user.id,
        username: user.username,
    };
    logged_in(&state, &identity, safe_next(next))
}

/// GET /auth/logout/
pub async fn logout() -> HttpResponse {
    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();

    HttpResponse::Ok()
        .cookie(removal)
        .json(RenderedPage::new("users/logged_out.html"))
}
