//! Subscriptions: the feed and following/unfollowing authors.

use actix_web::{HttpResponse, web};

use yatube_core::domain::{Follow, PostFilter, User};
use yatube_core::error::DomainError;
use yatube_shared::RenderedPage;

use super::posts::{PageQuery, page_of};
use crate::middleware::auth::LoginRequired;
use crate::middleware::error::AppResult;
use crate::render::{profile_url, redirect, render};
use crate::state::AppState;

async fn find_author(state: &AppState, username: &str) -> AppResult<User> {
    let author = state
        .users
        .find_by_username(username)
        .await?
        .ok_or_else(|| DomainError::not_found("User", username))?;
    Ok(author)
}

/// GET /follow/
pub async fn follow_index(
    state: web::Data<AppState>,
    LoginRequired(user): LoginRequired,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let page_obj = page_of(&state, PostFilter::FollowedBy(user.user_id), &query).await?;
    Ok(render(
        RenderedPage::new("posts/follow.html").with("page_obj", page_obj),
    ))
}

/// GET /profile/{username}/follow/
pub async fn profile_follow(
    state: web::Data<AppState>,
    LoginRequired(user): LoginRequired,
    username: web::Path<String>,
) -> AppResult<HttpResponse> {
    let author = find_author(&state, &username).await?;

    // Following yourself is a no-op.
    if let Ok(edge) = Follow::between(user.user_id, author.id) {
        let created = state.follows.follow(edge).await?;
        tracing::debug!(follower = user.user_id, author = author.id, created, "Follow");
    }

    Ok(redirect(profile_url(&author.username)))
}

/// GET /profile/{username}/unfollow/
pub async fn profile_unfollow(
    state: web::Data<AppState>,
    LoginRequired(user): LoginRequired,
    username: web::Path<String>,
) -> AppResult<HttpResponse> {
    let author = find_author(&state, &username).await?;

    let removed = state.follows.unfollow(user.user_id, author.id).await?;
    tracing::debug!(follower = user.user_id, author = author.id, removed, "Unfollow");

    Ok(redirect(profile_url(&author.username)))
}
