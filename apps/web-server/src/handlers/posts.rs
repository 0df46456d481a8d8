//! Post pages: listings, detail, create/edit and comments.

use actix_web::http::header::ContentType;
use actix_web::{Either, HttpRequest, HttpResponse, web};
use serde::Deserialize;

use yatube_core::Page;
use yatube_core::domain::{NewComment, NewPost, Post, PostFilter};
use yatube_core::error::DomainError;
use yatube_core::forms::{CommentForm, CommentInput, ImageChange, PostForm};
use yatube_shared::RenderedPage;

use crate::extract::PostSubmission;
use crate::middleware::auth::{Identity, LoginRequired, OptionalIdentity};
use crate::middleware::error::{AppError, AppResult};
use crate::render::{PostCard, profile_url, redirect, render};
use crate::state::AppState;

/// Cache keys of rendered index pages start with this.
pub const INDEX_CACHE_PREFIX: &str = "index:";

const IMAGE_DIR: &str = "posts";
const EDIT_TITLE: &str = "Edit post";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// One page of the filtered listing, newest first.
pub(super) async fn page_of(
    state: &AppState,
    filter: PostFilter,
    query: &PageQuery,
) -> AppResult<Page<PostCard>> {
    let count = state.posts.count(filter).await?;
    let window = state.paginator.window(query.page.as_deref(), count);
    let posts = state.posts.list(filter, window).await?;

    Ok(window
        .into_page(posts)
        .map(|detail| PostCard::new(detail, state.media.as_ref())))
}

/// Cache key of an index page. Only the path and the page number take part,
/// so unrelated query parameters cannot mint new entries.
fn index_cache_key(path: &str, page: Option<&str>) -> String {
    let page = page.map(str::trim).unwrap_or_default();
    let digits = page.strip_prefix(['-', '+']).unwrap_or(page);
    let page = if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        page
    } else {
        "1"
    };
    format!("{INDEX_CACHE_PREFIX}{path}?page={page}")
}

/// GET /
///
/// Rendered pages are cached per page for a short while.
pub async fn index(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let key = index_cache_key(req.path(), query.page.as_deref());

    if let Some(body) = state.cache.get(&key).await {
        tracing::debug!(key = %key, "Index served from cache");
        return Ok(HttpResponse::Ok()
            .content_type(ContentType::json())
            .body(body));
    }

    let page_obj = page_of(&state, PostFilter::All, &query).await?;
    let page = RenderedPage::new("posts/index.html").with("page_obj", page_obj);
    let body = serde_json::to_string(&page).map_err(|e| AppError::Internal(e.to_string()))?;

    if let Err(e) = state
        .cache
        .set(&key, &body, Some(state.config.index_cache_ttl))
        .await
    {
        tracing::warn!(key = %key, error = %e, "Failed to cache index page");
    }

    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body))
}

/// GET /group/{slug}/
pub async fn group_list(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let slug = slug.into_inner();
    let group = state
        .groups
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| DomainError::not_found("Group", &slug))?;

    let page_obj = page_of(&state, PostFilter::Group(group.id), &query).await?;

    Ok(render(
        RenderedPage::new("posts/group_list.html")
            .with("group", &group)
            .with("page_obj", page_obj),
    ))
}

/// GET /profile/{username}/
pub async fn profile(
    state: web::Data<AppState>,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
    OptionalIdentity(viewer): OptionalIdentity,
) -> AppResult<HttpResponse> {
    let username = username.into_inner();
    let author = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| DomainError::not_found("User", &username))?;

    let filter = PostFilter::Author(author.id);
    let post_counter = state.posts.count(filter).await?;
    let page_obj = page_of(&state, filter, &query).await?;
    let following = match viewer {
        Some(viewer) => state.follows.exists(viewer.user_id, author.id).await?,
        None => false,
    };

    Ok(render(
        RenderedPage::new("posts/profile.html")
            .with("author", author.profile())
            .with("post_counter", post_counter)
            .with("page_obj", page_obj)
            .with("following", following),
    ))
}

/// GET /posts/{id}/
pub async fn post_detail(
    state: web::Data<AppState>,
    post_id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let post_id = post_id.into_inner();
    let detail = state
        .posts
        .find_detail(post_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Post", post_id))?;

    let post_counter = state
        .posts
        .count(PostFilter::Author(detail.post.author_id))
        .await?;
    let comments = state.comments.list_for_post(post_id).await?;
    let title = detail.post.title();

    Ok(render(
        RenderedPage::new("posts/post_detail.html")
            .with("post", PostCard::new(detail, state.media.as_ref()))
            .with("post_counter", post_counter)
            .with("title", title)
            .with("form", CommentForm::new().view())
            .with("comments", comments),
    ))
}

fn create_page(form: &PostForm) -> HttpResponse {
    render(RenderedPage::new("posts/create_post.html").with("form", form.view()))
}

fn edit_page(form: &PostForm) -> HttpResponse {
    render(
        RenderedPage::new("posts/create_post.html")
            .with("title", EDIT_TITLE)
            .with("form", form.view())
            .with("is_edit", true),
    )
}

/// GET /create/
pub async fn post_create_form(
    state: web::Data<AppState>,
    LoginRequired(_user): LoginRequired,
) -> AppResult<HttpResponse> {
    let groups = state.groups.list().await?;
    Ok(create_page(&PostForm::new(groups)))
}

/// POST /create/
pub async fn post_create(
    state: web::Data<AppState>,
    LoginRequired(user): LoginRequired,
    PostSubmission(input): PostSubmission,
) -> AppResult<HttpResponse> {
    let groups = state.groups.list().await?;
    let cleaned = match PostForm::bind(groups, input).clean() {
        Ok(cleaned) => cleaned,
        Err(form) => return Ok(create_page(&form)),
    };

    let image = match &cleaned.image {
        ImageChange::Replace(upload) => Some(state.media.save(IMAGE_DIR, upload).await?),
        ImageChange::Keep | ImageChange::Clear => None,
    };

    let created = state
        .posts
        .create(
            NewPost::new(user.user_id, cleaned.text)
                .in_group(cleaned.group_id)
                .with_image(image.clone()),
        )
        .await;
    let post = match created {
        Ok(post) => post,
        Err(e) => {
            discard_upload(&state, image).await;
            return Err(e.into());
        }
    };

    tracing::info!(post_id = post.id, author = %user.username, "Post created");
    Ok(redirect(profile_url(&user.username)))
}

/// Remove a file saved for a post that was never written.
async fn discard_upload(state: &AppState, path: Option<String>) {
    let Some(path) = path else { return };
    if let Err(e) = state.media.delete(&path).await {
        tracing::warn!(path = %path, error = %e, "Failed to remove orphaned upload");
    }
}

/// Load a post for editing. `Err` carries the response for anyone but the author.
async fn editable_post(
    state: &AppState,
    user: &Identity,
    post_id: i64,
) -> AppResult<Result<Post, HttpResponse>> {
    let post = state
        .posts
        .find_by_id(post_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Post", post_id))?;

    if !post.is_authored_by(user.user_id) {
        tracing::debug!(post_id, user_id = user.user_id, "Edit refused to non-author");
        return Ok(Err(redirect(post.url())));
    }

    Ok(Ok(post))
}

/// GET /posts/{id}/edit/
pub async fn post_edit_form(
    state: web::Data<AppState>,
    LoginRequired(user): LoginRequired,
    post_id: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let post = match editable_post(&state, &user, post_id.into_inner()).await? {
        Ok(post) => post,
        Err(response) => return Ok(response),
    };

    let groups = state.groups.list().await?;
    Ok(edit_page(&PostForm::for_post(groups, &post)))
}

/// POST /posts/{id}/edit/
pub async fn post_edit(
    state: web::Data<AppState>,
    LoginRequired(user): LoginRequired,
    post_id: web::Path<i64>,
    PostSubmission(input): PostSubmission,
) -> AppResult<HttpResponse> {
    let post = match editable_post(&state, &user, post_id.into_inner()).await? {
        Ok(post) => post,
        Err(response) => return Ok(response),
    };

    let groups = state.groups.list().await?;
    let cleaned = match PostForm::bind(groups, input).with_instance(&post).clean() {
        Ok(cleaned) => cleaned,
        Err(form) => return Ok(edit_page(&form)),
    };

    let stored = match &cleaned.image {
        ImageChange::Replace(upload) => Some(state.media.save(IMAGE_DIR, upload).await?),
        ImageChange::Keep | ImageChange::Clear => None,
    };
    let previous = post.image.clone();
    let image = cleaned.resolve_image(post.image.clone(), stored.clone());
    let location = post.url();

    let updated = match state
        .posts
        .update(Post {
            text: cleaned.text,
            group_id: cleaned.group_id,
            image,
            ..post
        })
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            discard_upload(&state, stored).await;
            return Err(e.into());
        }
    };

    if let Some(old) = previous.filter(|old| updated.image.as_ref() != Some(old)) {
        if let Err(e) = state.media.delete(&old).await {
            tracing::warn!(path = %old, error = %e, "Failed to remove replaced image");
        }
    }

    tracing::info!(post_id = updated.id, "Post updated");
    Ok(redirect(location))
}

/// POST /posts/{id}/comment/
///
/// Always lands back on the post; an invalid comment is dropped, and so is a
/// body that is not a urlencoded form at all.
pub async fn add_comment(
    state: web::Data<AppState>,
    LoginRequired(user): LoginRequired,
    post_id: web::Path<i64>,
    form: Either<web::Form<CommentInput>, web::Bytes>,
) -> AppResult<HttpResponse> {
    let post_id = post_id.into_inner();
    let post = state
        .posts
        .find_by_id(post_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Post", post_id))?;

    let input = match form {
        Either::Left(web::Form(input)) => input,
        Either::Right(_) => CommentInput::default(),
    };

    match CommentForm::bind(input).clean() {
        Ok(text) => {
            let comment = state
                .comments
                .create(NewComment::new(post.id, user.user_id, text))
                .await?;
            tracing::debug!(post_id, comment_id = comment.comment.id, "Comment added");
        }
        Err(form) => {
            tracing::debug!(post_id, errors = ?form.errors(), "Comment dropped");
        }
    }

    Ok(redirect(post.url()))
}
