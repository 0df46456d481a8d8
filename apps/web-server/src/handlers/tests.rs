use std::sync::Arc;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use serde_json::Value;

use yatube_core::domain::{NewGroup, NewPost, NewUser, Post, PostFilter, User};
use yatube_core::ports::{
    BaseRepository, Cache, CommentRepository, FollowRepository, GroupRepository, PostRepository,
    TokenService, UserRepository,
};
use yatube_infra::{Argon2PasswordService, InMemoryStore};

use super::configure_routes;
use super::posts::INDEX_CACHE_PREFIX;
use crate::config::AppConfig;
use crate::middleware::auth::SESSION_COOKIE;
use crate::middleware::error::not_found;
use crate::state::AppState;

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes)
                .default_service(web::to(not_found)),
        )
        .await
    };
}

fn state_in(media_root: &std::path::Path) -> AppState {
    let config = AppConfig {
        media_root: media_root.to_path_buf(),
        ..AppConfig::default()
    };
    let mut state = AppState::in_memory(config, InMemoryStore::new());
    state.passwords = Arc::new(Argon2PasswordService::with_params(1024, 1).unwrap());
    state
}

fn state() -> AppState {
    state_in(&std::env::temp_dir())
}

async fn user(state: &AppState, username: &str) -> User {
    state
        .users
        .create(NewUser::new(username, "unusable"))
        .await
        .unwrap()
}

fn bearer(state: &AppState, user: &User) -> (header::HeaderName, String) {
    let token = state.tokens.generate_token(user.id, &user.username).unwrap();
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

async fn post(state: &AppState, author: &User, text: &str) -> Post {
    state
        .posts
        .create(NewPost::new(author.id, text))
        .await
        .unwrap()
}

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn object_count(body: &Value) -> usize {
    body["context"]["page_obj"]["object_list"]
        .as_array()
        .map(Vec::len)
        .unwrap_or_default()
}

/// A multipart post form carrying `text` and a one-pixel GIF.
fn gif_form(text: &str) -> (String, Vec<u8>) {
    let boundary = "yatube-test-boundary";
    let gif: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x00\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n{text}\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"small.gif\"\r\n\
             Content-Type: image/gif\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(gif);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[actix_web::test]
async fn test_index_paginates_ten_per_page() {
    let state = state();
    let author = user(&state, "leo").await;
    for i in 0..13 {
        post(&state, &author, &format!("Post {i}")).await;
    }
    let app = app!(state);

    let first: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/").to_request(),
    )
    .await;
    assert_eq!(first["template"], "posts/index.html");
    assert_eq!(object_count(&first), 10);
    assert_eq!(first["context"]["page_obj"]["num_pages"], 2);
    assert_eq!(first["context"]["page_obj"]["object_list"][0]["text"], "Post 12");
    assert_eq!(
        first["context"]["page_obj"]["object_list"][0]["author"]["username"],
        "leo"
    );

    let second: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/?page=2").to_request(),
    )
    .await;
    assert_eq!(object_count(&second), 3);

    let garbage: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/?page=abc").to_request(),
    )
    .await;
    assert_eq!(garbage["context"]["page_obj"]["number"], 1);

    let beyond: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/?page=99").to_request(),
    )
    .await;
    assert_eq!(beyond["context"]["page_obj"]["number"], 2);
}

#[actix_web::test]
async fn test_group_and_profile_listings_are_filtered() {
    let state = state();
    let leo = user(&state, "leo").await;
    let ann = user(&state, "ann").await;
    let cats = state
        .groups
        .create(NewGroup::new("Cats", "cats", "All about cats"))
        .await
        .unwrap();
    state
        .posts
        .create(NewPost::new(leo.id, "Filed").in_group(Some(cats.id)))
        .await
        .unwrap();
    post(&state, &leo, "Loose").await;
    post(&state, &ann, "Other").await;
    let app = app!(state);

    let group: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/group/cats/").to_request(),
    )
    .await;
    assert_eq!(group["context"]["group"]["title"], "Cats");
    assert_eq!(object_count(&group), 1);

    let profile: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/profile/leo/").to_request(),
    )
    .await;
    assert_eq!(profile["context"]["author"]["username"], "leo");
    assert_eq!(profile["context"]["post_counter"], 2);
    assert_eq!(profile["context"]["following"], false);

    let missing = test::call_service(
        &app,
        test::TestRequest::get().uri("/group/dogs/").to_request(),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_anonymous_create_and_edit_redirect_to_login() {
    let state = state();
    let author = user(&state, "leo").await;
    let written = post(&state, &author, "Text").await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/create/").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/auth/login/?next=%2Fcreate%2F");

    let edit_path = format!("/posts/{}/edit/", written.id);
    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri(&edit_path).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(&resp),
        format!("/auth/login/?next={}", urlencoding::encode(&edit_path))
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/follow/?page=2").to_request(),
    )
    .await;
    assert_eq!(location(&resp), "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2");
}

#[actix_web::test]
async fn test_non_author_never_gets_the_edit_form() {
    let state = state();
    let author = user(&state, "leo").await;
    let stranger = user(&state, "ann").await;
    let written = post(&state, &author, "Original").await;
    let app = app!(state);
    let path = format!("/posts/{}/edit/", written.id);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&path)
            .insert_header(bearer(&state, &stranger))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", written.id));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&path)
            .insert_header(bearer(&state, &stranger))
            .set_form(vec![("text", "Hijacked")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let stored = state.posts.find_by_id(written.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "Original");
}

#[actix_web::test]
async fn test_author_edits_post() {
    let state = state();
    let author = user(&state, "leo").await;
    let written = post(&state, &author, "Original").await;
    let app = app!(state);
    let path = format!("/posts/{}/edit/", written.id);

    let page: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&path)
            .insert_header(bearer(&state, &author))
            .to_request(),
    )
    .await;
    assert_eq!(page["template"], "posts/create_post.html");
    assert_eq!(page["context"]["is_edit"], true);
    assert_eq!(page["context"]["form"]["fields"][1]["value"], "Original");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&path)
            .insert_header(bearer(&state, &author))
            .set_form(vec![("text", "Edited"), ("group", "")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", written.id));

    let stored = state.posts.find_by_id(written.id).await.unwrap().unwrap();
    assert_eq!(stored.text, "Edited");
    assert_eq!(stored.pub_date, written.pub_date);
}

#[actix_web::test]
async fn test_invalid_edit_rerenders_with_errors() {
    let state = state();
    let author = user(&state, "leo").await;
    let written = post(&state, &author, "Original").await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/posts/{}/edit/", written.id))
            .insert_header(bearer(&state, &author))
            .set_form(vec![("text", "  ")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let page: Value = test::read_body_json(resp).await;
    assert_eq!(
        page["context"]["form"]["fields"][1]["errors"][0],
        "This field is required."
    );
}

#[actix_web::test]
async fn test_cached_index_survives_deletion_until_cleared() {
    let state = state();
    let author = user(&state, "leo").await;
    let doomed = post(&state, &author, "Soon gone").await;
    let app = app!(state);

    let before =
        test::call_and_read_body(&app, test::TestRequest::get().uri("/").to_request()).await;

    state.posts.delete(doomed.id).await.unwrap();

    let cached =
        test::call_and_read_body(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(before, cached);

    state.cache.clear_prefix(INDEX_CACHE_PREFIX).await.unwrap();

    let fresh: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request())
            .await;
    assert_eq!(object_count(&fresh), 0);
}

#[actix_web::test]
async fn test_follow_is_idempotent_and_feeds_posts() {
    let state = state();
    let reader = user(&state, "reader").await;
    let author = user(&state, "author").await;
    post(&state, &author, "Followed words").await;
    let app = app!(state);

    for _ in 0..2 {
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/profile/author/follow/")
                .insert_header(bearer(&state, &reader))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/profile/author/");
    }
    assert_eq!(state.follows.count().await.unwrap(), 1);

    let profile: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/profile/author/")
            .insert_header(bearer(&state, &reader))
            .to_request(),
    )
    .await;
    assert_eq!(profile["context"]["following"], true);

    let feed: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/follow/")
            .insert_header(bearer(&state, &reader))
            .to_request(),
    )
    .await;
    assert_eq!(feed["template"], "posts/follow.html");
    assert_eq!(object_count(&feed), 1);

    for _ in 0..2 {
        test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/profile/author/unfollow/")
                .insert_header(bearer(&state, &reader))
                .to_request(),
        )
        .await;
    }
    assert_eq!(state.follows.count().await.unwrap(), 0);

    let author_feed = state
        .posts
        .count(PostFilter::FollowedBy(reader.id))
        .await
        .unwrap();
    assert_eq!(author_feed, 0);
}

#[actix_web::test]
async fn test_follow_self_and_unknown_author() {
    let state = state();
    let leo = user(&state, "leo").await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/profile/leo/follow/")
            .insert_header(bearer(&state, &leo))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(state.follows.count().await.unwrap(), 0);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/profile/ghost/unfollow/")
            .insert_header(bearer(&state, &leo))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_create_hello_without_group() {
    let state = state();
    let leo = user(&state, "leo").await;
    state
        .groups
        .create(NewGroup::new("Cats", "cats", ""))
        .await
        .unwrap();
    let app = app!(state);

    let page: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/create/")
            .insert_header(bearer(&state, &leo))
            .to_request(),
    )
    .await;
    let group = &page["context"]["form"]["fields"][0];
    assert_eq!(group["name"], "group");
    assert_eq!(group["value"], Value::Null);
    assert_eq!(group["empty_label"], "-- No group selected --");
    assert_eq!(group["choices"][0]["label"], "Cats");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/create/")
            .insert_header(bearer(&state, &leo))
            .set_form(vec![("text", "Hello"), ("group", "")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/leo/");

    let window = state.paginator.window(None, 1);
    let created = state
        .posts
        .list(PostFilter::Author(leo.id), window)
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].post.text, "Hello");
    assert!(created[0].group.is_none());
}

#[actix_web::test]
async fn test_invalid_create_stays_on_form() {
    let state = state();
    let leo = user(&state, "leo").await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/create/")
            .insert_header(bearer(&state, &leo))
            .set_form(vec![("text", ""), ("group", "77")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["template"], "posts/create_post.html");
    assert_eq!(page["context"]["form"]["fields"][0]["errors"].as_array().unwrap().len(), 1);
    assert_eq!(state.posts.count(PostFilter::All).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_create_with_uploaded_image() {
    let media = tempfile::tempdir().unwrap();
    let state = state_in(media.path());
    let leo = user(&state, "leo").await;
    let app = app!(state);

    let (content_type, body) = gif_form("With a picture");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/create/")
            .insert_header(bearer(&state, &leo))
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let window = state.paginator.window(None, 1);
    let created = state.posts.list(PostFilter::All, window).await.unwrap();
    let image = created[0].post.image.clone().unwrap();
    assert!(image.starts_with("posts/"));
    assert!(media.path().join(&image).exists());

    let page: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/posts/{}/", created[0].post.id))
            .to_request(),
    )
    .await;
    assert_eq!(page["context"]["post"]["image_url"], format!("/media/{image}"));
}

#[actix_web::test]
async fn test_post_detail_and_comments() {
    let state = state();
    let author = user(&state, "leo").await;
    let reader = user(&state, "ann").await;
    let written = post(&state, &author, &"x".repeat(40)).await;
    let app = app!(state);
    let comment_path = format!("/posts/{}/comment/", written.id);

    for text in ["Great post", "   "] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&comment_path)
                .insert_header(bearer(&state, &reader))
                .set_form(vec![("text", text)])
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), format!("/posts/{}/", written.id));
    }

    let page: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/posts/{}/", written.id))
            .to_request(),
    )
    .await;
    assert_eq!(page["template"], "posts/post_detail.html");
    assert_eq!(page["context"]["title"], "x".repeat(30));
    assert_eq!(page["context"]["post_counter"], 1);
    assert_eq!(page["context"]["comments"].as_array().unwrap().len(), 1);
    assert_eq!(page["context"]["comments"][0]["author"]["username"], "ann");
    assert_eq!(page["context"]["form"]["fields"][0]["label"], "Comment text");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/posts/999/comment/")
            .insert_header(bearer(&state, &reader))
            .set_form(vec![("text", "Anyone?")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_signup_login_logout() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/signup/")
            .set_form(vec![("username", "leo"), ("password", "long enough")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/");
    assert!(resp.response().cookies().any(|c| c.name() == SESSION_COOKIE));

    let taken = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/signup/")
            .set_form(vec![("username", "leo"), ("password", "another one")])
            .to_request(),
    )
    .await;
    assert_eq!(taken.status(), StatusCode::OK);
    let page: Value = test::read_body_json(taken).await;
    assert_eq!(
        page["context"]["form"]["fields"][0]["errors"][0],
        "A user with that username already exists."
    );

    let rejected: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/auth/login/")
            .set_form(vec![("username", "leo"), ("password", "wrong password")])
            .to_request(),
    )
    .await;
    assert_eq!(rejected["template"], "users/login.html");
    assert_eq!(
        rejected["context"]["form"]["non_field_errors"]
            .as_array()
            .unwrap()
            .len(),
        1
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/auth/login/?next=/create/")
            .set_form(vec![("username", "leo"), ("password", "long enough")])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/create/");
    let session = resp
        .response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .unwrap()
        .into_owned();

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/create/")
            .cookie(session)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let logged_out: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/auth/logout/").to_request(),
    )
    .await;
    assert_eq!(logged_out["template"], "users/logged_out.html");
}

#[actix_web::test]
async fn test_unknown_path_is_not_found() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/unexisting_page/").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["instance"], "/unexisting_page/");
}

#[actix_web::test]
async fn test_static_pages_and_health() {
    let state = state();
    let app = app!(state);

    for (uri, template) in [
        ("/about/author/", "about/author.html"),
        ("/about/tech/", "about/tech.html"),
    ] {
        let page: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri(uri).to_request())
                .await;
        assert_eq!(page["template"], template);
    }

    let health: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/health/").to_request(),
    )
    .await;
    assert_eq!(health["status"], "ok");
}

#[actix_web::test]
async fn test_failed_create_removes_saved_upload() {
    let media = tempfile::tempdir().unwrap();
    let state = state_in(media.path());
    let ghost = user(&state, "ghost").await;
    let auth = bearer(&state, &ghost);
    state.users.delete(ghost.id).await.unwrap();
    let app = app!(state);

    let (content_type, body) = gif_form("Never stored");
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/create/")
            .insert_header(auth)
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let leftovers = std::fs::read_dir(media.path().join("posts"))
        .map(|dir| dir.count())
        .unwrap_or_default();
    assert_eq!(leftovers, 0);
}

#[actix_web::test]
async fn test_comment_without_form_body_still_redirects() {
    let state = state();
    let author = user(&state, "leo").await;
    let written = post(&state, &author, "Quiet post").await;
    let app = app!(state);
    let path = format!("/posts/{}/comment/", written.id);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&path)
            .insert_header(bearer(&state, &author))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", written.id));

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&path)
            .insert_header(bearer(&state, &author))
            .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=x"))
            .set_payload("garbage")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    assert!(state.comments.list_for_post(written.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_index_cache_ignores_unrelated_query_parameters() {
    let state = state();
    let app = app!(state);

    for i in 0..20 {
        test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/?x={i}")).to_request(),
        )
        .await;
    }

    assert!(state.cache.exists("index:/?page=1").await);
    assert!(!state.cache.exists("index:/?x=0").await);
}
