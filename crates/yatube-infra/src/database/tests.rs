use chrono::Utc;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

use yatube_core::domain::{Follow, Post, PostFilter};
use yatube_core::pagination::Paginator;
use yatube_core::ports::{BaseRepository, FollowRepository, PostRepository};

use crate::database::entity::{follow, group, post, user};
use crate::database::postgres_repo::{PostgresFollowRepository, PostgresPostRepository};

fn user_row(id: i64, username: &str) -> user::Model {
    user::Model {
        id,
        username: username.to_owned(),
        password_hash: "hash".to_owned(),
        created_at: Utc::now().into(),
    }
}

fn post_row(id: i64, author_id: i64, group_id: Option<i64>) -> post::Model {
    post::Model {
        id,
        text: format!("Post number {id}"),
        pub_date: Utc::now().into(),
        author_id,
        group_id,
        image: None,
    }
}

#[tokio::test]
async fn test_find_post_by_id() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_row(4, 1, None)]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);

    let result: Option<Post> = repo.find_by_id(4).await.unwrap();

    let post = result.unwrap();
    assert_eq!(post.id, 4);
    assert_eq!(post.text, "Post number 4");
}

#[tokio::test]
async fn test_list_attaches_authors_and_groups() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_row(2, 1, Some(9)), post_row(1, 1, None)]])
        .append_query_results(vec![vec![user_row(1, "leo")]])
        .append_query_results(vec![vec![group::Model {
            id: 9,
            title: "Cats".to_owned(),
            slug: "cats".to_owned(),
            description: String::new(),
        }]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    let window = Paginator::new(10).window(None, 2);

    let page = repo.list(PostFilter::All, window).await.unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].post.id, 2);
    assert_eq!(page[0].author.username, "leo");
    assert_eq!(page[0].group.as_ref().map(|g| g.slug.as_str()), Some("cats"));
    assert!(page[1].group.is_none());
}

#[tokio::test]
async fn test_list_skips_group_query_without_groups() {
    // Only two result sets: a third query would fail against the mock.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![post_row(1, 1, None)]])
        .append_query_results(vec![vec![user_row(1, "leo")]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    let window = Paginator::new(10).window(None, 1);

    let page = repo.list(PostFilter::Author(1), window).await.unwrap();

    assert_eq!(page.len(), 1);
    assert!(page[0].group.is_none());
}

#[tokio::test]
async fn test_follow_is_idempotent() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![follow::Model {
            id: 1,
            user_id: 1,
            author_id: 2,
        }]])
        .into_connection();

    let repo = PostgresFollowRepository::new(db);

    let created = repo.follow(Follow::between(1, 2).unwrap()).await.unwrap();
    assert!(!created);
}

#[tokio::test]
async fn test_unfollow_reports_removed_rows() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results(vec![
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            },
        ])
        .into_connection();

    let repo = PostgresFollowRepository::new(db);

    assert!(repo.unfollow(1, 2).await.unwrap());
    assert!(!repo.unfollow(1, 2).await.unwrap());
}
