use async_trait::async_trait;

use crate::domain::{
    CommentDetail, Follow, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostDetail,
    PostFilter, User,
};
use crate::error::RepoError;
use crate::pagination::PageWindow;

/// Generic repository trait defining lookups shared by every record kind.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Delete an entity by its ID. Dependent rows follow the foreign-key rules.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// User repository with domain-specific methods.
#[async_trait]
pub trait UserRepository: BaseRepository<User, i64> {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Fails with [`RepoError::Constraint`] when the username is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;
}

/// Group repository. Groups are listed by title.
#[async_trait]
pub trait GroupRepository: BaseRepository<Group, i64> {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepoError>;

    async fn list(&self) -> Result<Vec<Group>, RepoError>;

    async fn create(&self, group: NewGroup) -> Result<Group, RepoError>;
}

/// Post repository. Listings are newest first.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, i64> {
    async fn create(&self, post: NewPost) -> Result<Post, RepoError>;

    /// Persist text, group and image. The publication date is left alone.
    async fn update(&self, post: Post) -> Result<Post, RepoError>;

    /// A post with its author and group.
    async fn find_detail(&self, id: i64) -> Result<Option<PostDetail>, RepoError>;

    async fn count(&self, filter: PostFilter) -> Result<u64, RepoError>;

    /// The slice of the filtered listing described by `window`.
    async fn list(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostDetail>, RepoError>;
}

/// Comment repository. Comments on a post are listed oldest first.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: NewComment) -> Result<CommentDetail, RepoError>;

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentDetail>, RepoError>;
}

/// Follow edges. Both mutations are idempotent.
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create the edge unless it exists. Returns whether a row was created.
    async fn follow(&self, edge: Follow) -> Result<bool, RepoError>;

    /// Remove the edge if present. Returns whether a row was removed.
    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError>;

    async fn count(&self) -> Result<u64, RepoError>;
}
