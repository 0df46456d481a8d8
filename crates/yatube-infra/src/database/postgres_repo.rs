//! PostgreSQL repository implementations.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set, Unchanged,
};

use yatube_core::domain::{
    CommentDetail, Follow, Group, NewComment, NewGroup, NewPost, NewUser, Post, PostDetail,
    PostFilter, User,
};
use yatube_core::error::RepoError;
use yatube_core::pagination::PageWindow;
use yatube_core::ports::{
    CommentRepository, FollowRepository, GroupRepository, PostRepository, UserRepository,
};

use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::follow::{self, Entity as FollowEntity};
use super::entity::group::{self, Entity as GroupEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, query_error, write_error};

/// PostgreSQL user repository.
pub type PostgresUserRepository = PostgresBaseRepository<UserEntity>;

/// PostgreSQL group repository.
pub type PostgresGroupRepository = PostgresBaseRepository<GroupEntity>;

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(username = %username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let model = user::ActiveModel::from(user)
            .insert(&self.db)
            .await
            .map_err(write_error)?;

        Ok(model.into())
    }
}

#[async_trait]
impl GroupRepository for PostgresGroupRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, RepoError> {
        let result = GroupEntity::find()
            .filter(group::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<Group>, RepoError> {
        let result = GroupEntity::find()
            .order_by_asc(group::Column::Title)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn create(&self, group: NewGroup) -> Result<Group, RepoError> {
        let model = group::ActiveModel::from(group)
            .insert(&self.db)
            .await
            .map_err(write_error)?;

        Ok(model.into())
    }
}

/// Posts matching `filter`, newest first.
fn filtered(filter: PostFilter) -> Select<PostEntity> {
    let query = match filter {
        PostFilter::All => PostEntity::find(),
        PostFilter::Group(group_id) => {
            PostEntity::find().filter(post::Column::GroupId.eq(group_id))
        }
        PostFilter::Author(author_id) => {
            PostEntity::find().filter(post::Column::AuthorId.eq(author_id))
        }
        PostFilter::FollowedBy(user_id) => {
            let followed = Query::select()
                .column(follow::Column::AuthorId)
                .from(FollowEntity)
                .and_where(follow::Column::UserId.eq(user_id))
                .to_owned();
            PostEntity::find().filter(post::Column::AuthorId.in_subquery(followed))
        }
    };

    query
        .order_by_desc(post::Column::PubDate)
        .order_by_desc(post::Column::Id)
}

impl PostgresPostRepository {
    /// Join authors and groups onto a batch of posts with one query each.
    async fn attach(&self, posts: Vec<post::Model>) -> Result<Vec<PostDetail>, RepoError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids: HashSet<i64> = posts.iter().map(|p| p.author_id).collect();
        let authors: HashMap<i64, user::Model> = UserEntity::find()
            .filter(user::Column::Id.is_in(author_ids))
            .all(&self.db)
            .await
            .map_err(query_error)?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let group_ids: HashSet<i64> = posts.iter().filter_map(|p| p.group_id).collect();
        let groups: HashMap<i64, group::Model> = if group_ids.is_empty() {
            HashMap::new()
        } else {
            GroupEntity::find()
                .filter(group::Column::Id.is_in(group_ids))
                .all(&self.db)
                .await
                .map_err(query_error)?
                .into_iter()
                .map(|g| (g.id, g))
                .collect()
        };

        posts
            .into_iter()
            .map(|model| {
                let author = authors
                    .get(&model.author_id)
                    .cloned()
                    .map(User::from)
                    .ok_or_else(|| {
                        RepoError::Query(format!("post {} has no author row", model.id))
                    })?;
                let group = model
                    .group_id
                    .and_then(|id| groups.get(&id).cloned())
                    .map(Group::from);

                Ok(PostDetail {
                    post: model.into(),
                    author: author.profile(),
                    group,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, RepoError> {
        let model = post::ActiveModel::from(post)
            .insert(&self.db)
            .await
            .map_err(write_error)?;

        tracing::debug!(post_id = model.id, author_id = model.author_id, "Post created");
        Ok(model.into())
    }

    async fn update(&self, post: Post) -> Result<Post, RepoError> {
        let active = post::ActiveModel {
            id: Unchanged(post.id),
            text: Set(post.text),
            group_id: Set(post.group_id),
            image: Set(post.image),
            ..Default::default()
        };

        let model = active.update(&self.db).await.map_err(|e| match e {
            DbErr::RecordNotUpdated => RepoError::NotFound,
            other => write_error(other),
        })?;

        Ok(model.into())
    }

    async fn find_detail(&self, id: i64) -> Result<Option<PostDetail>, RepoError> {
        let Some(model) = PostEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(query_error)?
        else {
            return Ok(None);
        };

        Ok(self.attach(vec![model]).await?.pop())
    }

    async fn count(&self, filter: PostFilter) -> Result<u64, RepoError> {
        filtered(filter).count(&self.db).await.map_err(query_error)
    }

    async fn list(
        &self,
        filter: PostFilter,
        window: PageWindow,
    ) -> Result<Vec<PostDetail>, RepoError> {
        if window.limit == 0 {
            return Ok(Vec::new());
        }

        let models = filtered(filter)
            .offset(window.offset)
            .limit(window.limit)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        self.attach(models).await
    }
}

/// PostgreSQL comment repository.
pub struct PostgresCommentRepository {
    db: DbConn,
}

impl PostgresCommentRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn create(&self, comment: NewComment) -> Result<CommentDetail, RepoError> {
        let model = comment::ActiveModel::from(comment)
            .insert(&self.db)
            .await
            .map_err(write_error)?;

        let author = UserEntity::find_by_id(model.author_id)
            .one(&self.db)
            .await
            .map_err(query_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(CommentDetail {
            comment: model.into(),
            author: User::from(author).profile(),
        })
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentDetail>, RepoError> {
        let rows = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::Created)
            .order_by_asc(comment::Column::Id)
            .find_also_related(UserEntity)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        rows.into_iter()
            .map(|(comment, author)| {
                let author = author.ok_or_else(|| {
                    RepoError::Query(format!("comment {} has no author row", comment.id))
                })?;
                Ok(CommentDetail {
                    comment: comment.into(),
                    author: User::from(author).profile(),
                })
            })
            .collect()
    }
}

/// PostgreSQL follow repository.
pub struct PostgresFollowRepository {
    db: DbConn,
}

impl PostgresFollowRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    fn edge(user_id: i64, author_id: i64) -> Select<FollowEntity> {
        FollowEntity::find()
            .filter(follow::Column::UserId.eq(user_id))
            .filter(follow::Column::AuthorId.eq(author_id))
    }
}

#[async_trait]
impl FollowRepository for PostgresFollowRepository {
    async fn follow(&self, edge: Follow) -> Result<bool, RepoError> {
        if self.exists(edge.user_id, edge.author_id).await? {
            return Ok(false);
        }

        match follow::ActiveModel::from(edge).insert(&self.db).await {
            Ok(_) => Ok(true),
            // Lost a race against a concurrent follow; the unique index kept one row.
            Err(e) => match write_error(e) {
                RepoError::Constraint(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let result = FollowEntity::delete_many()
            .filter(follow::Column::UserId.eq(user_id))
            .filter(follow::Column::AuthorId.eq(author_id))
            .exec(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected > 0)
    }

    async fn exists(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let found = Self::edge(user_id, author_id)
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(found.is_some())
    }

    async fn count(&self) -> Result<u64, RepoError> {
        FollowEntity::find()
            .count(&self.db)
            .await
            .map_err(query_error)
    }
}
