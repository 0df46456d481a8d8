use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Group, UserProfile};

/// Characters of the text shown when a post is displayed inline.
const DISPLAY_CHARS: usize = 15;
/// Characters of the text used as the detail page title.
const TITLE_CHARS: usize = 30;

/// Post entity - a piece of text published by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub group_id: Option<i64>,
    /// Path of the attached image, relative to the media root.
    pub image: Option<String>,
}

impl Post {
    /// Only the author may change a post.
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author_id == user_id
    }

    /// Title of the detail page.
    pub fn title(&self) -> String {
        truncate_chars(&self.text, TITLE_CHARS)
    }

    pub fn url(&self) -> String {
        format!("/posts/{}/", self.id)
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&truncate_chars(&self.text, DISPLAY_CHARS))
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Data for a post that has not been stored yet. The publication date is
/// fixed here and never touched again.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

impl NewPost {
    pub fn new(author_id: i64, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pub_date: Utc::now(),
            author_id,
            group_id: None,
            image: None,
        }
    }

    pub fn in_group(mut self, group_id: Option<i64>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

/// A post joined with its author and group, as listed on pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: UserProfile,
    pub group: Option<Group>,
}

/// Which posts a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}
