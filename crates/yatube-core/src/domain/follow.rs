use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Directed edge: `user` sees the posts of `author` in their feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    pub user_id: i64,
    pub author_id: i64,
}

impl Follow {
    /// Build an edge, refusing loops.
    pub fn between(user_id: i64, author_id: i64) -> Result<Self, DomainError> {
        if user_id == author_id {
            return Err(DomainError::SelfFollow);
        }
        Ok(Self { user_id, author_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_follow_is_rejected() {
        assert!(matches!(Follow::between(3, 3), Err(DomainError::SelfFollow)));
        let edge = Follow::between(3, 4).unwrap();
        assert_eq!((edge.user_id, edge.author_id), (3, 4));
    }
}
