//! Form layer - binds submitted fields to records and describes fields for
//! templates.

mod account;
mod comment;
mod field;
mod post;

pub use account::{LoginForm, LoginInput, SignupForm, SignupInput};
pub use comment::{CommentForm, CommentInput};
pub use field::{Choice, FormErrors, FormField, FormView, REQUIRED, Widget};
pub use post::{
    CleanedPost, ImageChange, ImageFormat, ImageUpload, NO_GROUP_LABEL, PostForm, PostInput,
};
