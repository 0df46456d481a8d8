use validator::Validate;

use super::field::{Choice, FormErrors, FormField, FormView, REQUIRED, Widget};
use crate::domain::{Group, Post};

pub const NO_GROUP_LABEL: &str = "-- No group selected --";
const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file received with the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Sniff the format from the leading bytes.
    pub fn format(&self) -> Option<ImageFormat> {
        let b = self.bytes.as_slice();
        if b.starts_with(b"GIF87a") || b.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if b.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if b.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if b.len() >= 12 && &b[..4] == b"RIFF" && &b[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Gif,
    Png,
    Jpeg,
    Webp,
}

/// Raw post submission.
#[derive(Debug, Clone, Default, Validate)]
pub struct PostInput {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
    /// Selected group id; empty means none.
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    /// The "clear" checkbox next to an existing image.
    pub clear_image: bool,
}

/// What happens to the stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(ImageUpload),
}

/// A validated submission, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

impl CleanedPost {
    /// Resolve the image for a post that previously had `current`.
    pub fn resolve_image(&self, current: Option<String>, stored: Option<String>) -> Option<String> {
        match self.image {
            ImageChange::Keep => current,
            ImageChange::Clear => None,
            ImageChange::Replace(_) => stored,
        }
    }
}

/// Create/edit form for posts: `group`, `text`, `image`.
#[derive(Debug, Clone)]
pub struct PostForm {
    groups: Vec<Group>,
    input: Option<PostInput>,
    current_group: Option<i64>,
    current_text: Option<String>,
    current_image: Option<String>,
    errors: FormErrors,
}

impl PostForm {
    /// Unbound form. `groups` are the selectable choices.
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            groups,
            input: None,
            current_group: None,
            current_text: None,
            current_image: None,
            errors: FormErrors::default(),
        }
    }

    /// Unbound form pre-filled from an existing post.
    pub fn for_post(groups: Vec<Group>, post: &Post) -> Self {
        Self::new(groups).with_instance(post)
    }

    pub fn bind(groups: Vec<Group>, input: PostInput) -> Self {
        Self {
            input: Some(input),
            ..Self::new(groups)
        }
    }

    pub fn with_instance(mut self, post: &Post) -> Self {
        self.current_group = post.group_id;
        self.current_text = Some(post.text.clone());
        self.current_image = post.image.clone();
        self
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    /// Validate the bound data. On failure the form comes back carrying its
    /// errors so it can be rendered again.
    pub fn clean(mut self) -> Result<CleanedPost, Self> {
        let Some(raw) = self.input.clone() else {
            self.errors.add(FormErrors::NON_FIELD, "No data submitted.");
            return Err(self);
        };

        let input = PostInput {
            text: raw.text.trim().to_string(),
            ..raw
        };
        if let Err(e) = input.validate() {
            self.errors = e.into();
        }

        let group_id = match input.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => match value.parse::<i64>() {
                Ok(id) if self.groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    self.errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = match input.image {
            Some(upload) if upload.bytes.is_empty() || upload.format().is_none() => {
                self.errors.add("image", INVALID_IMAGE);
                ImageChange::Keep
            }
            Some(upload) => ImageChange::Replace(upload),
            None if input.clear_image => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        if !self.errors.is_empty() {
            return Err(self);
        }

        Ok(CleanedPost {
            text: input.text,
            group_id,
            image,
        })
    }

    pub fn view(&self) -> FormView {
        let (group, text) = match &self.input {
            Some(input) => (
                input.group.clone().filter(|g| !g.trim().is_empty()),
                Some(input.text.clone()),
            ),
            None => (
                self.current_group.map(|id| id.to_string()),
                self.current_text.clone(),
            ),
        };

        let choices = self
            .groups
            .iter()
            .map(|g| Choice {
                value: g.id.to_string(),
                label: g.to_string(),
            })
            .collect();

        let fields = vec![
            FormField::new("group", "Group", Widget::Select)
                .help("Choose a group")
                .empty_label(NO_GROUP_LABEL)
                .choices(choices)
                .value(group),
            FormField::new("text", "Post text", Widget::Textarea)
                .help("Enter the text")
                .required()
                .value(text),
            FormField::new("image", "Image", Widget::ClearableFileInput)
                .value(self.current_image.clone()),
        ];

        FormView::new(self.input.is_some(), fields, &self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn groups() -> Vec<Group> {
        vec![Group {
            id: 1,
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: "All about cats".to_string(),
        }]
    }

    fn input(text: &str, group: Option<&str>) -> PostInput {
        PostInput {
            text: text.to_string(),
            group: group.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_post_without_group_is_valid_and_group_displays_unset() {
        let form = PostForm::bind(groups(), input("Hello", Some("")));
        let view = form.view();
        let group = view.field("group").unwrap();
        assert_eq!(group.value, None);
        assert_eq!(group.empty_label, Some(NO_GROUP_LABEL));

        let cleaned = form.clean().unwrap();
        assert_eq!(cleaned.text, "Hello");
        assert_eq!(cleaned.group_id, None);
        assert_eq!(cleaned.image, ImageChange::Keep);
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let form = PostForm::bind(groups(), input("   ", None)).clean().unwrap_err();
        assert_eq!(form.errors().get("text"), [REQUIRED.to_string()]);
        assert!(form.view().has_errors());
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        let form = PostForm::bind(groups(), input("Hi", Some("42")))
            .clean()
            .unwrap_err();
        assert_eq!(form.errors().get("group").len(), 1);
        assert!(form.errors().get("text").is_empty());
    }

    #[test]
    fn test_known_group_is_accepted() {
        let cleaned = PostForm::bind(groups(), input("Hi", Some("1")))
            .clean()
            .unwrap();
        assert_eq!(cleaned.group_id, Some(1));
    }

    #[test]
    fn test_image_signature_is_checked() {
        let mut good = input("Pic", None);
        good.image = Some(ImageUpload {
            filename: "small.gif".to_string(),
            content_type: Some("image/gif".to_string()),
            bytes: SMALL_GIF.to_vec(),
        });
        let cleaned = PostForm::bind(groups(), good).clean().unwrap();
        assert!(matches!(cleaned.image, ImageChange::Replace(ref u) if u.format() == Some(ImageFormat::Gif)));

        let mut bad = input("Pic", None);
        bad.image = Some(ImageUpload {
            filename: "notes.txt".to_string(),
            content_type: Some("image/gif".to_string()),
            bytes: b"plain text".to_vec(),
        });
        let form = PostForm::bind(groups(), bad).clean().unwrap_err();
        assert_eq!(form.errors().get("image").len(), 1);
    }

    #[test]
    fn test_edit_form_is_prefilled_from_post() {
        let post = Post {
            id: 5,
            text: "Original".to_string(),
            pub_date: chrono::Utc::now(),
            author_id: 1,
            group_id: Some(1),
            image: Some("posts/a.gif".to_string()),
        };
        let view = PostForm::for_post(groups(), &post).view();
        assert!(!view.is_bound);
        assert_eq!(view.field("text").unwrap().value.as_deref(), Some("Original"));
        assert_eq!(view.field("group").unwrap().value.as_deref(), Some("1"));
        assert_eq!(
            view.field("image").unwrap().value.as_deref(),
            Some("posts/a.gif")
        );
    }

    #[test]
    fn test_clear_checkbox_drops_image() {
        let mut submitted = input("Text", None);
        submitted.clear_image = true;
        let cleaned = PostForm::bind(groups(), submitted).clean().unwrap();
        assert_eq!(cleaned.image, ImageChange::Clear);
        assert_eq!(
            cleaned.resolve_image(Some("posts/old.gif".to_string()), None),
            None
        );
    }
}
