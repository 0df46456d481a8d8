use serde::Deserialize;
use validator::Validate;

use super::field::{FormErrors, FormField, FormView, Widget};

/// Raw comment submission.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentInput {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

/// Comment form: a single required `text` field.
#[derive(Debug, Clone, Default)]
pub struct CommentForm {
    input: Option<CommentInput>,
    errors: FormErrors,
}

impl CommentForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(input: CommentInput) -> Self {
        Self {
            input: Some(input),
            errors: FormErrors::default(),
        }
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    /// Returns the trimmed comment text.
    pub fn clean(mut self) -> Result<String, Self> {
        let text = self
            .input
            .as_ref()
            .map(|i| i.text.trim().to_string())
            .unwrap_or_default();

        let input = CommentInput { text };
        if let Err(e) = input.validate() {
            self.errors = e.into();
            return Err(self);
        }
        Ok(input.text)
    }

    pub fn view(&self) -> FormView {
        let fields = vec![
            FormField::new("text", "Comment text", Widget::Textarea)
                .help("Enter the comment text")
                .required()
                .value(self.input.as_ref().map(|i| i.text.clone())),
        ];
        FormView::new(self.input.is_some(), fields, &self.errors)
    }
}
