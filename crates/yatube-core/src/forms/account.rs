use std::borrow::Cow;

use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::field::{FormErrors, FormField, FormView, Widget};

pub const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if username.chars().all(allowed) {
        return Ok(());
    }
    let mut error = ValidationError::new("username");
    error.message = Some(Cow::from(
        "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
    ));
    Err(error)
}

/// Sign-up submission.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignupInput {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 150, message = "Enter a username of at most 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password: String,
}

/// Log-in submission. `next` is where to go afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    username: Option<String>,
    errors: FormErrors,
}

impl SignupForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a submission. The password is never echoed back.
    pub fn clean(input: SignupInput) -> Result<SignupInput, Self> {
        let input = SignupInput {
            username: input.username.trim().to_string(),
            ..input
        };
        match input.validate() {
            Ok(()) => Ok(input),
            Err(e) => Err(Self {
                username: Some(input.username),
                errors: e.into(),
            }),
        }
    }

    /// Re-render after the store rejected the username.
    pub fn taken(username: String) -> Self {
        let mut errors = FormErrors::default();
        errors.add("username", USERNAME_TAKEN);
        Self {
            username: Some(username),
            errors,
        }
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn view(&self) -> FormView {
        let fields = vec![
            FormField::new("username", "Username", Widget::TextInput)
                .help("Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only.")
                .required()
                .value(self.username.clone()),
            FormField::new("password", "Password", Widget::PasswordInput).required(),
        ];
        FormView::new(self.username.is_some(), fields, &self.errors)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    username: Option<String>,
    errors: FormErrors,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form shown again after a failed attempt.
    pub fn rejected(username: String) -> Self {
        let mut errors = FormErrors::default();
        errors.add(FormErrors::NON_FIELD, BAD_CREDENTIALS);
        Self {
            username: Some(username),
            errors,
        }
    }

    pub fn view(&self) -> FormView {
        let fields = vec![
            FormField::new("username", "Username", Widget::TextInput)
                .required()
                .value(self.username.clone()),
            FormField::new("password", "Password", Widget::PasswordInput).required(),
        ];
        FormView::new(self.username.is_some(), fields, &self.errors)
    }
}
