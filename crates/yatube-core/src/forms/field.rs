//! Field descriptors and error bags shared by every form.

use std::collections::BTreeMap;

use serde::Serialize;
use validator::ValidationErrors;

pub const REQUIRED: &str = "This field is required.";

/// How a field is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    TextInput,
    PasswordInput,
    Textarea,
    Select,
    ClearableFileInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// A field as templates see it: presentation plus bound value and errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub widget: Widget,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_label: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    pub value: Option<String>,
    pub errors: Vec<String>,
}

impl FormField {
    pub fn new(name: &'static str, label: &'static str, widget: Widget) -> Self {
        Self {
            name,
            label,
            help_text: "",
            widget,
            required: false,
            empty_label: None,
            choices: Vec::new(),
            value: None,
            errors: Vec::new(),
        }
    }

    pub fn help(mut self, help_text: &'static str) -> Self {
        self.help_text = help_text;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn empty_label(mut self, label: &'static str) -> Self {
        self.empty_label = Some(label);
        self
    }

    pub fn choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn value(mut self, value: Option<String>) -> Self {
        self.value = value;
        self
    }
}

/// Errors keyed by field name. Errors that belong to no single field go
/// under [`FormErrors::NON_FIELD`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                out.add(&field.to_string(), message);
            }
        }
        out
    }
}

/// Serializable form handed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormView {
    pub is_bound: bool,
    pub fields: Vec<FormField>,
    pub non_field_errors: Vec<String>,
}

impl FormView {
    pub fn new(is_bound: bool, fields: Vec<FormField>, errors: &FormErrors) -> Self {
        let fields = fields
            .into_iter()
            .map(|mut field| {
                field.errors = errors.get(field.name).to_vec();
                field
            })
            .collect();

        Self {
            is_bound,
            fields,
            non_field_errors: errors.get(FormErrors::NON_FIELD).to_vec(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_errors(&self) -> bool {
        !self.non_field_errors.is_empty() || self.fields.iter().any(|f| !f.errors.is_empty())
    }
}
