//! Form submissions with optional file uploads.
//!
//! Browsers send the post form as `multipart/form-data` when it carries an
//! image and as `application/x-www-form-urlencoded` otherwise; both end up
//! as a [`PostInput`].

use actix_multipart::{Field, Multipart};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web};
use futures::StreamExt;
use futures::future::LocalBoxFuture;
use serde::Deserialize;

use yatube_core::forms::{ImageUpload, PostInput};

use crate::middleware::error::AppError;

/// Upper bound for a single uploaded file.
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// Upper bound for a plain text field.
const MAX_TEXT_BYTES: usize = 64 * 1024;

/// Checkbox rendered next to an existing image.
const CLEAR_FIELD: &str = "image-clear";

#[derive(Debug, Default, Deserialize)]
struct PostFields {
    #[serde(default)]
    text: String,
    group: Option<String>,
    #[serde(rename = "image-clear")]
    image_clear: Option<String>,
}

impl From<PostFields> for PostInput {
    fn from(fields: PostFields) -> Self {
        PostInput {
            text: fields.text,
            group: fields.group,
            image: None,
            clear_image: fields.image_clear.is_some(),
        }
    }
}

/// The post form as submitted.
pub struct PostSubmission(pub PostInput);

impl FromRequest for PostSubmission {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        if req.content_type() == "multipart/form-data" {
            let multipart = Multipart::new(req.headers(), payload.take());
            Box::pin(async move { Ok(PostSubmission(read_multipart(multipart).await?)) })
        } else {
            let form = web::Form::<PostFields>::from_request(req, payload);
            Box::pin(async move {
                let web::Form(fields) = form.await?;
                Ok(PostSubmission(fields.into()))
            })
        }
    }
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?;
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::BadRequest(format!(
                "Field exceeds the {limit} byte limit"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_multipart(mut multipart: Multipart) -> Result<PostInput, AppError> {
    let mut input = PostInput::default();

    while let Some(field) = multipart.next().await {
        let mut field = field.map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?;
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .unwrap_or_default()
                .to_string();
            let content_type = field.content_type().map(|m| m.to_string());
            let bytes = read_field(&mut field, MAX_UPLOAD_BYTES).await?;

            // An empty file input still sends a part, with no filename and no body.
            if !(filename.is_empty() && bytes.is_empty()) {
                input.image = Some(ImageUpload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            continue;
        }

        let value = read_field(&mut field, MAX_TEXT_BYTES).await?;
        let value = String::from_utf8_lossy(&value).into_owned();
        match name.as_str() {
            "text" => input.text = value,
            "group" => input.group = Some(value),
            CLEAR_FIELD => input.clear_image = true,
            _ => {}
        }
    }

    Ok(input)
}
