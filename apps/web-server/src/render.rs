//! Turning handler results into responses.

use actix_web::HttpResponse;
use actix_web::http::header;
use serde::Serialize;

use yatube_core::domain::PostDetail;
use yatube_core::ports::MediaStorage;
use yatube_shared::RenderedPage;

/// A post as listed on pages, with the public URL of its image.
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub detail: PostDetail,
    pub image_url: Option<String>,
}

impl PostCard {
    pub fn new(detail: PostDetail, media: &dyn MediaStorage) -> Self {
        let image_url = detail.post.image.as_deref().map(|path| media.url(path));
        Self { detail, image_url }
    }
}

pub fn render(page: RenderedPage) -> HttpResponse {
    HttpResponse::Ok().json(page)
}

pub fn redirect(location: impl Into<String>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.into()))
        .finish()
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}
