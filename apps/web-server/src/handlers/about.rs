//! Static "about" pages.

use actix_web::HttpResponse;
use yatube_shared::RenderedPage;

use crate::render::render;

/// GET /about/author/
pub async fn author() -> HttpResponse {
    render(RenderedPage::new("about/author.html"))
}

/// GET /about/tech/
pub async fn tech() -> HttpResponse {
    render(RenderedPage::new("about/tech.html"))
}
