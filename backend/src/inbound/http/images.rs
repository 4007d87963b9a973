//! Camera still upload.
//!
//! ```text
//! POST /image/porch.jpg   (Content-Type: image/jpeg)
//! ```

use actix_web::http::header::{self, ContentType};
use actix_web::{HttpRequest, HttpResponse, post, web};

use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Store the request body under today's date partition.
///
/// The response body is the stored filename.
#[post("/image/{filename}")]
pub async fn upload_image(
    state: web::Data<HttpState>,
    req: HttpRequest,
    filename: web::Path<String>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let stored = state
        .images
        .archive(&filename, content_type, body.to_vec())
        .await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(stored))
}
