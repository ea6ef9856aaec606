//! Image upload handler

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::StreamExt;
use tracing::info;

use crate::application::error::HttpError;
use crate::application::uploads::ImageStoreError;

use crate::infra::http::api::auth::AuthUser;
use crate::infra::http::api::models::ImageUploadResponse;
use crate::infra::http::api::state::ApiState;

const SOURCE: &str = "infra::http::api::upload_image";
const IMAGE_FIELD: &str = "image";

pub async fn upload_image(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "image".to_string());
        let content_type = field
            .content_type()
            .map(str::to_string)
            .or_else(|| mime_guess::from_path(&filename).first_raw().map(str::to_string))
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(HttpError::new(
                SOURCE,
                StatusCode::UNPROCESSABLE_ENTITY,
                "The image must be an image.",
                format!("rejected content type `{content_type}`"),
            ));
        }

        let stream = field
            .map(|chunk| chunk.map_err(stream_error))
            .boxed();
        let stored = state.images.store_stream(&filename, stream).await?;

        info!(
            target = SOURCE,
            user_id = user.id,
            path = %stored.path,
            size_bytes = stored.size_bytes,
            "image uploaded"
        );

        return Ok((
            StatusCode::CREATED,
            Json(ImageUploadResponse {
                message: "Image uploaded successfully",
                url: state.images.public_url(&stored.path),
                path: stored.path,
            }),
        ));
    }

    Err(HttpError::new(
        SOURCE,
        StatusCode::UNPROCESSABLE_ENTITY,
        "The image field is required.",
        "multipart payload has no image field",
    ))
}

fn stream_error(err: MultipartError) -> ImageStoreError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ImageStoreError::PayloadTooLarge {
            source: Box::new(err),
        }
    } else {
        ImageStoreError::PayloadStream {
            source: Box::new(err),
        }
    }
}

fn multipart_error(err: MultipartError) -> HttpError {
    HttpError::from(stream_error(err))
}
