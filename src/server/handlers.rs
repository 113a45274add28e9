//! Request handlers for the form page.

use super::page::PageView;
use super::AppState;
use crate::error::Pdf2ImgError;
use crate::illustrate::{IllustrationRequest, UploadedPdf};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::{debug, error, warn};

/// `GET /`: the empty form.
pub async fn index(State(state): State<AppState>) -> Response {
    render(&state, StatusCode::OK, &PageView::default())
}

/// `POST /`: run the full flow and render the outcome.
pub async fn submit(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let limit = state.illustrator.config().max_upload_bytes;
    let mut request = IllustrationRequest::default();

    let parsed = match multipart {
        Ok(multipart) => read_form(multipart, limit, &mut request).await,
        Err(rejection) => Err(Pdf2ImgError::InvalidUpload {
            reason: rejection.body_text(),
        }),
    };

    let mut view = PageView {
        topic: request.topic.clone(),
        grade: request.grade.clone(),
        ..PageView::default()
    };

    let result = match parsed {
        Ok(()) => state.illustrator.illustrate(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            view.image_url = Some(output.image_url);
            render(&state, StatusCode::OK, &view)
        }
        Err(e) => {
            warn!("Request failed ({:?}): {}", e.kind(), e);
            view.error = Some(e.user_message());
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            render(&state, status, &view)
        }
    }
}

/// Read the `pdf`, `topic` and `grade` fields into `request`.
///
/// Text fields already read survive a later failure so the page can be
/// re-populated. Unknown fields are skipped. An empty file part counts as
/// no file.
async fn read_form(
    mut multipart: Multipart,
    limit: usize,
    request: &mut IllustrationRequest,
) -> Result<(), Pdf2ImgError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "pdf" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                if bytes.len() > limit {
                    return Err(Pdf2ImgError::UploadTooLarge { limit });
                }
                if !bytes.is_empty() {
                    request.pdf = Some(UploadedPdf {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "topic" => request.topic = field.text().await.map_err(|e| multipart_error(e, limit))?,
            "grade" => request.grade = field.text().await.map_err(|e| multipart_error(e, limit))?,
            other => debug!("Ignoring unexpected form field {:?}", other),
        }
    }
    Ok(())
}

fn multipart_error(e: MultipartError, limit: usize) -> Pdf2ImgError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Pdf2ImgError::UploadTooLarge { limit }
    } else {
        Pdf2ImgError::InvalidUpload {
            reason: e.body_text(),
        }
    }
}

fn render(state: &AppState, status: StatusCode, view: &PageView) -> Response {
    match state
        .pages
        .render(view, state.illustrator.provider_name())
    {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
