//! Document conversion endpoint.

use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::Extension;

use df_convert::ConversionRequest;
use df_core::Error;

use crate::context::AppContext;
use crate::delivery;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::upload;

/// POST /convert
///
/// Accepts a multipart form with a `file` field, converts it to the
/// configured format and streams the result back as an attachment.
pub async fn convert(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let with_id = |e: Error| AppError::new(e).with_request_id(request_id.0.clone());

    let stored = upload::store_upload(
        &mut multipart,
        &ctx.uploads_dir(),
        ctx.config.uploads.max_file_size,
    )
    .await
    .map_err(with_id)?;

    let request = ConversionRequest {
        input: stored.path,
        original_name: stored.original_name,
        output_dir: ctx.output_dir(),
    };

    // Run detached so a client disconnect does not abandon the engine
    // mid-run; the job still cleans up after itself when it finishes.
    let service = ctx.conversions.clone();
    let document = tokio::spawn(async move { service.convert(request).await })
        .await
        .map_err(|e| Error::Internal(format!("conversion task failed: {e}")))
        .and_then(|r| r)
        .map_err(with_id)?;

    delivery::into_response(document).await.map_err(with_id)
}
