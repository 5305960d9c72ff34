//! Streaming a converted document back to the client.
//!
//! [`DeliveryStream`] owns the [`ConvertedDocument`] for as long as the
//! response body lives. The job's files are removed when hyper drops the
//! body: after the last chunk was written, after a write error, or when the
//! client goes away.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_core::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use df_convert::ConvertedDocument;
use df_core::{Error, Result};

/// Read size for response chunks.
const CHUNK_SIZE: usize = 64 * 1024;

/// Response body that keeps the job alive until it is dropped.
pub struct DeliveryStream {
    inner: ReaderStream<File>,
    document: ConvertedDocument,
    bytes_sent: u64,
}

impl DeliveryStream {
    pub fn new(file: File, document: ConvertedDocument) -> Self {
        Self {
            inner: ReaderStream::with_capacity(file, CHUNK_SIZE),
            document,
            bytes_sent: 0,
        }
    }
}

impl Stream for DeliveryStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                let err = Error::Delivery(e.to_string());
                tracing::warn!(
                    job_id = %this.document.job().id,
                    bytes_sent = this.bytes_sent,
                    "{err}"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.document.mark_delivered();
                tracing::debug!(
                    job_id = %this.document.job().id,
                    bytes_sent = this.bytes_sent,
                    "Output streamed"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Build the `200 OK` response streaming `document`.
///
/// If the output cannot be opened the document is dropped here, which
/// cleans up the job, and [`Error::Delivery`] is returned.
pub async fn into_response(document: ConvertedDocument) -> Result<Response> {
    let file = File::open(document.path())
        .await
        .map_err(|e| Error::Delivery(format!("cannot open output: {e}")))?;
    let length = file
        .metadata()
        .await
        .map_err(|e| Error::Delivery(format!("cannot stat output: {e}")))?
        .len();

    let content_type = document.content_type();
    let disposition = content_disposition(document.download_name());
    let body = Body::from_stream(DeliveryStream::new(file, document));

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, v);
    }
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    Ok(response)
}

/// `Content-Disposition` value carrying `name` as an attachment.
///
/// Includes an ASCII fallback plus the RFC 5987 `filename*` form so
/// non-ASCII names survive.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(name)
    )
}
