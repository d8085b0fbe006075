//! Download endpoint
//!
//! `GET /download?url=<url>&type=<video|audio>` resolves the media, picks a
//! format, starts the extractor and streams its output as an attachment.
//! Everything that can fail cleanly (bad query, limiter, metadata, spawn)
//! fails before the response headers are committed.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

use super::disposition::content_disposition;
use super::handlers::HttpError;
use crate::format::MediaKind;
use crate::limits::ClientAddr;
use crate::metrics::DownloadOutcome;
use crate::state::{AppState, DownloadTicket};
use crate::ytdlp::{self, DownloadProcess};

/// Query parameters of the download endpoint
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl DownloadQuery {
    fn url(&self) -> Result<&str, HttpError> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| HttpError::BadRequest("Missing url parameter".to_string()))
    }

    fn kind(&self) -> Result<MediaKind, HttpError> {
        match self.kind.as_deref() {
            None => Ok(MediaKind::default()),
            Some(t) => t
                .parse()
                .map_err(|t| HttpError::BadRequest(format!("Unsupported type: {}", t))),
        }
    }
}

/// Stream a media download
/// GET /download
pub async fn download(
    State(state): State<Arc<AppState>>,
    ClientAddr(client): ClientAddr,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, HttpError> {
    state.metrics.record_request();

    let url = query.url()?;
    let kind = query.kind()?;

    let slot = state.limiter.try_acquire(client).map_err(|reason| {
        state.metrics.record_rejected();
        tracing::warn!(
            client = ?client,
            active = state.limiter.active(),
            from_client = ?client.map(|ip| state.limiter.active_for(ip)),
            "rejecting download: {}",
            reason
        );
        HttpError::Busy
    })?;

    let metadata = ytdlp::resolve(&state.config.ytdlp, url)
        .await
        .map_err(|e| {
            state.metrics.record_resolution_failure();
            tracing::warn!(url, "metadata resolution failed: {}", e);
            HttpError::InvalidMedia
        })?;

    let directive = state.policy.directive_for(kind, metadata.duration_secs);
    let disposition = HeaderValue::from_str(&content_disposition(
        &metadata.title,
        directive.container.extension(),
    ))
    .map_err(|e| HttpError::InternalError(format!("Invalid Content-Disposition: {}", e)))?;

    let id = Uuid::new_v4();
    let process = DownloadProcess::spawn(
        id,
        &state.config.ytdlp,
        &state.config.download,
        url,
        &directive,
    )
    .map_err(|e| {
        tracing::error!(download = %id, "failed to start extractor: {}", e);
        HttpError::InternalError("Failed to start download".to_string())
    })?;

    tracing::info!(
        download = %id,
        url,
        pid = ?process.pid(),
        title = %metadata.title,
        duration = ?metadata.duration_secs,
        kind = %kind,
        strategy = directive.strategy.as_str(),
        "starting download"
    );

    let ticket = AppState::open_download(
        &state,
        id,
        &metadata,
        kind,
        directive.strategy,
        client,
        slot,
    );
    let body = Body::from_stream(track(process.into_stream(), ticket));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(directive.container.content_type()),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((headers, body).into_response())
}

/// Count bytes and record how the stream ended.
///
/// The ticket moves into the stream, so it is released exactly when the
/// response body is dropped.
fn track<S>(
    inner: S,
    ticket: DownloadTicket,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    stream::unfold(
        (Box::pin(inner), ticket),
        |(mut inner, mut ticket)| async move {
            match inner.next().await {
                Some(Ok(bytes)) => {
                    ticket.record_chunk(bytes.len());
                    Some((Ok(bytes), (inner, ticket)))
                }
                Some(Err(e)) => {
                    tracing::warn!(download = %ticket.id(), "aborting response: {}", e);
                    ticket.finish(DownloadOutcome::Failed);
                    Some((Err(e), (inner, ticket)))
                }
                None => {
                    ticket.finish(DownloadOutcome::Completed);
                    None
                }
            }
        },
    )
}
