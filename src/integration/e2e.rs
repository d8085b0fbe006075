//! End-to-end download tests

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use crate::config::{ServerConfig, UnknownDuration};
use crate::http::create_router;
use crate::http::handlers::INVALID_MEDIA_MESSAGE;
use crate::integration::fixtures::{process_alive, wait_for_exit, FakeYtDlp};
use crate::state::AppState;

fn app(config: ServerConfig) -> (Arc<AppState>, Router) {
    let state = Arc::new(AppState::new(config));
    (Arc::clone(&state), create_router(state))
}

async fn get(router: &Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_short_video_merges_streams() {
    let fake = FakeYtDlp::new();
    let (state, router) = app(fake.config());

    let response = get(&router, "/download?url=https://example.com/short").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_TYPE),
        "application/octet-stream"
    );
    assert_eq!(
        header_str(&response, header::CONTENT_DISPOSITION),
        "attachment; filename=\"Caf Clip.mp4\"; filename*=UTF-8''Caf%C3%A9%20Clip.mp4"
    );
    assert_eq!(
        body_string(response).await,
        "media-bytes:https://example.com/short"
    );

    let args = fake.download_args().unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert!(args.contains(&"bestvideo+bestaudio/best"));
    assert!(args.contains(&"--merge-output-format"));
    assert_eq!(&args[args.len() - 2..], ["--", "https://example.com/short"]);

    assert!(state.downloads.is_empty());
    assert_eq!(state.limiter.active(), 0);
    assert!(state
        .metrics
        .export_prometheus(0)
        .contains("ytdl_relay_downloads_finished_total{outcome=\"completed\"} 1"));
}

#[tokio::test]
async fn test_long_video_uses_single_file() {
    let fake = FakeYtDlp::new();
    let (_state, router) = app(fake.config());

    let response = get(&router, "/download?url=https://example.com/long&type=video").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header_str(&response, header::CONTENT_DISPOSITION)
        .starts_with("attachment; filename=\"Long Talk.mp4\""));
    body_string(response).await;

    let args = fake.download_args().unwrap();
    assert!(args.lines().any(|a| a == "best[ext=mp4]/best"));
    assert!(!args.contains("--merge-output-format"));
}

#[tokio::test]
async fn test_audio_extracts_mp3() {
    let fake = FakeYtDlp::new();
    let (_state, router) = app(fake.config());

    let response = get(&router, "/download?url=https://example.com/audio50&type=audio").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "audio/mpeg");
    assert!(header_str(&response, header::CONTENT_DISPOSITION)
        .starts_with("attachment; filename=\"Song.mp3\""));
    body_string(response).await;

    let args = fake.download_args().unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert!(args.contains(&"bestaudio/best"));
    assert!(args.contains(&"-x"));
    assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
}

#[tokio::test]
async fn test_unknown_duration_follows_policy() {
    let fake = FakeYtDlp::new();

    let (_state, router) = app(fake.config());
    body_string(get(&router, "/download?url=https://example.com/unknown").await).await;
    assert!(fake
        .download_args()
        .unwrap()
        .contains("bestvideo+bestaudio/best"));

    let mut config = fake.config();
    config.download.unknown_duration = UnknownDuration::SingleFile;
    let (_state, router) = app(config);
    body_string(get(&router, "/download?url=https://example.com/unknown").await).await;
    assert!(fake.download_args().unwrap().contains("best[ext=mp4]/best"));
}

#[tokio::test]
async fn test_private_video_is_rejected_before_download() {
    let fake = FakeYtDlp::new();
    let (state, router) = app(fake.config());

    let response = get(&router, "/download?url=https://example.com/private").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, INVALID_MEDIA_MESSAGE);
    assert!(fake.download_args().is_none());
    assert_eq!(state.limiter.active(), 0);
    assert!(state
        .metrics
        .export_prometheus(0)
        .contains("ytdl_relay_resolution_failures_total 1"));
}

#[tokio::test]
async fn test_missing_extractor_is_invalid_media() {
    let mut config = ServerConfig::default();
    config.ytdlp.binary = "/nonexistent/yt-dlp".to_string();
    let (_state, router) = app(config);

    let response = get(&router, "/download?url=https://example.com/short").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, INVALID_MEDIA_MESSAGE);
}

#[tokio::test]
async fn test_extractor_failure_truncates_body() {
    let fake = FakeYtDlp::new();
    let (state, router) = app(fake.config());

    let response = get(&router, "/download?url=https://example.com/broken").await;
    assert_eq!(response.status(), StatusCode::OK);

    let result = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    assert!(result.is_err());

    assert!(state.downloads.is_empty());
    assert!(state
        .metrics
        .export_prometheus(0)
        .contains("ytdl_relay_downloads_finished_total{outcome=\"failed\"} 1"));
}

#[tokio::test]
async fn test_concurrency_limit_rejects_with_503() {
    let fake = FakeYtDlp::new();
    let mut config = fake.config();
    config.limits.max_concurrent_downloads = 1;
    let (state, router) = app(config);

    let first = get(&router, "/download?url=https://example.com/endless").await;
    assert_eq!(first.status(), StatusCode::OK);
    let pid = fake.download_pid().await;

    let second = get(&router, "/download?url=https://example.com/short").await;
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_string(second).await, "Too many concurrent downloads");
    assert_eq!(state.active_downloads().len(), 1);

    // Dropping the unread body frees the slot and stops the extractor
    drop(first);
    assert_eq!(state.limiter.active(), 0);
    assert!(wait_for_exit(pid, Duration::from_secs(5)).await);

    let third = get(&router, "/download?url=https://example.com/short").await;
    assert_eq!(third.status(), StatusCode::OK);
    body_string(third).await;
}

#[tokio::test]
async fn test_client_disconnect_kills_extractor() {
    let fake = FakeYtDlp::new();
    let mut config = fake.config();
    config.download.chunk_size = 4096;
    let (state, router) = app(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let mut response = reqwest::get(format!(
        "http://{}/download?url=https://example.com/endless",
        addr
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let chunk = response.chunk().await.unwrap().unwrap();
    assert!(!chunk.is_empty());
    assert!(chunk.len() <= 4096);

    let pid = fake.download_pid().await;
    assert!(process_alive(pid));
    let downloads = state.active_downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].title, "Endless");
    assert_eq!(state.limiter.active_for(addr.ip()), 1);

    drop(response);

    assert!(
        wait_for_exit(pid, Duration::from_secs(5)).await,
        "extractor {} still running after disconnect",
        pid
    );

    for _ in 0..100 {
        if state.limiter.active() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(state.limiter.active(), 0);
    assert!(state.downloads.is_empty());
    assert!(state
        .metrics
        .export_prometheus(0)
        .contains("ytdl_relay_downloads_finished_total{outcome=\"cancelled\"} 1"));
}
