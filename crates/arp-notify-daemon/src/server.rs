//! Web server setup and routing

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api;
use crate::state::AppState;

/// Build the router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", post(api::callback))
        .route("/api/presence", get(api::presence))
        .with_state(state)
}

/// Run `task` in the background and cancel `cancel` once it ends, however
/// it ends.
fn supervise<F>(task: F, cancel: CancellationToken) -> JoinHandle<Result<(), JoinError>>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = tokio::spawn(task).await;
        if !cancel.is_cancelled() {
            match &outcome {
                Ok(()) => error!("Presence monitor stopped unexpectedly, shutting down"),
                Err(e) => error!(error = %e, "Presence monitor crashed, shutting down"),
            }
        }
        cancel.cancel();
        outcome
    })
}

/// Run the monitor and the web server until `cancel` fires
pub async fn run(state: Arc<AppState>, bind: &str, cancel: CancellationToken) -> Result<()> {
    let app = router(state.clone());

    // Start the presence monitor in background
    let monitor_task = supervise(state.monitor.clone().run(cancel.clone()), cancel.clone());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;

    // The monitor must stop even if the server failed on its own
    cancel.cancel();
    let monitor_outcome = monitor_task.await?;

    info!("Waiting for in-flight scans and notifications");
    state.monitor.drain().await;

    served?;
    monitor_outcome.context("presence monitor failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use arp_notify_core::Target;
    use arp_notify_line::sign_body;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const SECRET: &str = "channel-secret";

    fn state() -> Arc<AppState> {
        state_with_secret(SECRET)
    }

    fn state_with_secret(secret: &str) -> Arc<AppState> {
        let mut config = Config::default();
        config.arp_scan.iface = "eth0".to_string();
        config.line.channel_secret = secret.to_string();
        let targets = vec![Target {
            mac: "aa:bb:cc:00:00:01".to_string(),
            ip: None,
            message: "hello".to_string(),
            receivers: vec!["U1".to_string()],
        }];
        AppState::new(config, targets, true).unwrap()
    }

    fn callback(body: &'static str, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::post("/callback").header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("x-line-signature", signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_callback_without_signature_rejected() {
        let response = router(state())
            .oneshot(callback(r#"{"events":[]}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_with_bad_signature_rejected() {
        let signature = sign_body("wrong-secret", br#"{"events":[]}"#).unwrap();
        let response = router(state())
            .oneshot(callback(r#"{"events":[]}"#, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_whoami_accepted() {
        const BODY: &str = r#"{"events":[{"type":"message","replyToken":"r1","source":{"type":"user","userId":"U42"},"message":{"type":"text","id":"1","text":"whoami"}}]}"#;
        let signature = sign_body(SECRET, BODY.as_bytes()).unwrap();
        let response = router(state())
            .oneshot(callback(BODY, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_callback_unparseable_body() {
        let signature = sign_body(SECRET, b"not json").unwrap();
        let response = router(state())
            .oneshot(callback("not json", Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_callback_rejected_without_channel_secret() {
        // An empty key would let anyone produce a matching signature
        let signature = sign_body("", br#"{"events":[]}"#).unwrap();
        let response = router(state_with_secret(""))
            .oneshot(callback(r#"{"events":[]}"#, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_crashed_monitor_cancels_token() {
        let cancel = CancellationToken::new();
        let handle = supervise(async { panic!("scheduler failure") }, cancel.clone());

        let outcome = handle.await.unwrap();
        assert!(outcome.unwrap_err().is_panic());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_returning_monitor_cancels_token() {
        let cancel = CancellationToken::new();
        let handle = supervise(async {}, cancel.clone());

        assert!(handle.await.unwrap().is_ok());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_presence_empty_before_first_cycle() {
        let response = router(state())
            .oneshot(Request::get("/api/presence").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["devices"], serde_json::json!([]));
        assert_eq!(json["stats"]["cycles_run"], 0);
        assert_eq!(json["stats"]["cycles_skipped"], 0);
    }
}
