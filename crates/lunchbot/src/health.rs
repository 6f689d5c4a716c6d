//! Liveness endpoint: `GET /` answers 200 with an empty body.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::shutdown::wait_for_shutdown;

pub fn router() -> Router {
    Router::new().route("/", get(|| async { StatusCode::OK }))
}

/// Serve the health router on `0.0.0.0:{port}` until shutdown.
pub async fn serve(port: u16, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(listener, shutdown).await
}

/// Like [`serve`] on a pre-bound listener.
pub async fn serve_on(listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    tracing::info!(port, "health endpoint listening");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { wait_for_shutdown(&mut shutdown).await })
        .await?;
    tracing::info!("health endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn root_is_ok_and_empty() {
        let resp = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let resp = router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_on_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = watch::channel(false);
        let server = tokio::spawn(serve_on(listener, rx));
        tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }
}
