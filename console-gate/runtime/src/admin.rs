use anyhow::Result;
use bytes::Bytes;
use futures::future;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use prometheus_client::registry::Registry;
use snfok_console_gate_core::readiness;
use std::{convert::Infallible, sync::Arc};
use tokio::net::TcpListener;
use tracing::{debug, info};

type Body = Full<Bytes>;

/// Serves readiness, liveness, and metrics.
///
/// `/ready` reports whether the session gate has settled for the current
/// navigation, so external probes can wait on it the same way views do.
#[derive(Clone)]
pub struct Admin {
    ready: readiness::Reader,
    registry: Arc<Registry>,
}

// === impl Admin ===

impl Admin {
    pub fn new(ready: readiness::Reader, registry: Registry) -> Self {
        Self {
            ready,
            registry: Arc::new(registry),
        }
    }

    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(%addr, "HTTP admin server listening");
        loop {
            let (io, peer) = listener.accept().await?;
            let admin = self.clone();
            tokio::spawn(async move {
                let svc = hyper::service::service_fn(move |req: Request<hyper::body::Incoming>| {
                    future::ok::<_, Infallible>(admin.handle(&req))
                });
                if let Err(error) = http1::Builder::new()
                    .serve_connection(TokioIo::new(io), svc)
                    .await
                {
                    debug!(%error, %peer, "Admin connection failed");
                }
            });
        }
    }

    fn handle<B>(&self, req: &Request<B>) -> Response<Body> {
        let path = req.uri().path();
        if !matches!(path, "/ready" | "/live" | "/metrics") {
            return mk_rsp(StatusCode::NOT_FOUND, Body::default());
        }
        if !matches!(*req.method(), Method::GET | Method::HEAD) {
            return mk_rsp(StatusCode::METHOD_NOT_ALLOWED, Body::default());
        }

        match path {
            "/ready" if self.ready.is_loading() => {
                mk_rsp(StatusCode::SERVICE_UNAVAILABLE, "not ready\n".into())
            }
            "/ready" => mk_rsp(StatusCode::OK, "ready\n".into()),
            "/live" => mk_rsp(StatusCode::OK, "live\n".into()),
            _ => {
                let mut out = String::new();
                match prometheus_client::encoding::text::encode(&mut out, &self.registry) {
                    Ok(()) => Response::builder()
                        .status(StatusCode::OK)
                        .header(
                            header::CONTENT_TYPE,
                            "application/openmetrics-text; version=1.0.0; charset=utf-8",
                        )
                        .body(out.into())
                        .expect("metrics response must be valid"),
                    Err(error) => {
                        debug!(%error, "Failed to encode metrics");
                        mk_rsp(StatusCode::INTERNAL_SERVER_ERROR, Body::default())
                    }
                }
            }
        }
    }
}

fn mk_rsp(status: StatusCode, body: Body) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(body)
        .expect("admin response must be valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use http_body_util::BodyExt;
    use snfok_console_gate_core::{ExclusionSet, Gate, Navigation};

    fn get(path: &str) -> Request<()> {
        Request::get(path).body(()).unwrap()
    }

    async fn body_string(rsp: Response<Body>) -> String {
        let bytes = rsp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn ready_tracks_the_gate() {
        let (tx, rx) = readiness::pair();
        let mut gate = Gate::new(Arc::new(ExclusionSet::default()), "/login", tx);
        let admin = Admin::new(rx, Registry::default());

        let rsp = admin.handle(&get("/ready"));
        assert_eq!(rsp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_string(rsp).await, "not ready\n");

        assert_eq!(gate.navigate("/login"), Navigation::Render);
        let rsp = admin.handle(&get("/ready"));
        assert_eq!(rsp.status(), StatusCode::OK);
        assert_eq!(body_string(rsp).await, "ready\n");

        assert!(matches!(gate.navigate("/dashboard"), Navigation::Validate(_)));
        assert_eq!(
            admin.handle(&get("/ready")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn serves_metrics() {
        let (_tx, rx) = readiness::pair();
        let mut registry = Registry::default();
        let metrics = Metrics::register(&mut registry);
        metrics.navigated();
        let admin = Admin::new(rx, registry);

        let rsp = admin.handle(&get("/metrics"));
        assert_eq!(rsp.status(), StatusCode::OK);
        assert!(body_string(rsp).await.contains("navigations_total 1"));
    }

    #[test]
    fn rejects_unknown_routes_and_methods() {
        let (_tx, rx) = readiness::pair();
        let admin = Admin::new(rx, Registry::default());

        assert_eq!(admin.handle(&get("/")).status(), StatusCode::NOT_FOUND);
        assert_eq!(admin.handle(&get("/live")).status(), StatusCode::OK);

        let post = Request::post("/ready").body(()).unwrap();
        assert_eq!(
            admin.handle(&post).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
