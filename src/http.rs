//! HTTP inspection surface: `GET /devices/count` and `GET /devices`.
//!
//! A thin read-only window onto the manager's device registry, built
//! directly on `hyper` + `hyper-util` rather than a full web framework —
//! two routes don't need one. Request tracing is layered on with
//! `tower-http`'s `TraceLayer`, same as the rest of the process's logging.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use serde::Serialize;
use tokio::net::TcpListener;
use tower::{service_fn, ServiceBuilder};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::manager::Manager;

#[derive(Serialize)]
struct CountResponse {
    count: usize,
}

#[derive(Serialize)]
struct DeviceSummary {
    serial: String,
    name: String,
    kind: &'static str,
    connected: bool,
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response is well-formed")
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::new()))
        .expect("static response is well-formed")
}

async fn handle(manager: Arc<Manager>, req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/devices/count") => {
            let body = serde_json::to_vec(&CountResponse { count: manager.device_count() })
                .unwrap_or_else(|_| b"{}".to_vec());
            json_response(StatusCode::OK, body)
        }
        (&Method::GET, "/devices") => {
            let devices = manager.devices();
            if devices.is_empty() {
                not_found()
            } else {
                let summaries: Vec<DeviceSummary> = devices
                    .iter()
                    .map(|d| DeviceSummary {
                        serial: d.serial.clone(),
                        name: d.name.clone(),
                        kind: match d.kind {
                            intelli_protocol::DeviceKind::IntelliDose => "IntelliDose",
                            intelli_protocol::DeviceKind::IntelliClimate => "IntelliClimate",
                        },
                        connected: d.is_open(),
                    })
                    .collect();
                let body = serde_json::to_vec(&summaries).unwrap_or_else(|_| b"[]".to_vec());
                json_response(StatusCode::OK, body)
            }
        }
        _ => not_found(),
    };
    Ok(response)
}

/// Serves the inspection surface forever on `addr`.
pub async fn serve(addr: &str, manager: Arc<Manager>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http inspection surface listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let manager = manager.clone();

        tokio::task::spawn(async move {
            let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
            let service = ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .service(service_fn(move |req| handle(manager.clone(), req)));
            let service = TowerToHyperService::new(service);
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!(%peer, error = %e, "http connection error");
            }
        });
    }
}
