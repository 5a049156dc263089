use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use pacer_common::{Config, DEFAULT_CONFIG_PATH};
use pacer_load::api::ApiClient;
use pacer_load::metrics;
use pacer_load::suite::Suite;
use pacer_load::PacedDispatcher;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::env;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let directives = filter.to_string();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_target(true))
        .init();

    info!(filter = %directives, "JSON logging initialized");
}

fn respond(status: StatusCode, content_type: &str, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(content_type) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

async fn metrics_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match req.uri().path() {
        "/health" => respond(
            StatusCode::OK,
            "application/json",
            metrics::health_snapshot().to_string(),
        ),
        "/metrics" => match metrics::render_metrics() {
            Ok(text) => respond(StatusCode::OK, TextEncoder::new().format_type(), text),
            Err(e) => {
                error!(error = %e, "Failed to encode metrics");
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    e.to_string(),
                )
            }
        },
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
    };
    Ok(response)
}

async fn run_metrics_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let make_svc =
        make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metrics_handler)) });

    let server = Server::bind(&addr).serve(make_svc);

    info!(port = port, "Metrics server online");

    if let Err(e) = server.await {
        error!(error = %e, "Metrics server failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config_path = env::var("PACER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    info!(config = %config_path, target = %config.target.base_url, "Configuration loaded");

    metrics::register_metrics();
    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            run_metrics_server(port).await;
        });
    }

    let master_token = CancellationToken::new();
    let signal_token = master_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    error!(error = %e, "Failed to listen for shutdown signal");
                    return;
                }
                warn!("Shutdown signal received; cancelling outstanding requests");
                signal_token.cancel();
            }
            _ = signal_token.cancelled() => {}
        }
    });

    let client = ApiClient::new(&config.target)?;
    client.probe().await?;

    let dispatcher = PacedDispatcher::from_config(&config.dispatch);
    let mut failed_suites = Vec::new();

    for kind in &config.scenario.suites {
        let suite = Suite::build(*kind, &config.scenario);
        let report = suite.run(&client, &dispatcher, &master_token).await;
        for case in report.failed_cases() {
            error!(
                suite = %kind,
                case = case.name,
                summary = %case.summary(),
                "Case failed"
            );
        }
        if !report.passed() {
            failed_suites.push(kind.as_str());
        }
        if master_token.is_cancelled() {
            warn!("Run cancelled; skipping remaining suites");
            break;
        }
    }

    master_token.cancel();

    if failed_suites.is_empty() {
        info!("All suites passed");
        Ok(())
    } else {
        Err(format!("suites failed: {}", failed_suites.join(", ")).into())
    }
}
