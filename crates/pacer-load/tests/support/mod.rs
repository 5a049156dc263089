//! In-process stand-in for the game statistics API.

#![allow(dead_code)]

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

/// Ids the mock knows; matches the default fixtures.
pub const KNOWN_IDS: &[&str] = &[
    "000582cf-0b3d-4855-9f5e-54d3be5443cb",
    "000fc79c-38c1-4c37-bafe-3b5b15f405aa",
    "00358a92-4bd2-4cc2-a3bb-1ded6f5994ba",
];

pub fn record(id: &str, game_name: &str) -> Value {
    json!({
        "id": id,
        "gameName": game_name,
        "category": "Card Game",
        "totalBets": 10,
        "totalWins": 2,
        "averageBetAmount": 12.5,
        "popularityScore": 0.8
    })
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        "application/json; charset=utf-8".parse().unwrap(),
    );
    response
}

fn empty_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

async fn handle(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let id = path.strip_prefix("/gamedata/").map(str::to_string);
    let known = id.as_deref().map_or(false, |id| KNOWN_IDS.contains(&id));

    let response = match (method, path.as_str(), id) {
        (Method::GET, "/gamedata", _) => json_response(
            StatusCode::OK,
            json!([record(KNOWN_IDS[0], "Volleyball Game"), record(KNOWN_IDS[1], "Chinchon")]),
        ),
        (Method::GET, "/down", _) => empty_response(StatusCode::SERVICE_UNAVAILABLE),
        (Method::GET, "/slow", _) => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            empty_response(StatusCode::OK)
        }
        (Method::GET, "/text", _) => {
            let mut response = Response::new(Body::from("plain"));
            response
                .headers_mut()
                .insert(hyper::header::CONTENT_TYPE, "text/plain".parse().unwrap());
            response
        }
        (Method::GET, _, Some(id)) if known => {
            json_response(StatusCode::OK, record(&id, "Volleyball Game"))
        }
        (Method::POST, "/gamedata", _) => {
            let bytes = hyper::body::to_bytes(req.into_body())
                .await
                .unwrap_or_default();
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(body) if body.get("gameName").is_some() => {
                    let name = body["gameName"].as_str().unwrap_or_default().to_string();
                    json_response(StatusCode::CREATED, record("new-id", &name))
                }
                _ => empty_response(StatusCode::BAD_REQUEST),
            }
        }
        (Method::PUT, _, Some(_)) if known => empty_response(StatusCode::NO_CONTENT),
        (Method::DELETE, _, Some(_)) if known => empty_response(StatusCode::NO_CONTENT),
        _ => empty_response(StatusCode::NOT_FOUND),
    };
    Ok(response)
}

/// Starts the mock on an ephemeral port and returns its base url.
pub async fn spawn_game_api() -> String {
    let make_svc = make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(handle)) });
    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(async move {
        let _ = server.await;
    });
    format!("http://{}", addr)
}
