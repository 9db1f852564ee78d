use std::convert::Infallible;

use filters::api_filters;
use warp::{http::Method, reject::Rejection, Filter};

use crate::Directory;

pub mod filters;
pub mod handlers;

async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, msg) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        log::error!("{}", err);
        (warp::http::StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::MethodNotAllowed>() {
        log::error!("Method Not Allowed: {}", err);
        (warp::http::StatusCode::METHOD_NOT_ALLOWED, err.to_string())
    } else {
        log::error!("Unhandled Rejection: {:?}", err);
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&msg), code))
}

pub fn routes(
    directory: Directory,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "User-Agent",
            "Sec-Fetch-Mode",
            "Referer",
            "Origin",
            "Content-Type",
            "Access-Control-Allow-Origin",
            "Access-Control-Request-Method",
            "Access-Control-Request-Headers",
            "Access-Control-Allow-Headers",
        ])
        .allow_methods(&[
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    api_filters(directory).recover(handle_rejection).with(cors)
}

pub async fn run_http_server(directory: Directory, port: u16) -> anyhow::Result<()> {
    log::info!("Serving desk API on port {}", port);
    warp::serve(routes(directory)).run(([0, 0, 0, 0], port)).await;

    Ok(())
}
