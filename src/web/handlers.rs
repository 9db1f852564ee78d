use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use crate::{
    core::desk::{DeskRequest, SearchQuery},
    send_message, Directory,
};

/// A Json struct carrying a scanned code
#[derive(Serialize, Deserialize, Debug)]
pub struct Scan {
    pub value: String,
}

/// A Json struct to read or set live mode
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Mode {
    pub live: bool,
}

pub fn to_http_output<T: Serialize>(
    result: anyhow::Result<T>,
) -> Result<impl warp::Reply, Infallible> {
    match result.and_then(|data| Ok(serde_json::to_string::<T>(&data)?)) {
        Ok(json) => Ok(warp::reply::with_status(
            warp::reply::with_header(json, "content-type", "application/json"),
            warp::http::StatusCode::OK,
        )),
        Err(e) => {
            log::warn!("{}", e);
            Ok(warp::reply::with_status(
                warp::reply::with_header(e.to_string(), "content-type", "text/plain"),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

pub async fn get_mode(directory: Directory) -> Result<impl warp::Reply, Infallible> {
    to_http_output(Ok(Mode {
        live: directory.mode.is_live(),
    }))
}

pub async fn set_mode(mode: Mode, directory: Directory) -> Result<impl warp::Reply, Infallible> {
    directory.mode.set(mode.live);
    to_http_output(Ok(Mode {
        live: directory.mode.is_live(),
    }))
}

pub async fn get_counters(directory: Directory) -> Result<impl warp::Reply, Infallible> {
    to_http_output(
        directory
            .api
            .counters(&directory.event)
            .await
            .map_err(anyhow::Error::from),
    )
}

pub async fn reconcile_counters(directory: Directory) -> Result<impl warp::Reply, Infallible> {
    log::info!("Reconciling counters for {}", directory.event);
    to_http_output(
        directory
            .api
            .reconcile_counters(&directory.event)
            .await
            .map_err(anyhow::Error::from),
    )
}

pub async fn scan(scan: Scan, directory: Directory) -> Result<impl warp::Reply, Infallible> {
    to_http_output(send_message!(
        directory.desk_actor,
        DeskRequest,
        Scan,
        scan.value
    ))
}

pub async fn search(
    query: SearchQuery,
    directory: Directory,
) -> Result<impl warp::Reply, Infallible> {
    to_http_output(send_message!(directory.desk_actor, DeskRequest, Search, query))
}
