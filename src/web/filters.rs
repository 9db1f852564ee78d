use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use crate::{
    core::{desk::DeskRequest, participant::ParticipantRecord},
    send_message, Directory,
};

use super::handlers::{
    get_counters, get_mode, reconcile_counters, scan, search, set_mode, to_http_output,
};

pub fn with_directory(
    directory: Directory,
) -> impl Filter<Extract = (Directory,), Error = Infallible> + Clone {
    warp::any().map(move || directory.clone())
}

fn desk_filters(
    directory: Directory,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let view = warp::path!("desk")
        .and(warp::get())
        .and(with_directory(directory.clone()))
        .and_then(async |directory: Directory| {
            to_http_output(send_message!(directory.desk_actor, DeskRequest, View))
        });

    let scan = warp::path!("desk" / "scan")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(scan);

    let refresh = warp::path!("desk" / "refresh")
        .and(warp::post())
        .and(with_directory(directory.clone()))
        .and_then(async |directory: Directory| {
            to_http_output(send_message!(directory.desk_actor, DeskRequest, Refresh))
        });

    let search = warp::path!("desk" / "search")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(search);

    let manual_check_in = warp::path!("desk" / "checkin")
        .and(warp::post())
        .and(with_directory(directory.clone()))
        .and_then(async |directory: Directory| {
            to_http_output(send_message!(
                directory.desk_actor,
                DeskRequest,
                ManualCheckIn
            ))
        });

    let cancel_check_in = warp::path!("desk" / "checkin")
        .and(warp::delete())
        .and(with_directory(directory.clone()))
        .and_then(async |directory: Directory| {
            to_http_output(send_message!(
                directory.desk_actor,
                DeskRequest,
                CancelCheckIn
            ))
        });

    let clear = warp::path!("desk" / "clear")
        .and(warp::post())
        .and(with_directory(directory.clone()))
        .and_then(async |directory: Directory| {
            to_http_output(send_message!(directory.desk_actor, DeskRequest, Clear))
        });

    let save_record = warp::path!("desk" / "participant")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_directory(directory))
        .and_then(async |record: ParticipantRecord, directory: Directory| {
            to_http_output(send_message!(
                directory.desk_actor,
                DeskRequest,
                SaveRecord,
                record
            ))
        });

    view.or(scan)
        .or(refresh)
        .or(search)
        .or(manual_check_in)
        .or(cancel_check_in)
        .or(clear)
        .or(save_record)
}

fn mode_filters(
    directory: Directory,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let get = warp::path!("mode")
        .and(warp::get())
        .and(with_directory(directory.clone()))
        .and_then(get_mode);

    let set = warp::path!("mode")
        .and(warp::put())
        .and(warp::body::json())
        .and(with_directory(directory))
        .and_then(set_mode);

    get.or(set)
}

fn counter_filters(
    directory: Directory,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let counters = warp::path!("counters")
        .and(warp::get())
        .and(with_directory(directory.clone()))
        .and_then(get_counters);

    let reconcile = warp::path!("counters" / "reconcile")
        .and(warp::post())
        .and(with_directory(directory))
        .and_then(reconcile_counters);

    counters.or(reconcile)
}

pub fn api_filters(
    directory: Directory,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    desk_filters(directory.clone())
        .or(mode_filters(directory.clone()))
        .or(counter_filters(directory))
}
