use std::convert::Infallible;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::handlers::api::{self, ApiError, ErrorMessage, EventsRequest, ExecuteRequest, ParseRequest, RunRequest};
use crate::service::agent::CalendarAgent;

pub async fn run_api(agent: Arc<CalendarAgent>, port: u16) {
    info!(port, "calendar agent api listening");
    warp::serve(routes(agent)).run(([0, 0, 0, 0], port)).await;
}

pub fn routes(
    agent: Arc<CalendarAgent>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&api::health()));

    let parse = warp::path("parse")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_agent(agent.clone()))
        .and(warp::body::json())
        .then(|agent: Arc<CalendarAgent>, body: ParseRequest| async move {
            respond(api::parse(&agent, body).await)
        });

    let execute = warp::path("execute")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_agent(agent.clone()))
        .and(warp::body::json())
        .then(|agent: Arc<CalendarAgent>, body: ExecuteRequest| async move {
            respond(Ok::<_, ApiError>(api::execute(&agent, body).await))
        });

    let run = warp::path("run")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_agent(agent.clone()))
        .and(warp::body::json())
        .then(|agent: Arc<CalendarAgent>, body: RunRequest| async move {
            respond(api::run(&agent, body).await)
        });

    let events = warp::path("events")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_agent(agent))
        .and(warp::body::json())
        .then(|agent: Arc<CalendarAgent>, body: EventsRequest| async move {
            respond(api::events(&agent, body).await)
        });

    health.or(parse).or(execute).or(run).or(events)
}

fn with_agent(
    agent: Arc<CalendarAgent>,
) -> impl Filter<Extract = (Arc<CalendarAgent>,), Error = Infallible> + Clone {
    warp::any().map(move || agent.clone())
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> warp::reply::Response {
    match result {
        Ok(body) => warp::reply::json(&body).into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            warp::reply::with_status(warp::reply::json(&ErrorMessage::from(&err)), status).into_response()
        }
    }
}
