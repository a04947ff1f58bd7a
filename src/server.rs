use std::net::SocketAddr;

use tokio::sync::watch;
use tokio::task;
use warp::{Filter, Reply, Rejection};

use crate::state::ControllerStatus;

pub fn status_route(
  status: watch::Receiver<ControllerStatus>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
  let status_filter = warp::any().map(move || status.clone());
  warp::get()
    .and(warp::path!("state"))
    .and(warp::path::end())
    .and(status_filter)
    .and_then(get_controller_state)
}

pub fn set_up_web_server(status: watch::Receiver<ControllerStatus>, bind: SocketAddr) {
  log::info!("serving controller state on http://{}/state", bind);
  task::spawn(async move {
    warp::serve(status_route(status))
      .run(bind)
      .await;
  });
}

async fn get_controller_state(status: watch::Receiver<ControllerStatus>) -> Result<impl Reply, Rejection> {
  let snapshot = status.borrow().clone();
  Ok(warp::reply::json(&snapshot))
}
