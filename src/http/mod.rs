//! Transport surface. One endpoint, `/snmp`, accepting the poll parameters
//! as a query string (GET) or a form body (POST). Failures ride inside the
//! JSON payload's `Error` field with a 200 status, which is what existing
//! pollers expect.

use std::sync::Arc;

use axum::extract::{Form, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use crate::gateway::Gateway;
use crate::request::{PollRequest, PollResult};
use crate::snmp::SnmpConnector;

// -----------------------------------------------------------------------------
// ----- Router ----------------------------------------------------------------

pub fn router<C: SnmpConnector>(gateway: Arc<Gateway<C>>) -> Router {
    Router::new()
        .route("/snmp", get(poll_query::<C>).post(poll_form::<C>))
        .with_state(gateway)
}

// -----------------------------------------------------------------------------
// ----- Handlers --------------------------------------------------------------

async fn poll_query<C: SnmpConnector>(
    State(gateway): State<Arc<Gateway<C>>>,
    Query(req): Query<PollRequest>,
) -> Json<PollResult> {
    handle(gateway, req).await
}

async fn poll_form<C: SnmpConnector>(
    State(gateway): State<Arc<Gateway<C>>>,
    Form(req): Form<PollRequest>,
) -> Json<PollResult> {
    handle(gateway, req).await
}

async fn handle<C: SnmpConnector>(gateway: Arc<Gateway<C>>, req: PollRequest) -> Json<PollResult> {
    info!(
        seq = %req.seq,
        ip = %req.ip,
        oids = %req.oids,
        version = %req.version,
        "snmp poll"
    );
    Json(gateway.poll(&req).await)
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
