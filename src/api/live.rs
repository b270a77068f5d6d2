//! Live click stream: `GET /api/debug/live?owner_id=…&link_id=…`.
//!
//! Upgrades to a WebSocket and forwards bus events matching the requested
//! filter as JSON text frames. The socket task ends when the client goes
//! away or the bus closes at shutdown; a dropped subscription is its own
//! cancellation.

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::select;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::api::AppState;
use crate::event::SubscriptionFilter;

#[derive(Debug, Deserialize, Default)]
pub struct LiveQuery {
    pub owner_id: Option<Uuid>,
    pub link_id: Option<Uuid>,
}

/// WebSocket upgrade handler.
pub async fn live_stream(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<LiveQuery>,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let filter = SubscriptionFilter {
        owner_id: query.owner_id,
        link_id: query.link_id,
    };
    let mut subscription = state.bus.subscribe(filter);

    debug!(
        "Live stream connected (owner: {:?}, link: {:?})",
        filter.owner_id, filter.link_id
    );

    actix_web::rt::spawn(async move {
        loop {
            select! {
                event = subscription.recv() => {
                    match event {
                        Some(event) => {
                            let Ok(json) = serde_json::to_string(&event) else {
                                continue;
                            };
                            if session.text(json).await.is_err() {
                                // Client gone
                                break;
                            }
                        }
                        // Bus closed: process shutting down
                        None => break,
                    }
                }
                msg = msg_stream.next() => {
                    match msg {
                        Some(Ok(actix_ws::Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(actix_ws::Message::Close(_))) | None => break,
                        Some(Ok(_)) => {
                            trace!("Ignoring inbound live-stream frame");
                        }
                        Some(Err(_)) => break,
                    }
                }
            }
        }

        let _ = session.close(None).await;
        debug!("Live stream disconnected");
    });

    Ok(response)
}
