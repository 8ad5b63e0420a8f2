use std::time::Duration;

use actix_web::{web, Responder};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::registry::SessionRegistry;
use crate::room::{RoomMessage, RoomStatus};

#[derive(Serialize)]
struct StatusResponse {
    rooms: Vec<RoomStatus>,
}

/// Read-only operations view: every live room answers a describe
/// round-trip. A room that is mid-retirement just drops out of the list.
pub async fn live_rooms(registry: web::Data<SessionRegistry>) -> impl Responder {
    let mut rooms = Vec::new();
    for (room_id, room_tx) in registry.live_rooms() {
        let (reply_tx, reply_rx) = oneshot::channel();
        if room_tx
            .try_send(RoomMessage::Describe { reply: reply_tx })
            .is_err()
        {
            continue;
        }
        match tokio::time::timeout(Duration::from_secs(1), reply_rx).await {
            Ok(Ok(status)) => rooms.push(status),
            _ => log::warn!("room {} did not answer describe", room_id),
        }
    }
    rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
    web::Json(StatusResponse { rooms })
}
