use actix_web::web;

use crate::connection::ws_index;

mod status;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/{room_id}").route(web::get().to(ws_index)));
    cfg.service(web::resource("/status").route(web::get().to(status::live_rooms)));
}
