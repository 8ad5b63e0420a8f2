pub extern crate actix_web;

pub mod config;
pub mod connection;
pub mod directory;
pub mod handlers;
pub mod registry;
pub mod room;

mod participant_tx_storage;
mod permission;
mod room_state;
