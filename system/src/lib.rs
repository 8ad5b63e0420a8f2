mod board;
mod event_log;
mod message;
mod types;
mod undo_history;

pub use board::*;
pub use event_log::*;
pub use message::*;
pub use types::*;
pub use undo_history::*;

pub extern crate bincode;
pub extern crate serde;
pub extern crate serde_json;
pub extern crate uuid;
