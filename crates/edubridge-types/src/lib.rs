//! Rows, payloads and events shared by the Edubridge backend adapters and views.

pub mod api;
pub mod events;
pub mod models;

pub use api::*;
pub use events::RealtimeEvent;
pub use models::*;
