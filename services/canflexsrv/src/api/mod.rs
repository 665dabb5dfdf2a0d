//! HTTP control surface and live frame feed

pub mod handlers;
pub mod models;
pub mod routes;
pub mod websocket;

pub use routes::create_routes;
