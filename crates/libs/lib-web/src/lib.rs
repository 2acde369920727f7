//! # Web Library
//!
//! HTTP and websocket surface of the chat backend: handlers, middleware, the
//! chat services and server startup.

pub mod chat;
pub mod handlers;
pub mod middleware;
pub mod server;

#[cfg(test)]
mod test_support;

pub use server::{create_router, start_server, AppState};
