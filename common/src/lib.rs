pub mod auth;
pub mod cart;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod search;
pub mod server;
pub mod store;
