pub mod campaign;
pub mod config;
pub mod output;
pub mod payload;
pub mod server;
pub mod store;
pub mod users;
