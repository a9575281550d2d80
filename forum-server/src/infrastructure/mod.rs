pub mod config;
pub mod database;
pub mod events;
pub mod logging;
pub mod media;
pub mod search;
pub mod security;
