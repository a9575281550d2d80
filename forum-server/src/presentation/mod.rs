pub mod dto;
pub mod graphql;
pub mod handlers;
pub mod middleware;
pub mod utils;
