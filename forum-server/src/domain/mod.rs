pub mod error;
pub mod post;
pub mod thread;
pub mod user;
pub mod validation;
