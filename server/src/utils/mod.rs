pub mod auth;
pub mod error;
pub mod password;
pub mod response;
