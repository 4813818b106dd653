pub mod auth;
pub mod request_logger;

pub use auth::{AuthenticatedUser, JwtVerifier};
pub use request_logger::{request_logger_middleware, RequestLogSettings};
