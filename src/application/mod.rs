//! Application layer services implementing business logic.
//!
//! Services consume the [`crate::domain::repositories::Storage`] trait and
//! provide the API that HTTP handlers call.
//!
//! # Available Services
//!
//! - [`services::shortener_service::ShortenerService`] - Shortening, lookup and
//!   asynchronous batch deletion

pub mod services;
