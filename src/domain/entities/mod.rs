//! Core domain entities.
//!
//! - [`ShortenedUrl`] - A short key mapped to an original URL
//! - [`UserUrl`] - Ownership link between a user and a shortened URL

pub mod shortened_url;

pub use shortened_url::{ShortenedUrl, UserId, UserUrl};
