//! HTTP boundary of the hashing service.
//!
//! This module maps HTTP requests onto a shared [`hashq::WorkCoordinator`]:
//! it validates input, parses identifiers, refuses new work once draining
//! begins and translates [`hashq::Error`]s into status codes.
//!
//! ## Structure
//!
//! - [`handler`] - Routes, handlers and shared state (`AppState`).
//! - [`error`] - `ApiError`, the status-code mapping.

pub mod error;
pub mod handler;
