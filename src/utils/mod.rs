//! The `utils` module provides a collection of utility functions and common
//! definitions used across `iothub-http`.
//!
//! This module centralizes the pieces every layer reaches for: the error
//! types, logging initialization, the clock abstraction and URL-encoding.

pub mod clock;
pub mod error;
pub mod logging;
pub mod url;
