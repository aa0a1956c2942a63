//! Utility functions and helpers.

pub mod dates;
pub mod html;
pub mod http;
pub mod log;
pub mod url;
