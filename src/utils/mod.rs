//! Shared helpers.

pub mod fs;
pub mod html;
pub mod mime;
pub mod url;
