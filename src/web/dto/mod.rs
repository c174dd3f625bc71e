//! Data Transfer Objects for the upload API.

pub mod response;

pub use response::*;
