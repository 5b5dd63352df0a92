//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): the resolver error taxonomy
//! - [`context`]: translation of engine failures into that taxonomy

pub mod context;
pub mod neterror;
