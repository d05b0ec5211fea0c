//! HTTP handlers for todo CRUD and service probes.

pub mod common;
pub mod todo;
pub use common::*;
pub use todo::*;
