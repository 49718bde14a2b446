//! Shared primitives used across the crate: the error type and integer
//! rectangle geometry.

pub mod error;
pub mod geom;
