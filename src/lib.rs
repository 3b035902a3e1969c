//! Walk tracker library
//!
//! Infers on-foot trips between Home and University from a stream of
//! location fixes. Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
