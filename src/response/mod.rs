//! Reply composition for the transport layer

pub mod composer;

pub use composer::{compose, Reply};
