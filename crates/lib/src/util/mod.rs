//! Small shared helpers.

pub mod atomic;
pub mod fnv;
pub mod testutil;
