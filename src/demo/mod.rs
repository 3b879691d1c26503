//! Two programs built on [`crate::net::Net`]: a rotating mutual exclusion
//! protocol among three actors, and multiplication by repeated addition.

pub mod alternator;
pub mod multiplicator;
