//! Opaque token secrets and the session triple built from token endpoint responses.

pub mod secret;
pub mod session;
