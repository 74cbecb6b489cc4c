//! Session token models carried between the authorization server and the browser cookies.

pub mod token;

pub use token::{secret::*, session::*};
