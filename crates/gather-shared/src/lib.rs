//! # gather-shared
//!
//! Domain types and wire protocol for the Gather coordination service.
//!
//! Everything in this crate is plain data: the records held in the keyed
//! store (users, groups, messages), the JSON event payloads delivered to
//! clients, and the input validation rules both the REST layer and the
//! store-level transforms rely on.

pub mod constants;
pub mod id;
pub mod protocol;
pub mod types;
pub mod validate;

pub use id::generate_id;
pub use types::*;
