//! Data Transfer Objects for REST request/response serialization.
//!
//! Tournaments and structures are returned in their domain shape; only
//! requests that bundle routing data with a body get their own type here.

pub mod common_dto;
pub mod control_dto;

pub use common_dto::*;
pub use control_dto::*;
