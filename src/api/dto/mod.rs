//! Data Transfer Objects for REST request serialization.
//!
//! Responses reuse the domain and service types directly; requests get
//! their own shapes where the wire names differ from the domain's.

pub mod contest_dto;
pub mod event_dto;
pub mod match_dto;
pub mod roster_dto;

pub use contest_dto::*;
pub use event_dto::*;
pub use match_dto::*;
pub use roster_dto::*;
