//! Request/response DTOs for the IncentEdge API.
//!
//! Entity structs live in `incentedge-core`; everything here is wire shape:
//! create/update payloads, list queries, and responses with computed fields.

pub mod application;
pub mod comment;
pub mod program;
pub mod status;
pub mod task;

pub use application::*;
pub use comment::*;
pub use program::*;
pub use status::*;
pub use task::*;
