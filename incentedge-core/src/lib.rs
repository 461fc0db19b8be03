//! IncentEdge Core - Domain Types
//!
//! Pure data structures and the application status state machine. No I/O,
//! no async. The API crate depends on this; nothing here depends on the
//! API crate.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod tasks;
pub mod transitions;

pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use tasks::*;
pub use transitions::*;
