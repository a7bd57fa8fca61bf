//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `&Connection`, one module per entity kind, all
//! re-exported here.

mod alternative;
mod consistency;
mod question;
mod questionnaire;
mod session;

pub use alternative::*;
pub use consistency::*;
pub use question::*;
pub use questionnaire::*;
pub use session::*;
