pub mod alternative;
pub mod enums;
pub mod question;
pub mod questionnaire;
pub mod session;
pub mod visibility;

pub use alternative::*;
pub use enums::*;
pub use question::*;
pub use questionnaire::*;
pub use session::*;
pub use visibility::*;
