pub mod guard;
pub mod store;

pub use guard::{GuardState, GuardView, SessionGuard};
pub use store::{SessionRecord, SessionStore};
