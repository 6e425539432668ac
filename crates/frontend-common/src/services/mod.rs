pub mod failure;
pub mod session;

pub use failure::{FailureKind, ServiceFailure, ServiceResult};
pub use session::{SessionService, SignedIn};
