pub mod access;
pub mod accrual;
pub mod grant;
pub mod identity;
pub mod reset;
pub mod video;

pub use accrual::{AccrualEngine, EngineConfig, Observation, WatchState};
pub use grant::ElevatedGrant;
pub use identity::{IdentityError, IdentityResolver};
