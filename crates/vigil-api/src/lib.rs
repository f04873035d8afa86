pub mod admin;
pub mod comments;
pub mod identity;
pub mod middleware;
pub mod state;

pub use state::{AppState, AppStateInner};
