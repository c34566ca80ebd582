pub mod auth;
pub mod catalog;
pub mod cleanup;
pub mod dashboard;
pub mod error;
pub mod incidents;
pub mod messenger;
pub mod middleware;
pub mod router;
pub mod state;

mod convert;

pub use error::{ApiResult, ItsmError};
pub use router::router;
pub use state::{AppState, AppStateInner, AuthSettings};
