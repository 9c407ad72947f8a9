pub mod auth;
pub mod error;
pub mod group;
pub mod meeting;
pub mod router;
pub mod socket;
pub mod state;
pub mod types;

pub use error::AppError;
pub use state::{AppState, build_state, build_state_with_meeting};

#[cfg(test)]
pub mod test_support;
