pub mod config;
pub mod group;
pub mod ids;
pub mod membership;
pub mod permission;
pub mod presence;

pub use config::AppConfig;
pub use membership::{MembershipError, MembershipStore, NewMember};
pub use permission::Permissions;
pub use presence::PresenceTracker;
