//! Database access for wlab-ws
//!
//! Every function takes the connection of the caller's [`Session`]; nothing
//! here commits.

pub mod associations;
pub mod information_sources;
pub mod labeling_tasks;
pub mod notifications;
pub mod projects;
pub mod session;
pub mod weak_supervision;

pub use session::Session;
