//! HTTP API handlers for wlab-ws

pub mod health;
pub mod statistics;
pub mod weak_supervision;

pub use health::health_routes;
pub use statistics::statistics_routes;
pub use weak_supervision::weak_supervision_routes;
