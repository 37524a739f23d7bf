//! API client and resource endpoints for the study planner backend

pub mod client;
pub mod error;
pub mod group_plans;
pub mod groups;
pub mod invites;
pub mod notifications;
pub mod plans;
mod refresh;
pub mod tasks;
pub mod transport;
