//! Data models for study planner entities

mod group;
mod notification;
mod plan;
mod task;
mod user;

pub use group::*;
pub use notification::*;
pub use plan::*;
pub use task::*;
pub use user::*;

use serde::Deserialize;

/// `{"msg": "..."}` acknowledgement returned by action endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub msg: String,
}
