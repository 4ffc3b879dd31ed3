//! Pool templates and the event-creation form built from them.

use serde::{Deserialize, Serialize};

use crate::pool::PoolType;
use crate::serde_util::null_as_default;
use crate::types::{DbId, Millis};
use crate::user::User;

/// Reusable blueprint for the pools a new event is stamped out with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DbId>,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub process_time: Millis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub auto_discharge: bool,
    pub pool_type: PoolType,
    /// How many pools to create from this template.
    #[serde(default, deserialize_with = "null_as_default")]
    pub pool_number: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub queue_size: usize,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Body of `POST /api/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTemplate {
    pub name: String,
    pub director: User,
    pub duration: Millis,
    pub pool_tmps: Vec<PoolTemplate>,
}
