//! Wire types shared with the SNFOK backend.

use serde::{Deserialize, Serialize};

/// The envelope every backend response is wrapped in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// One of `success`, `error`, or `partial`.
    pub status: String,

    #[serde(default)]
    pub message: String,

    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,

    #[serde(default)]
    pub meta: Meta,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub total_count: i64,
    pub current_page: i64,
    pub next_page: Option<i64>,
    pub request_id: String,

    /// Application-level response code. Compared against
    /// [`NO_CLUSTER_AVAILABLE`](crate::NO_CLUSTER_AVAILABLE) by the cluster
    /// listing adapter and nowhere else.
    pub code: i64,
}

/// A registered cluster as reported by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub cluster_name: String,
    pub master_ip: String,

    /// Not range-checked by the registry.
    pub agent_port: i64,
    #[serde(default)]
    pub description: String,
}
