//! Scripted status source for tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::{CollectError, CollectResult};
use crate::facet::Query;
use crate::source::StatusSource;

pub(crate) enum Reply {
    Json(Value),
    Delayed(Duration, Value),
    /// Never answers; only the source timeout ends the call.
    Hang,
    ToolFailure,
    HttpFailure,
}

#[derive(Default)]
pub(crate) struct FakeSource {
    replies: HashMap<Query, Reply>,
    calls: Mutex<Vec<Query>>,
    timeout: Option<Duration>,
}

impl FakeSource {
    pub(crate) fn with(mut self, query: Query, reply: Reply) -> Self {
        self.replies.insert(query, reply);
        self
    }

    /// Bound every fetch the way the real sources do.
    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Every query answered with a small but realistic document.
    pub(crate) fn healthy() -> Self {
        Self::default()
            .with(
                Query::MonDump,
                Reply::Json(json!({
                    "epoch": 3,
                    "mons": [{"rank": 0, "name": "a"}, {"rank": 1, "name": "b"}, {"rank": 2, "name": "c"}],
                    "quorum": [0, 1, 2]
                })),
            )
            .with(
                Query::OsdDump,
                Reply::Json(json!({
                    "pools": [{"pool_name": "rbd", "size": 3, "pg_num": 64, "pg_placement_num": 64}],
                    "osds": [{"osd": 0, "up": 1, "in": 1}, {"osd": 1, "up": 0, "in": 1}]
                })),
            )
            .with(
                Query::PgDump,
                Reply::Json(json!({
                    "pg_stats": [{"pgid": "1.0", "state": "active+clean"}],
                    "osd_stats": [{"osd": 0, "kb": 100, "kb_used": 10,
                                   "fs_perf_stat": {"apply_latency_ms": 1, "commit_latency_ms": 2}}]
                })),
            )
            .with(
                Query::PoolStats,
                Reply::Json(json!([
                    {"pool_name": "rbd", "pool_id": 1, "client_io_rate": {"read_bytes_sec": 512}}
                ])),
            )
            .with(
                Query::Df,
                Reply::Json(json!({
                    "stats": {"total_bytes": 3000, "total_used_bytes": 1000, "total_avail_bytes": 2000},
                    "pools": [{"name": "rbd", "id": 1, "stats": {"bytes_used": 1000, "kb_used": 1, "objects": 5}}]
                })),
            )
    }

    pub(crate) fn calls(&self) -> Vec<Query> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StatusSource for FakeSource {
    async fn fetch(&self, query: Query) -> CollectResult<Value> {
        self.calls.lock().push(query);
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.reply(query))
                .await
                .unwrap_or_else(|_| {
                    Err(CollectError::tool(
                        format!("ceph {query}"),
                        CollectError::timed_out(timeout),
                    ))
                }),
            None => self.reply(query).await,
        }
    }
}

impl FakeSource {
    async fn reply(&self, query: Query) -> CollectResult<Value> {
        match self.replies.get(&query) {
            Some(Reply::Json(v)) => Ok(v.clone()),
            Some(Reply::Delayed(delay, v)) => {
                tokio::time::sleep(*delay).await;
                Ok(v.clone())
            }
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::HttpFailure) => Err(CollectError::http(
                format!("http://fake/api/v0.1/{}", query.rest_path()),
                "status 500 Internal Server Error",
            )),
            Some(Reply::ToolFailure) | None => {
                Err(CollectError::tool(format!("ceph {query}"), "exit status: 1"))
            }
        }
    }
}
