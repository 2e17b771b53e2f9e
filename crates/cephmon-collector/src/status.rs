//! Normalization of raw status documents into typed, version-independent
//! views.
//!
//! Top-level lists are required: their absence fails the poll. Fields inside
//! individual records are lenient and fall back to zero or empty.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{CollectError, CollectResult};
use crate::facet::{Facet, Query};

/// Raw documents fetched for one facet, keyed by the query that produced
/// them.
#[derive(Debug, Clone)]
pub struct RawStatus {
    facet: Facet,
    documents: Vec<(Query, Value)>,
}

impl RawStatus {
    /// Create an empty status for `facet`.
    pub fn new(facet: Facet) -> Self {
        Self {
            facet,
            documents: Vec::with_capacity(facet.queries().len()),
        }
    }

    pub fn facet(&self) -> Facet {
        self.facet
    }

    /// Store the document answered for `query`.
    pub fn push(&mut self, query: Query, document: Value) {
        self.documents.push((query, document));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, query: Query, document: Value) -> Self {
        self.push(query, document);
        self
    }

    /// Return the document for `query`; a query never fetched reads as an empty payload.
    pub fn document(&self, query: Query) -> CollectResult<&Value> {
        self.documents
            .iter()
            .find(|(q, _)| *q == query)
            .map(|(_, doc)| doc)
            .ok_or(CollectError::EmptyPayload { query })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedStatus {
    Mon(MonStatus),
    Osd(OsdStatus),
    Pg(PgStatus),
    Pool(PoolStatus),
}

impl NormalizedStatus {
    pub fn facet(&self) -> Facet {
        match self {
            NormalizedStatus::Mon(_) => Facet::Mon,
            NormalizedStatus::Osd(_) => Facet::Osd,
            NormalizedStatus::Pg(_) => Facet::Pg,
            NormalizedStatus::Pool(_) => Facet::Pool,
        }
    }
}

// ---------------------------------------------------------------------------
// Monitors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MonStatus {
    pub mons: Vec<MonRecord>,
    /// Ranks of the monitors currently in quorum.
    pub quorum: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MonRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rank: f64,
}

// ---------------------------------------------------------------------------
// OSD map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OsdStatus {
    pub pools: Vec<OsdPoolRecord>,
    pub osds: Vec<OsdRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OsdPoolRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub pool_name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub size: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pg_num: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pg_placement_num: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OsdRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub osd: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub up: bool,
    #[serde(rename = "in", default, deserialize_with = "lenient::flag")]
    pub is_in: bool,
}

// ---------------------------------------------------------------------------
// Placement groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PgStatus {
    pub pg_stats: Vec<PgRecord>,
    pub osd_stats: Vec<OsdPerfRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PgRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub pgid: String,
    /// Composite state such as `active+clean+scrubbing`.
    #[serde(default, deserialize_with = "lenient::string")]
    pub state: String,
}

impl PgRecord {
    /// Individual state flags; empty segments are skipped.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.state.split('+').filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OsdPerfRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub osd: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub kb: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub kb_used: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub num_snap_trimming: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub snap_trim_queue_len: f64,
    #[serde(default, deserialize_with = "lenient::record")]
    fs_perf_stat: Option<PerfStat>,
    #[serde(default, deserialize_with = "lenient::record")]
    perf_stat: Option<PerfStat>,
}

impl OsdPerfRecord {
    /// Commit latencies, from `fs_perf_stat` on older releases and
    /// `perf_stat` on newer ones.
    pub fn perf(&self) -> PerfStat {
        self.fs_perf_stat
            .or(self.perf_stat)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct PerfStat {
    #[serde(default, deserialize_with = "lenient::number")]
    pub apply_latency_ms: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub commit_latency_ms: f64,
}

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PoolStatus {
    /// `osd pool stats`: client I/O rates.
    pub rates: Vec<PoolRateRecord>,
    /// `df`: per-pool usage.
    pub usage: Vec<PoolUsageRecord>,
    pub capacity: Capacity,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PoolRateRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub pool_name: String,
    #[serde(default, deserialize_with = "lenient::record")]
    client_io_rate: Option<IoRate>,
}

impl PoolRateRecord {
    /// Return the client I/O rates, zero when absent.
    pub fn io_rate(&self) -> IoRate {
        self.client_io_rate.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct IoRate {
    #[serde(default, deserialize_with = "lenient::number")]
    pub read_bytes_sec: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub write_bytes_sec: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub op_per_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PoolUsageRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::record")]
    stats: Option<PoolUsage>,
}

impl PoolUsageRecord {
    /// Return the usage stats, zero when absent.
    pub fn usage(&self) -> PoolUsage {
        self.stats.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct PoolUsage {
    #[serde(default, deserialize_with = "lenient::number")]
    pub bytes_used: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub kb_used: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub objects: f64,
}

/// Raw cluster capacity, always in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capacity {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub avail_bytes: u64,
}

impl Capacity {
    /// Resolve either the byte-denominated fields (`total_bytes`, ...) or the
    /// older kilobyte fields (`total_space`, ...), chosen by presence.
    pub fn from_df_stats(stats: &Map<String, Value>) -> Option<Self> {
        let field = |key: &str| stats.get(key).map(lenient::to_u64).unwrap_or(0);

        if stats.contains_key("total_bytes") {
            Some(Capacity {
                total_bytes: field("total_bytes"),
                used_bytes: field("total_used_bytes"),
                avail_bytes: field("total_avail_bytes"),
            })
        } else if stats.contains_key("total_space") {
            Some(Capacity {
                total_bytes: field("total_space").saturating_mul(1024),
                used_bytes: field("total_used").saturating_mul(1024),
                avail_bytes: field("total_avail").saturating_mul(1024),
            })
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Validate a raw status and parse it into typed records.
pub fn normalize(raw: &RawStatus) -> CollectResult<NormalizedStatus> {
    for &query in raw.facet().queries() {
        ensure_present(query, raw.document(query)?)?;
    }

    match raw.facet() {
        Facet::Mon => {
            let doc = raw.document(Query::MonDump)?;
            Ok(NormalizedStatus::Mon(MonStatus {
                mons: required_list(Query::MonDump, doc, "mons")?,
                quorum: required_list(Query::MonDump, doc, "quorum")?,
            }))
        }
        Facet::Osd => {
            let doc = raw.document(Query::OsdDump)?;
            Ok(NormalizedStatus::Osd(OsdStatus {
                pools: required_list(Query::OsdDump, doc, "pools")?,
                osds: required_list(Query::OsdDump, doc, "osds")?,
            }))
        }
        Facet::Pg => {
            let doc = raw.document(Query::PgDump)?;
            // Newer releases wrap the dump in `pg_map`.
            let doc = doc.get("pg_map").filter(|v| v.is_object()).unwrap_or(doc);
            Ok(NormalizedStatus::Pg(PgStatus {
                pg_stats: required_list(Query::PgDump, doc, "pg_stats")?,
                osd_stats: required_list(Query::PgDump, doc, "osd_stats")?,
            }))
        }
        Facet::Pool => {
            let rates = raw.document(Query::PoolStats)?;
            if !rates.is_array() {
                return Err(CollectError::schema(Query::PoolStats, "expected a list of pools"));
            }
            let rates = Vec::<PoolRateRecord>::deserialize(rates)
                .map_err(|e| CollectError::schema(Query::PoolStats, e.to_string()))?;

            let df = raw.document(Query::Df)?;
            let stats = df
                .get("stats")
                .and_then(Value::as_object)
                .ok_or_else(|| CollectError::schema(Query::Df, "missing `stats` object"))?;
            let capacity = Capacity::from_df_stats(stats).ok_or_else(|| {
                CollectError::schema(Query::Df, "`stats` has neither `total_bytes` nor `total_space`")
            })?;

            Ok(NormalizedStatus::Pool(PoolStatus {
                rates,
                usage: required_list(Query::Df, df, "pools")?,
                capacity,
            }))
        }
    }
}

fn ensure_present(query: Query, doc: &Value) -> CollectResult<()> {
    match doc {
        Value::Null => Err(CollectError::EmptyPayload { query }),
        Value::Object(map) if map.is_empty() => Err(CollectError::EmptyPayload { query }),
        _ => Ok(()),
    }
}

fn required_list<T: DeserializeOwned>(query: Query, doc: &Value, key: &str) -> CollectResult<Vec<T>> {
    let list = doc
        .get(key)
        .ok_or_else(|| CollectError::schema(query, format!("missing `{key}` list")))?;
    if !list.is_array() {
        return Err(CollectError::schema(query, format!("`{key}` is not a list")));
    }
    Vec::<T>::deserialize(list)
        .map_err(|e| CollectError::schema(query, format!("bad `{key}` entry: {e}")))
}

/// Field deserializers that never fail on odd values.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// A nested stat record; anything that is not an object reads as absent.
    pub fn record<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            value @ Value::Object(_) => T::deserialize(value).ok(),
            _ => None,
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(to_f64(&Value::deserialize(d)?))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
    }

    /// Set only for `1` or `true`.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            other => to_f64(&other) == 1.0,
        })
    }

    pub fn to_f64(value: &Value) -> f64 {
        match value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            Value::Bool(b) => f64::from(u8::from(*b)),
            _ => 0.0,
        }
    }

    pub fn to_u64(value: &Value) -> u64 {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
                .unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}
