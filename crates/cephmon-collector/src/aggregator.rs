//! Per-facet aggregation of a normalized snapshot into a [`MetricTree`].
//!
//! Every function here is a pure function of its input: nothing is carried
//! between polls, so feeding the same snapshot twice yields identical trees.

use std::collections::BTreeSet;

use cephmon_monitor::MetricTree;

use crate::facet::ClusterIdentity;
use crate::status::{MonStatus, NormalizedStatus, OsdStatus, PgStatus, PoolStatus};

/// Turn a normalized status into the metric tree for its facet.
pub fn aggregate(identity: &ClusterIdentity, status: &NormalizedStatus) -> MetricTree {
    match status {
        NormalizedStatus::Mon(s) => aggregate_mon(identity, s),
        NormalizedStatus::Osd(s) => aggregate_osd(identity, s),
        NormalizedStatus::Pg(s) => aggregate_pg(identity, s),
        NormalizedStatus::Pool(s) => aggregate_pool(identity, s),
    }
}

/// `mon.number` and `mon.quorum`.
pub fn aggregate_mon(identity: &ClusterIdentity, status: &MonStatus) -> MetricTree {
    let mut tree = MetricTree::new(identity.name());
    tree.set("mon", "number", status.mons.len() as f64);
    tree.set("mon", "quorum", status.quorum.len() as f64);
    tree
}

/// Pool count and layout, plus OSD up/down and in/out.
///
/// up/down and in/out are two independent partitions of the same OSD list:
/// every OSD lands in exactly one side of each.
pub fn aggregate_osd(identity: &ClusterIdentity, status: &OsdStatus) -> MetricTree {
    let mut tree = MetricTree::new(identity.name());

    tree.set("pool", "number", status.pools.len() as f64);
    for pool in &status.pools {
        let category = format!("pool-{}", pool.pool_name);
        tree.set(&category, "size", pool.size);
        tree.set(&category, "pg_num", pool.pg_num);
        tree.set(&category, "pgp_num", pool.pg_placement_num);
    }

    for metric in ["up", "down", "in", "out"] {
        tree.set("osd", metric, 0.0);
    }
    for osd in &status.osds {
        tree.add("osd", if osd.up { "up" } else { "down" }, 1.0);
        tree.add("osd", if osd.is_in { "in" } else { "out" }, 1.0);
    }

    tree
}

/// One `pg.<state>` counter per state flag, plus per-OSD capacity and
/// latency records.
pub fn aggregate_pg(identity: &ClusterIdentity, status: &PgStatus) -> MetricTree {
    let mut tree = MetricTree::new(identity.name());

    // A pg in `active+clean` counts once towards each flag.
    tree.category_mut("pg");
    for pg in &status.pg_stats {
        for state in pg.states() {
            tree.add("pg", state, 1.0);
        }
    }

    for osd in &status.osd_stats {
        let category = format!("osd-{}", osd.osd);
        let perf = osd.perf();
        tree.set(&category, "kb_total", osd.kb);
        tree.set(&category, "kb_used", osd.kb_used);
        tree.set(&category, "num_snap_trimming", osd.num_snap_trimming);
        tree.set(&category, "snap_trim_queue_len", osd.snap_trim_queue_len);
        tree.set(&category, "apply_latency_ms", perf.apply_latency_ms);
        tree.set(&category, "commit_latency_ms", perf.commit_latency_ms);
    }

    tree
}

/// Client I/O rates and usage per pool, joined by pool name, plus cluster
/// capacity totals.
pub fn aggregate_pool(identity: &ClusterIdentity, status: &PoolStatus) -> MetricTree {
    let mut tree = MetricTree::new(identity.name());

    let names: BTreeSet<&str> = status
        .rates
        .iter()
        .map(|r| r.pool_name.as_str())
        .chain(status.usage.iter().map(|u| u.name.as_str()))
        .collect();
    for name in names {
        let category = format!("pool-{name}");
        for metric in [
            "read_bytes_sec",
            "write_bytes_sec",
            "op_per_sec",
            "bytes_used",
            "kb_used",
            "objects",
        ] {
            tree.set(&category, metric, 0.0);
        }
    }

    for record in &status.rates {
        let category = format!("pool-{}", record.pool_name);
        let rate = record.io_rate();
        tree.set(&category, "read_bytes_sec", rate.read_bytes_sec);
        tree.set(&category, "write_bytes_sec", rate.write_bytes_sec);
        tree.set(&category, "op_per_sec", rate.op_per_sec);
    }

    for record in &status.usage {
        let category = format!("pool-{}", record.name);
        let usage = record.usage();
        tree.set(&category, "bytes_used", usage.bytes_used);
        tree.set(&category, "kb_used", usage.kb_used);
        tree.set(&category, "objects", usage.objects);
    }

    let capacity = status.capacity;
    tree.set("cluster", "total_space", capacity.total_bytes as f64);
    tree.set("cluster", "total_used", capacity.used_bytes as f64);
    tree.set("cluster", "total_avail", capacity.avail_bytes as f64);

    tree
}
