// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Periodic, debounced health tracking of every node in a cluster.

use crate::domain::cluster::inspector::ClusterInspector;
use crate::domain::config::HealthConf;
use crate::domain::topology::ClusterSnapshot;
use crate::shared::error::Result;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Node id to healthy flag.
pub type HealthMap = BTreeMap<String, bool>;

/// Result of probing every node of `snapshot` once.
///
/// A node passes when it answered the probe and, for a slave whose master
/// is part of the snapshot, trails that master by at most `lag_threshold` bytes.
pub fn evaluate(snapshot: &ClusterSnapshot, lag_threshold: u64) -> HealthMap {
    snapshot
        .nodes()
        .iter()
        .map(|node| {
            let within_lag = snapshot.master_of(node).map_or(true, |master| {
                master
                    .replication_offset
                    .saturating_sub(node.replication_offset)
                    <= lag_threshold
            });
            (node.id.clone(), node.healthy && within_lag)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct NodeHealth {
    healthy: bool,
    consecutive_failures: u32,
}

impl Default for NodeHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
        }
    }
}

/// Folds successive probe rounds into a stable health verdict.
///
/// A node turns unhealthy after `failure_threshold` consecutive failed
/// probes and healthy again after a single successful one.
#[derive(Debug)]
pub struct HealthTracker {
    failure_threshold: u32,
    nodes: BTreeMap<String, NodeHealth>,
}

impl HealthTracker {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            nodes: BTreeMap::new(),
        }
    }

    /// Records one probe round and returns the nodes whose verdict changed.
    pub fn record(&mut self, probes: &HealthMap) -> Vec<(String, bool)> {
        self.nodes.retain(|id, _| probes.contains_key(id));

        let mut transitions = Vec::new();
        for (id, &passed) in probes {
            let state = self.nodes.entry(id.clone()).or_default();

            if passed {
                state.consecutive_failures = 0;
                if !state.healthy {
                    state.healthy = true;
                    transitions.push((id.clone(), true));
                }
            } else {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.healthy && state.consecutive_failures >= self.failure_threshold {
                    state.healthy = false;
                    transitions.push((id.clone(), false));
                }
            }
        }
        transitions
    }

    pub fn health(&self) -> HealthMap {
        self.nodes
            .iter()
            .map(|(id, state)| (id.clone(), state.healthy))
            .collect()
    }
}

pub struct HealthMonitor {
    inspector: Arc<ClusterInspector>,
    conf: HealthConf,
    tracker: Mutex<HealthTracker>,
    paused: AtomicBool,
    health_tx: watch::Sender<HealthMap>,
}

impl HealthMonitor {
    pub fn new(inspector: Arc<ClusterInspector>, conf: HealthConf) -> Self {
        let (health_tx, _) = watch::channel(HealthMap::new());
        Self {
            inspector,
            tracker: Mutex::new(HealthTracker::new(conf.failure_threshold)),
            conf,
            paused: AtomicBool::new(false),
            health_tx,
        }
    }

    /// Probes the cluster once and updates the tracked health.
    ///
    /// When the cluster cannot be observed the tracked health is left as is.
    pub async fn tick(&self) -> Result<HealthMap> {
        let snapshot = self.inspector.observe().await?;
        let probes = evaluate(&snapshot, self.conf.lag_threshold);

        let mut tracker = self.tracker.lock().await;
        for (node, healthy) in tracker.record(&probes) {
            if healthy {
                info!(%node, "node recovered");
            } else {
                warn!(
                    %node,
                    failures = self.conf.failure_threshold,
                    "node is unhealthy"
                );
            }
        }

        let health = tracker.health();
        debug!(generation = snapshot.generation, ?health, "health updated");
        self.health_tx.send_replace(health.clone());
        Ok(health)
    }

    pub fn current_health(&self) -> HealthMap {
        self.health_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthMap> {
        self.health_tx.subscribe()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Ticks every `interval` until `cancel` fires. A tick in progress is
    /// allowed to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.conf.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if self.is_paused() {
                        continue;
                    }
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "health probe round failed, keeping previous state");
                    }
                }
            }
        }
        debug!("health monitor stopped");
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
