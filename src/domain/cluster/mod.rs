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

//! Cluster reconciliation, health tracking and lifecycle

pub mod health;
pub mod inspector;
pub mod manager;
pub mod reconciler;
pub mod validator;

pub use self::health::{evaluate, HealthMap, HealthMonitor, HealthTracker};
pub use self::inspector::ClusterInspector;
pub use self::manager::{removal_order, ClusterStatus, ConvergeReport, RedisClusterManager};
pub use self::reconciler::{plan, Reconciler};
pub use self::validator::InstallValidator;
