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

/// Environment variable naming the configuration file
pub const CONF_FILE_ENV: &str = "REDIS_KUBE_CONF_FILE";

/// Defaults
pub const DEFAULT_CLUSTER_ID: &str = "sts-redis-cluster";
pub const DEFAULT_REDIS_IMAGE: &str = "docker.io/redis:7.2";
pub const POD_CLUSTER_DOMAIN: &str = "cluster.local";

/// Redis server
pub const REDIS_PORT: u16 = 6379;
pub const REDIS_DATA_DIR: &str = "/data";
pub const REDIS_CONF_DIR: &str = "/etc/redis";
pub const REDIS_CONF_FILE: &str = "/etc/redis/redis.conf";

/// Health check configuration
pub const LIVENESS_INITIAL_DELAY: i32 = 15;
pub const LIVENESS_PERIOD: i32 = 20;
pub const LIVENESS_TIMEOUT: i32 = 5;
pub const LIVENESS_FAILURE_THRESHOLD: i32 = 5;
pub const READINESS_PERIOD: i32 = 10;

/// Graceful shutdown
pub const TERMINATION_GRACE_PERIOD: i64 = 30;

/// Default resource settings
pub const DEFAULT_STORAGE_SIZE: &str = "1Gi";
pub const DEFAULT_ACCESS_MODE: &str = "ReadWriteOnce";

/// Resource labels
pub const LABEL_APP: &str = "app";
pub const LABEL_COMPONENT: &str = "component";
pub const LABEL_TYPE: &str = "type";
pub const LABEL_TYPE_VALUE: &str = "redis-kube";
pub const COMPONENT_REDIS: &str = "redis";

/// Annotation holding the slave fan-out the cluster was installed with
pub const ANNOTATION_SLAVES_PER_MASTER: &str = "redis-kube/slaves-per-master";

/// Server-side apply field manager
pub const FIELD_MANAGER: &str = "redis-kube";

/// Container names
pub const CONTAINER_NAME_REDIS: &str = "redis";

/// Service and ConfigMap suffixes
pub const SERVICE_SUFFIX_HEADLESS: &str = "-headless";
pub const SERVICE_SUFFIX_CONFIG: &str = "-config";

/// Volume and VolumeMount names
pub const VOLUME_NAME_CONFIG: &str = "redis-conf";
pub const VOLUME_NAME_DATA: &str = "data";

/// ConfigMap configuration
pub const CONFIG_FILE_NAME: &str = "redis.conf";
pub const CONFIG_FILE_MODE: i32 = 0o644;

/// Port names
pub const PORT_NAME_REDIS: &str = "redis";

/// StatefulSet pod management policy
pub const POD_MANAGEMENT_POLICY_PARALLEL: &str = "Parallel";
