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

use crate::domain::topology::ReconcileAction;
use thiserror::Error;
pub type Result<T> = std::result::Result<T, RedisKubeError>;

#[derive(Error, Debug)]
pub enum RedisKubeError {
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Cluster inspection failed: {0}")]
    InspectionError(String),

    #[error("Failed to execute {action}: {message}")]
    DriverExecutionError {
        action: ReconcileAction,
        message: String,
    },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Kubernetes API error: {0}")]
    KubeApi(String),

    #[error("Redis protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {resource_type} '{name}' in namespace '{namespace}'")]
    NotFound {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("Resource already exists: {resource_type} '{name}' in namespace '{namespace}'")]
    AlreadyExists {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for RedisKubeError {
    fn from(err: kube::Error) -> Self {
        RedisKubeError::KubeApi(err.to_string())
    }
}

impl RedisKubeError {
    pub fn invalid_topology(context: impl Into<String>) -> Self {
        Self::InvalidTopology(context.into())
    }

    pub fn inspection(context: impl Into<String>) -> Self {
        Self::InspectionError(context.into())
    }

    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn driver(action: ReconcileAction, message: impl Into<String>) -> Self {
        Self::DriverExecutionError {
            action,
            message: message.into(),
        }
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn already_exists(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Whether the caller may retry the same operation after a backoff.
    ///
    /// Bad input and driver failures are not retried blindly: the former never
    /// succeeds, the latter is re-derived from a fresh snapshot on the next cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InspectionError(_) | Self::Timeout(_))
    }
}
