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

use crate::domain::config::ProbeConf;
use crate::domain::topology::NodeRole;
use crate::infrastructure::redis::connection::RespConnection;
use crate::shared::error::{RedisKubeError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// What a node reports about its own replication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub role: NodeRole,
    /// `host:port` of the master a slave follows.
    pub master_address: Option<String>,
    pub offset: u64,
}

impl RoleInfo {
    pub fn master(offset: u64) -> Self {
        Self {
            role: NodeRole::Master,
            master_address: None,
            offset,
        }
    }

    pub fn slave(master_address: impl Into<String>, offset: u64) -> Self {
        Self {
            role: NodeRole::Slave,
            master_address: Some(master_address.into()),
            offset,
        }
    }
}

#[async_trait::async_trait]
pub trait NodeRoleProbe: Send + Sync {
    /// Queries the node listening on `address` (`ip:port`).
    async fn get_role(&self, address: &str) -> Result<RoleInfo>;
}

/// Probes nodes with `INFO replication` over RESP.
#[derive(Debug, Clone)]
pub struct RespRoleProbe {
    connect_timeout: Duration,
    io_timeout: Duration,
    password: Option<String>,
}

impl RespRoleProbe {
    pub fn new(conf: &ProbeConf) -> Self {
        Self {
            connect_timeout: conf.connect_timeout(),
            io_timeout: conf.io_timeout(),
            password: conf.password.clone(),
        }
    }

    pub(crate) async fn open(&self, address: &str) -> Result<RespConnection> {
        let mut conn =
            RespConnection::connect(address, self.connect_timeout, self.io_timeout).await?;
        if let Some(ref password) = self.password {
            conn.auth(password).await?;
        }
        Ok(conn)
    }
}

#[async_trait::async_trait]
impl NodeRoleProbe for RespRoleProbe {
    async fn get_role(&self, address: &str) -> Result<RoleInfo> {
        let mut conn = self.open(address).await?;
        let info = conn
            .command(&["INFO", "replication"])
            .await?
            .into_text()?;

        let role = parse_replication_info(&info)?;
        tracing::debug!(%address, role = %role.role, offset = role.offset, "probed node");
        Ok(role)
    }
}

/// Parses the `# Replication` section of `INFO`.
pub fn parse_replication_info(info: &str) -> Result<RoleInfo> {
    let fields: HashMap<&str, &str> = info
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .collect();

    let offset = |key: &str| -> u64 {
        fields
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    };

    match fields.get("role").copied() {
        Some("master") => Ok(RoleInfo::master(offset("master_repl_offset"))),
        Some("slave") | Some("replica") => {
            let host = fields.get("master_host").copied().ok_or_else(|| {
                RedisKubeError::Protocol("slave reports no master_host".to_string())
            })?;
            let port = fields.get("master_port").copied().unwrap_or("6379");
            Ok(RoleInfo::slave(
                format!("{}:{}", host, port),
                offset("slave_repl_offset"),
            ))
        }
        Some(other) => Err(RedisKubeError::Protocol(format!(
            "unknown replication role '{}'",
            other
        ))),
        None => Err(RedisKubeError::Protocol(
            "INFO replication has no role field".to_string(),
        )),
    }
}
