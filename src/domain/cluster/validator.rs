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

use crate::domain::config::KubernetesConfig;
use crate::domain::topology::DesiredTopology;
use crate::infrastructure::kubernetes::RedisKubeClient;
use crate::shared::error::{RedisKubeError, Result};

/// Checks run before any resource of a new cluster is created.
pub struct InstallValidator<'a> {
    client: &'a dyn RedisKubeClient,
}

impl<'a> InstallValidator<'a> {
    pub fn new(client: &'a dyn RedisKubeClient) -> Self {
        Self { client }
    }

    pub async fn validate(
        &self,
        desired: &DesiredTopology,
        kube_config: &KubernetesConfig,
    ) -> Result<()> {
        desired.validate()?;
        kube_config.validate()?;

        if let Some(class) = kube_config
            .storage
            .as_ref()
            .and_then(|s| s.storage_class.as_deref())
        {
            self.validate_storage_class(class).await?;
        }

        Ok(())
    }

    async fn validate_storage_class(&self, storage_class_name: &str) -> Result<()> {
        let available_classes = self.client.list_storage_classes().await?;
        if available_classes.iter().any(|c| c == storage_class_name) {
            return Ok(());
        }

        Err(RedisKubeError::ValidationError(format!(
            "\n StorageClass not found\n\
            \n  Requested: '{}'\n\
            \n Available StorageClasses:\n{}\n\
            \n Use one of the above StorageClasses or create a new one before installing.",
            storage_class_name,
            if available_classes.is_empty() {
                "  (none found)".to_string()
            } else {
                available_classes
                    .iter()
                    .map(|s| format!("  - {}", s))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        )))
    }
}
