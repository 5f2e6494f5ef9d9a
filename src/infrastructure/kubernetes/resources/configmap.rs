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

use crate::domain::config::{KubernetesConfig, RedisServerConf};
use crate::infrastructure::constants::*;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Builds the ConfigMap holding the `redis.conf` every pod mounts.
pub struct ConfigMapBuilder<'a> {
    config: &'a KubernetesConfig,
    server_conf: &'a RedisServerConf,
    password: Option<&'a str>,
}

impl<'a> ConfigMapBuilder<'a> {
    pub fn new(config: &'a KubernetesConfig, server_conf: &'a RedisServerConf) -> Self {
        Self {
            config,
            server_conf,
            password: None,
        }
    }

    pub fn with_password(mut self, password: Option<&'a str>) -> Self {
        self.password = password;
        self
    }

    pub fn build(&self) -> ConfigMap {
        let mut data = BTreeMap::new();
        data.insert(
            CONFIG_FILE_NAME.to_string(),
            self.server_conf
                .render(self.config.redis_port, self.password),
        );

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.config.configmap_name()),
                namespace: Some(self.config.namespace.clone()),
                labels: Some(self.get_labels()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn get_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_APP.to_string(), self.config.cluster_id.clone());
        labels.insert(LABEL_COMPONENT.to_string(), "config".to_string());
        labels.insert(LABEL_TYPE.to_string(), LABEL_TYPE_VALUE.to_string());
        labels
    }
}
