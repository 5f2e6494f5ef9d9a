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

//! Environment variables for the Redis container

use crate::domain::config::KubernetesConfig;
use crate::infrastructure::constants::REDIS_CONF_FILE;
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector};

pub struct EnvironmentBuilder<'a> {
    config: &'a KubernetesConfig,
}

impl<'a> EnvironmentBuilder<'a> {
    pub fn new(config: &'a KubernetesConfig) -> Self {
        Self { config }
    }

    pub fn build(self) -> Vec<EnvVar> {
        let mut env_vars = Vec::new();
        env_vars.extend(self.build_k8s_env_vars());
        env_vars.extend(self.build_redis_env_vars());
        env_vars
    }

    fn build_k8s_env_vars(&self) -> Vec<EnvVar> {
        vec![
            field_ref_var("POD_NAME", "metadata.name"),
            field_ref_var("POD_IP", "status.podIP"),
            field_ref_var("POD_NAMESPACE", "metadata.namespace"),
            value_var("POD_CLUSTER_DOMAIN", &self.config.cluster_domain),
        ]
    }

    fn build_redis_env_vars(&self) -> Vec<EnvVar> {
        vec![
            value_var("REDIS_PORT", &self.config.redis_port.to_string()),
            value_var("REDIS_CONF_FILE", REDIS_CONF_FILE),
            value_var("REDIS_HEADLESS_SERVICE", &self.config.headless_service_name()),
        ]
    }
}

fn value_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn field_ref_var(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
