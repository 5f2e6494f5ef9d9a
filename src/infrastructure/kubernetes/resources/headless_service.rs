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
use crate::infrastructure::constants::*;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// Headless service giving every Redis pod a stable DNS name.
pub struct HeadlessServiceBuilder<'a> {
    config: &'a KubernetesConfig,
}

impl<'a> HeadlessServiceBuilder<'a> {
    pub fn new(config: &'a KubernetesConfig) -> Self {
        Self { config }
    }

    pub fn build(&self) -> Service {
        let port = i32::from(self.config.redis_port);

        Service {
            metadata: ObjectMeta {
                name: Some(self.config.headless_service_name()),
                namespace: Some(self.config.namespace.clone()),
                labels: Some(self.get_labels()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("None".to_string()),
                type_: Some("ClusterIP".to_string()),
                ports: Some(vec![ServicePort {
                    name: Some(PORT_NAME_REDIS.to_string()),
                    port,
                    target_port: Some(IntOrString::Int(port)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                selector: Some(self.config.selector_labels()),
                // slaves must resolve a master before it reports ready
                publish_not_ready_addresses: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn get_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.config.selector_labels();
        labels.insert(LABEL_TYPE.to_string(), LABEL_TYPE_VALUE.to_string());
        labels.insert("service-type".to_string(), "headless".to_string());
        labels
    }
}
