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

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};

/// A user supplied pod split into the Redis container and everything else.
#[derive(Debug, Clone)]
pub struct RedisPod {
    pod_without_main_container: Pod,
    main_container: Container,
}

impl RedisPod {
    pub fn new(pod: Pod, main_container_name: &str) -> Self {
        let mut pod_without_main = pod;
        let mut main_container = None;

        match pod_without_main.spec {
            Some(ref mut spec) => {
                let (main, others): (Vec<Container>, Vec<Container>) = spec
                    .containers
                    .drain(..)
                    .partition(|c| c.name == main_container_name);
                main_container = main.into_iter().next();
                spec.containers = others;
            }
            None => pod_without_main.spec = Some(PodSpec::default()),
        }

        let main = main_container.unwrap_or_else(|| Container {
            name: main_container_name.to_string(),
            ..Default::default()
        });

        Self {
            pod_without_main_container: pod_without_main,
            main_container: main,
        }
    }

    pub fn pod_without_main_container(&self) -> &Pod {
        &self.pod_without_main_container
    }

    pub fn main_container(&self) -> &Container {
        &self.main_container
    }

    pub fn into_parts(self) -> (Pod, Container) {
        (self.pod_without_main_container, self.main_container)
    }
}
