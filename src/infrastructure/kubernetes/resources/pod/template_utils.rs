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

use crate::infrastructure::kubernetes::resources::pod::template::RedisPod;
use crate::shared::error::RedisKubeError;
use k8s_openapi::api::core::v1::Pod;
use std::path::PathBuf;

pub fn load_pod_from_template_file(
    file_path: &str,
    main_container_name: &str,
) -> Result<RedisPod, RedisKubeError> {
    let path = resolve_pod_template_path(file_path)?;

    if !path.exists() {
        return Err(RedisKubeError::ConfigError(format!(
            "Pod template file does not exist: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        RedisKubeError::ConfigError(format!(
            "Failed to read pod template file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_pod_template(&content, main_container_name).map_err(|e| match e {
        RedisKubeError::YamlParse(e) => RedisKubeError::ConfigError(format!(
            "Failed to parse pod template file {}: {}",
            path.display(),
            e
        )),
        other => other,
    })
}

pub fn parse_pod_template(
    content: &str,
    main_container_name: &str,
) -> Result<RedisPod, RedisKubeError> {
    let pod: Pod = serde_yaml::from_str(content)?;

    let Some(ref spec) = pod.spec else {
        return Err(RedisKubeError::ConfigError(
            "Pod template is missing spec section".to_string(),
        ));
    };

    let container_names: Vec<&str> = spec.containers.iter().map(|c| c.name.as_str()).collect();
    if !container_names.contains(&main_container_name) {
        return Err(RedisKubeError::ValidationError(format!(
            "\n Container name mismatch in Pod template\n\
            \n  Expected container name: '{}'\n\
            Found container names: {}\n\
            \n The Pod template must contain a container named '{}'.\n",
            main_container_name,
            container_names.join(", "),
            main_container_name,
        )));
    }

    Ok(RedisPod::new(pod, main_container_name))
}

pub fn resolve_pod_template_path(path: &str) -> Result<PathBuf, RedisKubeError> {
    let path = PathBuf::from(path);

    if path.is_absolute() {
        Ok(path)
    } else {
        std::env::current_dir()
            .map_err(|e| {
                RedisKubeError::ConfigError(format!("Cannot get current directory: {}", e))
            })?
            .join(path)
            .canonicalize()
            .map_err(|e| RedisKubeError::ConfigError(format!("Cannot resolve template path: {}", e)))
    }
}
