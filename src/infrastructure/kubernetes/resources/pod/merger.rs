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
use crate::shared::error::{RedisKubeError, Result};
use k8s_openapi::api::core::v1::{Container, Pod, Volume, VolumeMount};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Merges the generated pod into an optional user template.
///
/// The template wins for anything it sets explicitly; generated volumes,
/// mounts, env vars and labels are added where the template has none.
pub fn merge_pod_with_template(
    template_pod: Option<RedisPod>,
    builder_pod: Pod,
    builder_volumes: Vec<Volume>,
    builder_mounts: Vec<VolumeMount>,
    builder_labels: BTreeMap<String, String>,
) -> Result<Pod> {
    match template_pod {
        Some(template) => merge_with_template_impl(
            template,
            builder_pod,
            builder_volumes,
            builder_mounts,
            builder_labels,
        ),
        None => Ok(apply_builder_to_pod(
            builder_pod,
            builder_volumes,
            builder_mounts,
        )),
    }
}

fn merge_with_template_impl(
    template: RedisPod,
    builder_pod: Pod,
    builder_volumes: Vec<Volume>,
    builder_mounts: Vec<VolumeMount>,
    builder_labels: BTreeMap<String, String>,
) -> Result<Pod> {
    let (mut final_pod, mut main) = template.into_parts();

    final_pod
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(builder_labels);

    let builder_spec = builder_pod.spec.unwrap_or_default();
    let builder_container = builder_spec.containers.into_iter().next().unwrap_or_default();

    let mut merged_mounts = main.volume_mounts.take().unwrap_or_default();
    validate_volume_mounts(&merged_mounts, &builder_mounts)?;

    let existing_mount_paths: HashSet<String> =
        merged_mounts.iter().map(|m| m.mount_path.clone()).collect();
    merged_mounts.extend(
        builder_mounts
            .into_iter()
            .filter(|m| !existing_mount_paths.contains(&m.mount_path)),
    );
    main.volume_mounts = Some(merged_mounts);

    merge_container(&mut main, builder_container);

    let spec = final_pod.spec.get_or_insert_with(Default::default);

    let mut merged_volumes = spec.volumes.take().unwrap_or_default();
    let existing_volume_names: HashSet<String> =
        merged_volumes.iter().map(|v| v.name.clone()).collect();
    merged_volumes.extend(
        builder_volumes
            .into_iter()
            .filter(|v| !existing_volume_names.contains(&v.name)),
    );
    spec.volumes = Some(merged_volumes);

    if spec.node_selector.is_none() {
        spec.node_selector = builder_spec.node_selector;
    }
    if spec.service_account_name.is_none() {
        spec.service_account_name = builder_spec.service_account_name;
    }
    if spec.image_pull_secrets.is_none() {
        spec.image_pull_secrets = builder_spec.image_pull_secrets;
    }
    if spec.termination_grace_period_seconds.is_none() {
        spec.termination_grace_period_seconds = builder_spec.termination_grace_period_seconds;
    }

    spec.containers.push(main);
    Ok(final_pod)
}

fn merge_container(main: &mut Container, generated: Container) {
    // generated env vars override template ones of the same name
    let mut merged_env = main.env.take().unwrap_or_default();
    for var in generated.env.unwrap_or_default() {
        match merged_env.iter_mut().find(|e| e.name == var.name) {
            Some(existing) => *existing = var,
            None => merged_env.push(var),
        }
    }
    main.env = Some(merged_env);

    if main.image.is_none() {
        main.image = generated.image;
    }
    if main.image_pull_policy.is_none() {
        main.image_pull_policy = generated.image_pull_policy;
    }
    if main.command.is_none() {
        main.command = generated.command;
    }
    if main.args.is_none() {
        main.args = generated.args;
    }
    if main.ports.is_none() {
        main.ports = generated.ports;
    }
    if main
        .resources
        .as_ref()
        .map_or(true, |r| r.requests.is_none() && r.limits.is_none())
    {
        main.resources = generated.resources;
    }
    if main.liveness_probe.is_none() {
        main.liveness_probe = generated.liveness_probe;
    }
    if main.readiness_probe.is_none() {
        main.readiness_probe = generated.readiness_probe;
    }
    if main.lifecycle.is_none() {
        main.lifecycle = generated.lifecycle;
    }
}

fn apply_builder_to_pod(mut pod: Pod, volumes: Vec<Volume>, mounts: Vec<VolumeMount>) -> Pod {
    if let Some(ref mut spec) = pod.spec {
        spec.volumes = Some(volumes);
        if let Some(container) = spec.containers.first_mut() {
            container.volume_mounts = Some(mounts);
        }
    }
    pod
}

fn validate_volume_mounts(
    user_mounts: &[VolumeMount],
    builder_mounts: &[VolumeMount],
) -> Result<()> {
    let builder_mount_map: HashMap<&str, &str> = builder_mounts
        .iter()
        .map(|m| (m.name.as_str(), m.mount_path.as_str()))
        .collect();

    for user_mount in user_mounts {
        if let Some(expected_path) = builder_mount_map.get(user_mount.name.as_str()) {
            if user_mount.mount_path != *expected_path {
                return Err(RedisKubeError::ValidationError(format!(
                    "\n Volume mount path mismatch in Pod template\n\
                    \n  Volume Name: '{}'\n\
                    Pod Template mountPath: '{}'\n\
                    Required mountPath: '{}'\n\
                    \n Redis reads its configuration and data from fixed paths.\n\
                    Update the Pod template:\n\
                    \n    volumeMounts:\n\
                    - name: {}\n\
                      mountPath: {}\n",
                    user_mount.name,
                    user_mount.mount_path,
                    expected_path,
                    user_mount.name,
                    expected_path,
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EnvVar, PodSpec};

    fn env(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn mount(name: &str, path: &str) -> VolumeMount {
        VolumeMount {
            name: name.to_string(),
            mount_path: path.to_string(),
            ..Default::default()
        }
    }

    fn builder_pod() -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "redis".to_string(),
                    image: Some("redis:7.2".to_string()),
                    env: Some(vec![env("REDIS_PORT", "6379")]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_without_template() {
        let pod = merge_pod_with_template(
            None,
            builder_pod(),
            vec![Volume {
                name: "redis-conf".to_string(),
                ..Default::default()
            }],
            vec![mount("redis-conf", "/etc/redis")],
            BTreeMap::new(),
        )
        .unwrap();

        let spec = pod.spec.unwrap();
        assert_eq!(spec.volumes.unwrap().len(), 1);
        assert_eq!(spec.containers[0].volume_mounts.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_template_values_win() {
        let template = RedisPod::new(
            Pod {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "redis".to_string(),
                        image: Some("redis:7.4".to_string()),
                        env: Some(vec![env("REDIS_PORT", "1"), env("TZ", "UTC")]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            "redis",
        );

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "cache".to_string());

        let pod = merge_pod_with_template(
            Some(template),
            builder_pod(),
            Vec::new(),
            vec![mount("data", "/data")],
            labels,
        )
        .unwrap();

        assert_eq!(pod.metadata.labels.unwrap()["app"], "cache");
        let container = &pod.spec.unwrap().containers[0];
        assert_eq!(container.image.as_deref(), Some("redis:7.4"));
        let env = container.env.as_ref().unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(
            env.iter().find(|e| e.name == "REDIS_PORT").unwrap().value.as_deref(),
            Some("6379")
        );
    }

    #[test]
    fn test_mount_path_mismatch() {
        let template = RedisPod::new(
            Pod {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "redis".to_string(),
                        volume_mounts: Some(vec![mount("data", "/var/lib/redis")]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            "redis",
        );

        let err = merge_pod_with_template(
            Some(template),
            builder_pod(),
            Vec::new(),
            vec![mount("data", "/data")],
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, RedisKubeError::ValidationError(_)));
    }
}
