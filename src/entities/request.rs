use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    entities::config::{Config, SpotStrategy},
    error::{Error, Result},
};

pub const NFS_VOLUME_TYPE: &str = "NFSVolume";
pub const NFS_ROOT_PATH: &str = "/";

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum RestartPolicy {
    Never,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    pub cpu: f64,
    pub memory: f64,
    pub gpu: u32,
    pub volume_mounts: Vec<VolumeMount>,
    pub commands: Vec<String>,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct NfsVolume {
    pub server: String,
    pub path: String,
    pub read_only: bool,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "NFSVolume")]
    pub nfs_volume: NfsVolume,
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainerGroupRequest {
    pub region_id: String,
    pub container_group_name: String,
    pub restart_policy: RestartPolicy,
    pub instance_type: String,
    #[serde(rename = "VSwitchId", skip_serializing_if = "Option::is_none")]
    pub v_switch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    pub spot_strategy: SpotStrategy,
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
}

impl CreateContainerGroupRequest {
    pub fn build(config: &Config) -> Result<Self> {
        if config.container.trim().is_empty() || config.image.trim().is_empty() {
            return Err(Error::NullContainer);
        }
        let (volume_mounts, volumes) = match config.volume() {
            None => (vec![], vec![]),
            Some(mount) => (
                vec![VolumeMount {
                    name: mount.name.to_owned(),
                    mount_path: mount.mount_path.to_owned(),
                }],
                vec![Volume {
                    name: mount.name.to_owned(),
                    kind: NFS_VOLUME_TYPE.to_owned(),
                    nfs_volume: NfsVolume {
                        server: mount.server.to_owned(),
                        path: NFS_ROOT_PATH.to_owned(),
                        read_only: false,
                    },
                }],
            ),
        };
        Ok(Self {
            region_id: config.region.clone(),
            container_group_name: config.container_group_name.clone(),
            restart_policy: RestartPolicy::Never,
            instance_type: config.instance_type.clone(),
            v_switch_id: config.v_switch_id.clone(),
            security_group_id: config.security_group_id.clone(),
            spot_strategy: config.spot_strategy,
            // A group holds one container, which shares the group's name.
            containers: vec![Container {
                name: config.container_group_name.clone(),
                image: config.image.clone(),
                cpu: config.cpu,
                memory: config.memory,
                gpu: config.gpu,
                volume_mounts,
                commands: config.command.clone().unwrap_or_default(),
            }],
            volumes,
        })
    }

    /// Flattens the request into RPC query parameters, e.g. `Container.1.Image`.
    pub fn to_query(&self) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        let mut put = |key: String, value: String| {
            query.insert(key, value);
        };
        put("RegionId".to_owned(), self.region_id.clone());
        put(
            "ContainerGroupName".to_owned(),
            self.container_group_name.clone(),
        );
        put("RestartPolicy".to_owned(), format!("{:?}", self.restart_policy));
        put("InstanceType".to_owned(), self.instance_type.clone());
        if let Some(v_switch_id) = &self.v_switch_id {
            put("VSwitchId".to_owned(), v_switch_id.clone());
        }
        if let Some(security_group_id) = &self.security_group_id {
            put("SecurityGroupId".to_owned(), security_group_id.clone());
        }
        put("SpotStrategy".to_owned(), format!("{:?}", self.spot_strategy));
        for (i, container) in self.containers.iter().enumerate() {
            let prefix = format!("Container.{}", i + 1);
            put(format!("{}.Name", prefix), container.name.clone());
            put(format!("{}.Image", prefix), container.image.clone());
            put(format!("{}.Cpu", prefix), container.cpu.to_string());
            put(format!("{}.Memory", prefix), container.memory.to_string());
            put(format!("{}.Gpu", prefix), container.gpu.to_string());
            for (j, mount) in container.volume_mounts.iter().enumerate() {
                let prefix = format!("{}.VolumeMount.{}", prefix, j + 1);
                put(format!("{}.Name", prefix), mount.name.clone());
                put(format!("{}.MountPath", prefix), mount.mount_path.clone());
            }
            for (j, command) in container.commands.iter().enumerate() {
                put(format!("{}.Command.{}", prefix, j + 1), command.clone());
            }
        }
        for (i, volume) in self.volumes.iter().enumerate() {
            let prefix = format!("Volume.{}", i + 1);
            put(format!("{}.Name", prefix), volume.name.clone());
            put(format!("{}.Type", prefix), volume.kind.clone());
            put(
                format!("{}.NFSVolume.Server", prefix),
                volume.nfs_volume.server.clone(),
            );
            put(
                format!("{}.NFSVolume.Path", prefix),
                volume.nfs_volume.path.clone(),
            );
            put(
                format!("{}.NFSVolume.ReadOnly", prefix),
                volume.nfs_volume.read_only.to_string(),
            );
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::entities::config::tests::minimal;

    fn config_with(overrides: serde_json::Value) -> Config {
        let mut document = minimal();
        for (key, value) in overrides.as_object().unwrap() {
            document[key] = value.clone();
        }
        Config::from_json(&document.to_string()).unwrap()
    }

    fn with_volume() -> Config {
        config_with(json!({
            "container_group_name": "gmx-run",
            "volume_name": "data",
            "volume_mount_path": "/data",
            "nfs_server": "0a1b2c.cn-zhangjiakou.nas.aliyuncs.com",
        }))
    }

    #[test]
    fn test_build_without_volume() {
        let request = CreateContainerGroupRequest::build(&config_with(json!({}))).unwrap();
        assert_eq!(request.restart_policy, RestartPolicy::Never);
        assert_eq!(request.region_id, "cn-zhangjiakou");
        assert!(request.volumes.is_empty());
        assert_eq!(request.containers.len(), 1);
        assert!(request.containers[0].volume_mounts.is_empty());
        assert!(request.containers[0].commands.is_empty());
    }

    #[test]
    fn test_build_with_volume() {
        let request = CreateContainerGroupRequest::build(&with_volume()).unwrap();
        assert_eq!(
            request.containers[0].volume_mounts,
            vec![VolumeMount {
                name: "data".to_owned(),
                mount_path: "/data".to_owned(),
            }]
        );
        assert_eq!(request.volumes.len(), 1);
        let volume = &request.volumes[0];
        assert_eq!(volume.name, "data");
        assert_eq!(volume.kind, "NFSVolume");
        assert_eq!(
            volume.nfs_volume.server,
            "0a1b2c.cn-zhangjiakou.nas.aliyuncs.com"
        );
        assert_eq!(volume.nfs_volume.path, "/");
        assert!(!volume.nfs_volume.read_only);
    }

    #[test]
    fn test_container_shares_group_name() {
        for name in ["test", "gmx-run", "md-0001"] {
            let config = config_with(json!({ "container_group_name": name }));
            let request = CreateContainerGroupRequest::build(&config).unwrap();
            assert_eq!(request.container_group_name, name);
            assert_eq!(request.containers[0].name, name);
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let config = with_volume();
        let first = CreateContainerGroupRequest::build(&config).unwrap();
        let second = CreateContainerGroupRequest::build(&config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_query(), second.to_query());
    }

    #[test]
    fn test_null_container() {
        let mut config = config_with(json!({}));
        config.container = String::new();
        assert!(matches!(
            CreateContainerGroupRequest::build(&config),
            Err(Error::NullContainer)
        ));

        let config = config_with(json!({ "image": "  " }));
        assert!(matches!(
            CreateContainerGroupRequest::build(&config),
            Err(Error::NullContainer)
        ));
    }

    #[test]
    fn test_to_query() {
        let config = config_with(json!({
            "cpu": 2,
            "memory": 7.5,
            "v_switch_id": "vsw-8vb0example",
            "command": ["gmx", "mdrun"],
            "volume_name": "data",
            "volume_mount_path": "/data",
            "nfs_server": "nas.example.com",
        }));
        let query = CreateContainerGroupRequest::build(&config)
            .unwrap()
            .to_query();
        let expected = [
            ("RegionId", "cn-zhangjiakou"),
            ("ContainerGroupName", "test"),
            ("RestartPolicy", "Never"),
            ("InstanceType", "ecs.gn6i-c4g1.xlarge"),
            ("VSwitchId", "vsw-8vb0example"),
            ("SpotStrategy", "NoSpot"),
            ("Container.1.Name", "test"),
            (
                "Container.1.Image",
                "registry.cn-zhangjiakou.aliyuncs.com/hpc/gromacs:2023",
            ),
            ("Container.1.Cpu", "2"),
            ("Container.1.Memory", "7.5"),
            ("Container.1.Gpu", "1"),
            ("Container.1.VolumeMount.1.Name", "data"),
            ("Container.1.VolumeMount.1.MountPath", "/data"),
            ("Container.1.Command.1", "gmx"),
            ("Container.1.Command.2", "mdrun"),
            ("Volume.1.Name", "data"),
            ("Volume.1.Type", "NFSVolume"),
            ("Volume.1.NFSVolume.Server", "nas.example.com"),
            ("Volume.1.NFSVolume.Path", "/"),
            ("Volume.1.NFSVolume.ReadOnly", "false"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect::<BTreeMap<_, _>>();
        assert_eq!(query, expected);
    }

    #[test]
    fn test_serialize() {
        let request = CreateContainerGroupRequest::build(&with_volume()).unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["RestartPolicy"], "Never");
        assert_eq!(value["Containers"][0]["Name"], "gmx-run");
        assert_eq!(value["Volumes"][0]["NFSVolume"]["ReadOnly"], false);
        assert!(value.get("VSwitchId").is_none());
    }
}
