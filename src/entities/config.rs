use std::{fmt, fs, path::Path, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_REGION: &str = "cn-zhangjiakou";
pub const DEFAULT_CONTAINER_GROUP_NAME: &str = "test";
// vCPU x4, Memory 15G, NVIDIA T4 GPU x1
pub const DEFAULT_INSTANCE_TYPE: &str = "ecs.gn6i-c4g1.xlarge";
pub const DEFAULT_CPU: u64 = 4;
pub const DEFAULT_MEMORY: u64 = 15;
pub const DEFAULT_GPU: u64 = 1;

static REGION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,}-[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

#[derive(Clone, Copy)]
enum Fallback {
    Unset,
    Str(&'static str),
    Int(u64),
}

impl Fallback {
    fn value(self) -> Value {
        match self {
            Self::Unset => Value::Null,
            Self::Str(s) => Value::from(s),
            Self::Int(n) => Value::from(n),
        }
    }
}

struct Field {
    name: &'static str,
    required: bool,
    fallback: Fallback,
}

const fn required(name: &'static str, fallback: Fallback) -> Field {
    Field {
        name,
        required: true,
        fallback,
    }
}

const fn optional(name: &'static str, fallback: Fallback) -> Field {
    Field {
        name,
        required: false,
        fallback,
    }
}

/// Every key a config document may carry, in validation order.
const SCHEMA: &[Field] = &[
    required("access_key_id", Fallback::Unset),
    required("access_secret", Fallback::Unset),
    required("region", Fallback::Str(DEFAULT_REGION)),
    required(
        "container_group_name",
        Fallback::Str(DEFAULT_CONTAINER_GROUP_NAME),
    ),
    required("instance_type", Fallback::Str(DEFAULT_INSTANCE_TYPE)),
    required("cpu", Fallback::Int(DEFAULT_CPU)),
    required("memory", Fallback::Int(DEFAULT_MEMORY)),
    required("gpu", Fallback::Int(DEFAULT_GPU)),
    required("container", Fallback::Unset),
    required("image", Fallback::Unset),
    optional("volume_name", Fallback::Unset),
    optional("volume_mount_path", Fallback::Unset),
    optional("v_switch_id", Fallback::Unset),
    optional("security_group_id", Fallback::Unset),
    optional("nfs_server", Fallback::Unset),
    optional("command", Fallback::Unset),
    optional("spot_strategy", Fallback::Str("NoSpot")),
];

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SpotStrategy {
    #[default]
    NoSpot,
    SpotAsPriceGo,
}

/// Configuration of a single-container ECI group running on a GPU instance.
#[derive(Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub access_key_id: String,
    pub access_secret: String,
    pub region: String,
    pub container_group_name: String,
    pub instance_type: String,
    pub cpu: f64,
    pub memory: f64,
    pub gpu: u32,
    pub container: String,
    pub image: String,
    pub volume_name: Option<String>,
    pub volume_mount_path: Option<String>,
    pub v_switch_id: Option<String>,
    pub security_group_id: Option<String>,
    pub nfs_server: Option<String>,
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub spot_strategy: SpotStrategy,
}

/// The NFS mount described by the three volume keys.
#[derive(Debug, PartialEq)]
pub struct NfsMount<'a> {
    pub name: &'a str,
    pub mount_path: &'a str,
    pub server: &'a str,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading config");
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(s)? {
            Value::Object(document) => Self::from_document(document),
            _ => Err(Error::NotAnObject),
        }
    }

    fn from_document(mut document: Map<String, Value>) -> Result<Self> {
        if let Some(key) = document
            .keys()
            .find(|key| !SCHEMA.iter().any(|field| field.name == key.as_str()))
        {
            return Err(Error::UnknownKey(key.to_owned()));
        }
        let mut resolved = Map::new();
        for field in SCHEMA {
            let value = document
                .remove(field.name)
                .unwrap_or_else(|| field.fallback.value());
            if value.is_null() {
                if field.required {
                    return Err(Error::MissingRequiredField(field.name));
                }
                continue;
            }
            resolved.insert(field.name.to_owned(), value);
        }
        let config: Self = serde_json::from_value(Value::Object(resolved))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !REGION_PATTERN.is_match(&self.region) {
            return Err(Error::InvalidField {
                field: "region",
                reason: format!("'{}' is not a region id", self.region),
            });
        }
        for (field, value) in [("cpu", self.cpu), ("memory", self.memory)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidField {
                    field,
                    reason: format!("{} is not a positive number", value),
                });
            }
        }
        let volume = [
            ("volume_name", self.volume_name.is_some()),
            ("volume_mount_path", self.volume_mount_path.is_some()),
            ("nfs_server", self.nfs_server.is_some()),
        ];
        if volume.iter().any(|(_, set)| *set) {
            let missing = volume
                .iter()
                .filter(|(_, set)| !set)
                .map(|(name, _)| *name)
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                return Err(Error::PartialVolume { missing });
            }
        }
        Ok(())
    }

    pub fn volume(&self) -> Option<NfsMount<'_>> {
        match (&self.volume_name, &self.volume_mount_path, &self.nfs_server) {
            (Some(name), Some(mount_path), Some(server)) => Some(NfsMount {
                name,
                mount_path,
                server,
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("container_group_name", &self.container_group_name)
            .field("instance_type", &self.instance_type)
            .field("cpu", &self.cpu)
            .field("memory", &self.memory)
            .field("gpu", &self.gpu)
            .field("container", &self.container)
            .field("image", &self.image)
            .field("volume", &self.volume())
            .field("v_switch_id", &self.v_switch_id)
            .field("security_group_id", &self.security_group_id)
            .field("command", &self.command)
            .field("spot_strategy", &self.spot_strategy)
            .finish_non_exhaustive()
    }
}
