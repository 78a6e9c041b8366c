use crate::entity::{Classifier, EntityType};
use crate::error::ValidationError;
use crate::integration::Options;
use crate::schedule::{self, DEFAULT_UPDATE_CRON};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Project whose instances are cached.  Falls back to the `project_id`
    /// of the service-account key when empty.
    pub project_id: String,
    pub update_cron: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_file: Option<PathBuf>,
    pub page_size: usize,
    pub log_level: String,
    pub entity_types: Vec<EntityType>,
    pub zonal_dns: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            update_cron: DEFAULT_UPDATE_CRON.into(),
            key_file: None,
            inventory_file: None,
            page_size: 500,
            log_level: "info".into(),
            entity_types: vec![EntityType::Ipv4, EntityType::Domain],
            zonal_dns: true,
        }
    }
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    project_id: String,
}

impl Config {
    /// Defaults, then `gce-lookup.toml`, `gce-lookup.json` and `GCE_LOOKUP_*`.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("gce-lookup.toml"))
            .merge(Json::file("gce-lookup.json"))
            .merge(Env::prefixed("GCE_LOOKUP_"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if config.project_id.trim().is_empty() {
            if let Some(ref key_file) = config.key_file {
                let raw = std::fs::read_to_string(key_file).map_err(|e| {
                    anyhow::anyhow!("Failed to read key file {}: {}", key_file.display(), e)
                })?;
                let key: ServiceAccountKey = serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Invalid key file: {}", e))?;
                config.project_id = key.project_id;
            }
        }

        Ok(config)
    }

    /// Field-level problems with this configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.project_id.trim().is_empty() {
            errors.push(ValidationError::new(
                "projectId",
                "a project id or a key file containing one is required",
            ));
        }
        if self.page_size == 0 {
            errors.push(ValidationError::new(
                "pageSize",
                "page size must be at least 1",
            ));
        }
        errors.extend(schedule::validate(&self.update_cron));
        errors
    }

    pub fn options(&self) -> Options {
        Options {
            update_cron: self.update_cron.clone(),
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.entity_types.clone(), self.zonal_dns)
    }
}
