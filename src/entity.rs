//! Classification of raw lookup values into typed entities.

use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{Entity, EntityKind};

/// Custom type key for internal zonal DNS names.
pub const ZONAL_DNS_TYPE: &str = "zonalDns";

// <INSTANCE_NAME>.<ZONE>.c.<PROJECT_ID>.internal
const ZONAL_DNS_PATTERN: &str = r"^[a-z]([-a-z0-9]*[a-z0-9])?\.[a-z]([-a-z0-9]*[a-z0-9])?\.c\.[a-z]([-a-z0-9]*[a-z0-9])?\.internal$";

const DOMAIN_PATTERN: &str = r"(?i)^([a-z0-9]([-a-z0-9]*[a-z0-9])?\.)+[a-z]([-a-z0-9]*[a-z0-9])?$";

fn zonal_dns() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ZONAL_DNS_PATTERN).expect("zonal DNS pattern is valid"))
}

fn domain() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DOMAIN_PATTERN).expect("domain pattern is valid"))
}

/// Entity types a deployment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Ipv4,
    Ipv6,
    Domain,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    types: Vec<EntityType>,
    zonal_dns: bool,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(vec![EntityType::Ipv4, EntityType::Domain], true)
    }
}

impl Classifier {
    pub fn new(types: Vec<EntityType>, zonal_dns: bool) -> Self {
        Self { types, zonal_dns }
    }

    fn accepts(&self, ty: EntityType) -> bool {
        self.types.contains(&ty)
    }

    /// Returns `None` for values that are not an enabled entity type.
    pub fn classify(&self, value: &str) -> Option<Entity> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(ip) = value.parse::<IpAddr>() {
            return match ip {
                IpAddr::V4(_) if self.accepts(EntityType::Ipv4) => {
                    Some(Entity::new(value, EntityKind::Ipv4))
                }
                IpAddr::V6(_) if self.accepts(EntityType::Ipv6) => {
                    Some(Entity::new(value, EntityKind::Ipv6))
                }
                _ => None,
            };
        }

        if self.zonal_dns && zonal_dns().is_match(value) {
            return Some(Entity::new(
                value,
                EntityKind::Custom(ZONAL_DNS_TYPE.to_string()),
            ));
        }

        if self.accepts(EntityType::Domain) && domain().is_match(value) {
            return Some(Entity::new(value, EntityKind::Domain));
        }

        None
    }
}
