//! # Entity Identifiers
//!
//! Identifiers take the form `<kind>:<token>`. The kind prefix is checked every time
//! an identifier is parsed, so a wave id can never be handed to a cluster lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{ids::MAX_ENTITY_ID_LENGTH, kinds};
use crate::error::{ReleaseError, Result};

/// The five levels of the rollout hierarchy, root to leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Release,
    Wave,
    Cluster,
    Bundle,
    App,
}

impl EntityKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Release => kinds::RELEASE,
            Self::Wave => kinds::WAVE,
            Self::Cluster => kinds::CLUSTER,
            Self::Bundle => kinds::BUNDLE,
            Self::App => kinds::APP,
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            kinds::RELEASE => Some(Self::Release),
            kinds::WAVE => Some(Self::Wave),
            kinds::CLUSTER => Some(Self::Cluster),
            kinds::BUNDLE => Some(Self::Bundle),
            kinds::APP => Some(Self::App),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Validated `<kind>:<token>` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse any identifier, inferring the kind from its prefix
    pub fn parse(raw: &str) -> Result<Self> {
        let (prefix, token) = raw.split_once(':').ok_or_else(|| {
            ReleaseError::InvalidEntityId(format!("'{raw}' is missing a '<kind>:' prefix"))
        })?;
        if EntityKind::from_prefix(prefix).is_none() {
            return Err(ReleaseError::InvalidEntityId(format!(
                "'{raw}' has unknown kind '{prefix}'"
            )));
        }
        Self::validate_token(raw, token)?;
        Ok(Self(raw.to_string()))
    }

    /// Parse an identifier that must carry the given kind prefix
    pub fn parse_as(kind: EntityKind, raw: &str) -> Result<Self> {
        let id = Self::parse(raw)?;
        if id.kind() != kind {
            return Err(ReleaseError::InvalidEntityId(format!(
                "{} id must start with '{}:', got '{raw}'",
                kind,
                kind.prefix()
            )));
        }
        Ok(id)
    }

    /// Build an identifier from a kind and a bare token
    pub fn new(kind: EntityKind, token: &str) -> Result<Self> {
        Self::parse(&format!("{}:{token}", kind.prefix()))
    }

    fn validate_token(raw: &str, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(ReleaseError::InvalidEntityId(format!(
                "'{raw}' has an empty token"
            )));
        }
        if raw.len() > MAX_ENTITY_ID_LENGTH {
            return Err(ReleaseError::InvalidEntityId(format!(
                "id is too long ({} > {MAX_ENTITY_ID_LENGTH} characters)",
                raw.len()
            )));
        }
        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ReleaseError::InvalidEntityId(format!(
                "'{raw}' may only contain alphanumerics, dashes and underscores after the prefix"
            )));
        }
        Ok(())
    }

    pub fn kind(&self) -> EntityKind {
        // Constructors guarantee a known prefix
        let prefix = self.0.split(':').next().unwrap_or_default();
        EntityKind::from_prefix(prefix).unwrap_or(EntityKind::Release)
    }

    /// The part after `<kind>:`
    pub fn token(&self) -> &str {
        self.0.split_once(':').map(|(_, t)| t).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = ReleaseError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl std::str::FromStr for EntityId {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
