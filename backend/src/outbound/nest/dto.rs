//! DTOs for decoding provider token and snapshot responses.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::domain::document_from_json;
use crate::domain::ports::{AccessGrant, TelemetrySnapshot};

#[derive(Debug, Deserialize)]
pub(super) struct AccessTokenDto {
    pub(super) access_token: String,
    #[serde(default)]
    pub(super) expires_in: i64,
}

impl From<AccessTokenDto> for AccessGrant {
    fn from(dto: AccessTokenDto) -> Self {
        Self {
            access_token: dto.access_token,
            expires_in: dto.expires_in,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DevicesDto {
    #[serde(default)]
    pub(super) thermostats: BTreeMap<String, Map<String, JsonValue>>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct MetadataDto {
    #[serde(default)]
    pub(super) user_id: String,
    #[serde(default)]
    pub(super) access_token: String,
}

/// Top-level API response; `structures` and unknown keys are ignored.
#[derive(Debug, Deserialize)]
pub(super) struct SnapshotDto {
    #[serde(default)]
    pub(super) devices: DevicesDto,
    #[serde(default)]
    pub(super) metadata: MetadataDto,
}

impl SnapshotDto {
    pub(super) fn into_domain(self) -> Result<TelemetrySnapshot, String> {
        if self.metadata.user_id.is_empty() {
            return Err("metadata is missing user_id".to_owned());
        }
        Ok(TelemetrySnapshot {
            user_id: self.metadata.user_id,
            access_token: self.metadata.access_token,
            thermostats: self
                .devices
                .thermostats
                .into_iter()
                .map(|(id, attributes)| (id, document_from_json(attributes)))
                .collect(),
        })
    }
}
