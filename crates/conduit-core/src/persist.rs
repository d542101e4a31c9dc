//! Persistence of part sets.
//!
//! A container saves as one record per occupied side: the part type name,
//! the side name, and an opaque state blob encoded by the definition.
//! Loading is isolated per entry: an unknown type name (after consulting the
//! network's resolvers), an unrecognized side name, or an undecodable blob
//! drops that entry with a warning and never fails the container as a whole.

use crate::container::{PartContainer, PartEntry};
use crate::network::Network;
use crate::part::PartDefinition;
use crate::pos::Side;
use crate::registry::PartRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Errors produced by the part state blob codec.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("state encoding failed for part {part_type}: {reason}")]
    Encode { part_type: String, reason: String },
    #[error("state decoding failed: {0}")]
    Decode(String),
}

/// One persisted part: type tag, side tag, opaque state blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    pub part_type: String,
    pub side: String,
    pub state: Vec<u8>,
}

/// The persisted form of one container's occupied sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartSetRecord {
    pub parts: Vec<PartRecord>,
}

/// Serialize every occupied side of `container`.
///
/// A part whose state fails to encode is dropped from the save with a
/// warning; the remaining entries still persist.
pub fn write_parts(container: &PartContainer) -> PartSetRecord {
    let mut record = PartSetRecord::default();
    for (side, entry) in container.parts() {
        match entry.definition.write_state(&entry.state) {
            Ok(blob) => record.parts.push(PartRecord {
                part_type: entry.definition.name().to_string(),
                side: side.name().to_string(),
                state: blob,
            }),
            Err(error) => {
                tracing::warn!(
                    part = entry.definition.name(),
                    pos = %container.position(),
                    %error,
                    "part state could not be encoded and was dropped from the save"
                );
            }
        }
    }
    record
}

/// Resolve a persisted part type name: the registry first, then the
/// network's resolver list.
pub fn resolve_part_type(
    registry: &PartRegistry,
    network: Option<&Network>,
    name: &str,
) -> Option<Arc<dyn PartDefinition>> {
    registry
        .get(name)
        .or_else(|| network.and_then(|n| n.resolve_unknown_part(name)))
}

/// Rebuild the entries of `container` from a record.
///
/// Existing entries are replaced. Entry failures are isolated: each bad
/// entry is dropped with a warning and its siblings still load.
pub fn read_parts(
    record: &PartSetRecord,
    registry: &PartRegistry,
    network: Option<&Network>,
    container: &mut PartContainer,
) {
    let position = container.position();
    container.clear();
    for part in &record.parts {
        let Some(definition) = resolve_part_type(registry, network, &part.part_type) else {
            tracing::warn!(
                part = %part.part_type,
                pos = %position,
                "part was unknown and removed"
            );
            continue;
        };
        let Some(side) = Side::by_name(&part.side) else {
            tracing::warn!(
                part = %part.part_type,
                side = %part.side,
                pos = %position,
                "part was at an invalid side and removed"
            );
            continue;
        };
        match definition.read_state(&part.state) {
            Ok(state) => container.insert(side, PartEntry { definition, state }),
            Err(error) => {
                tracing::warn!(
                    part = %part.part_type,
                    pos = %position,
                    %error,
                    "part state was errored and the part removed"
                );
            }
        }
    }
}
