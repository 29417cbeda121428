//! Tile records and the merge that reconciles partial updates.
//!
//! The device service enumerates tiles incrementally: each progress batch
//! names only the attributes it knows or that changed, so the local
//! collection is built up by merging partial records over time. The merge is
//! a pure function and reports a no-op batch by returning the existing
//! collection borrowed, which is how downstream observers avoid reacting to
//! updates that changed nothing.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One physical panel's visible state, accumulated from stream updates.
///
/// Everything except `key` is optional: the stream reports attributes
/// incrementally, and a tile assembled from partial updates may not yet know
/// its serial, geometry, or coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Stable identity, unique within the collection, in the form
    /// `"serial:tile_index"`. Never reassigned.
    pub key: String,
    /// Owning device identifier (12 hex characters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    /// Position of this tile within its device's chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_index: Option<u32>,
    /// Panel width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Panel height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// User-assigned logical grid column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_x: Option<i32>,
    /// User-assigned logical grid row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_y: Option<i32>,
    /// `"#rrggbb"` color values, one per physical LED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels: Option<Vec<String>>,
}

/// A partial tile update naming only the fields known at merge time.
///
/// Absent fields must not overwrite known values; the stream omits `pixels`
/// entirely when a tile's colors did not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialTile {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels: Option<Vec<String>>,
}

impl PartialTile {
    /// An update naming only the key.
    pub fn new(key: impl Into<String>) -> Self {
        PartialTile {
            key: key.into(),
            serial: None,
            tile_index: None,
            width: None,
            height: None,
            user_x: None,
            user_y: None,
            pixels: None,
        }
    }
}

impl From<&PartialTile> for Tile {
    fn from(update: &PartialTile) -> Self {
        Tile {
            key: update.key.clone(),
            serial: update.serial.clone(),
            tile_index: update.tile_index,
            width: update.width,
            height: update.height,
            user_x: update.user_x,
            user_y: update.user_y,
            pixels: update.pixels.clone(),
        }
    }
}

impl Tile {
    /// Field-wise union with `update`, incoming fields taking priority.
    fn updated(&self, update: &PartialTile) -> Tile {
        Tile {
            key: self.key.clone(),
            serial: update.serial.clone().or_else(|| self.serial.clone()),
            tile_index: update.tile_index.or(self.tile_index),
            width: update.width.or(self.width),
            height: update.height.or(self.height),
            user_x: update.user_x.or(self.user_x),
            user_y: update.user_y.or(self.user_y),
            pixels: update.pixels.clone().or_else(|| self.pixels.clone()),
        }
    }
}

/// Reconcile a batch of partial updates against the known tile set.
///
/// The result contains one record per incoming update, in input order: the
/// field-wise union with the prior record for that key, or the prior record
/// unchanged when the update adds nothing. Tiles in `existing` that the
/// batch does not name are dropped: the merge only ever outputs tiles named
/// in the current batch.
///
/// When the computed result is identical to `existing`, the original slice
/// is returned borrowed so observers can skip reacting to no-op updates.
/// Duplicate keys within one batch each merge against the prior existing
/// record (not against earlier occurrences in the same batch) and every
/// occurrence is emitted.
pub fn merge<'a>(incoming: &[PartialTile], existing: &'a [Tile]) -> Cow<'a, [Tile]> {
    let by_key: HashMap<&str, &Tile> = existing.iter().map(|t| (t.key.as_str(), t)).collect();

    let mut merged = Vec::with_capacity(incoming.len());
    for update in incoming {
        match by_key.get(update.key.as_str()) {
            Some(prior) => merged.push(prior.updated(update)),
            None => merged.push(Tile::from(update)),
        }
    }

    if merged.as_slice() == existing {
        Cow::Borrowed(existing)
    } else {
        Cow::Owned(merged)
    }
}
