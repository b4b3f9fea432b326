use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{GroupSpan, GroupTileResolver, ResolvedTile, ResolverState};

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Order in which a worker walks its share of the flat tile space.
///
/// Both visit the same tiles for a given worker, only the cost of finding them differs.
pub enum Traversal {
    /// Worker `w` takes flat tiles `w, w + W, w + 2W, ...` and locates each one with a scan
    /// from the first group.
    GridStride,
    /// Same flat tiles, but the worker keeps the group it is in and only moves forward
    /// when its index leaves that group.
    Cursor,
}

impl Traversal {
    /// Traversal used when none is configured.
    pub fn default_for(quantized: bool) -> Self {
        match quantized {
            true => Traversal::Cursor,
            false => Traversal::GridStride,
        }
    }
}

impl FromStr for Traversal {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "grid-stride" => Ok(Traversal::GridStride),
            "cursor" => Ok(Traversal::Cursor),
            _ => Err(format!(
                "Unknown traversal '{value}', expected 'grid-stride' or 'cursor'"
            )),
        }
    }
}

/// Tiles of one worker, each located by a fresh scan.
pub struct GridStrideTiles<'a> {
    resolver: GroupTileResolver<'a>,
    next: u64,
    stride: u64,
}

impl<'a> GridStrideTiles<'a> {
    pub fn new(resolver: GroupTileResolver<'a>, worker: u32, num_workers: u32) -> Self {
        Self {
            resolver,
            next: worker as u64,
            stride: num_workers as u64,
        }
    }
}

impl Iterator for GridStrideTiles<'_> {
    type Item = ResolvedTile;

    fn next(&mut self) -> Option<Self::Item> {
        let tile = self.resolver.locate(self.next)?;
        self.next += self.stride;
        Some(tile)
    }
}

/// Tiles of one worker, found by advancing a cursor through the groups.
pub struct CursorTiles<'a> {
    resolver: GroupTileResolver<'a>,
    state: ResolverState,
    span: Option<GroupSpan>,
    tidx: u64,
    stride: u64,
}

impl<'a> CursorTiles<'a> {
    pub fn new(resolver: GroupTileResolver<'a>, worker: u32, num_workers: u32) -> Self {
        Self {
            resolver,
            state: ResolverState::default(),
            span: None,
            tidx: worker as u64,
            stride: num_workers as u64,
        }
    }
}

impl Iterator for CursorTiles<'_> {
    type Item = ResolvedTile;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(span) = self.span.filter(|span| self.tidx < span.tiles_end()) {
                let tile = span.tile(self.tidx);
                self.tidx += self.stride;
                return Some(tile);
            }

            let (span, state) = self.resolver.advance(self.state)?;
            self.state = state;
            self.span = Some(span);
        }
    }
}
