use crate::components::TilingScheme;

use super::GroupSizes;

#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
/// Progress of a scan over the groups.
///
/// Starts at zero and only moves forward. Groups before `current_group` are never read again.
pub struct ResolverState {
    /// Next group to inspect.
    pub current_group: usize,
    /// Tiles owned by the groups already passed.
    pub tiles_consumed: u64,
    /// First row of `current_group`.
    pub row_offset: usize,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
/// Flat tile range owned by one non-empty group
pub struct GroupSpan {
    pub group: usize,
    pub row_offset: usize,
    pub m_size: usize,
    pub num_row_tiles: u32,
    pub num_col_tiles: u32,
    /// First flat tile index of the group.
    pub tiles_before: u64,
}

impl GroupSpan {
    pub fn num_tiles(&self) -> u64 {
        self.num_row_tiles as u64 * self.num_col_tiles as u64
    }

    /// One past the last flat tile index of the group.
    pub fn tiles_end(&self) -> u64 {
        self.tiles_before + self.num_tiles()
    }

    pub fn contains(&self, flat: u64) -> bool {
        (self.tiles_before..self.tiles_end()).contains(&flat)
    }

    /// Tile at flat index `flat`, which must lie in the span.
    ///
    /// Row tiles are exhausted before the column tile advances.
    pub fn tile(&self, flat: u64) -> ResolvedTile {
        debug_assert!(self.contains(flat));

        let local = flat - self.tiles_before;
        let num_row_tiles = self.num_row_tiles as u64;

        ResolvedTile {
            group: self.group,
            row_offset: self.row_offset,
            m_size: self.m_size,
            row_tile: (local % num_row_tiles) as u32,
            col_tile: (local / num_row_tiles) as u32,
        }
    }
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
/// A tile of the output, located in its group
pub struct ResolvedTile {
    pub group: usize,
    /// First row of the group in the concatenated row space.
    pub row_offset: usize,
    /// Rows of the group. The last row tile may extend past it.
    pub m_size: usize,
    pub row_tile: u32,
    pub col_tile: u32,
}

/// Maps flat tile indices onto (group, row tile, column tile).
///
/// Group boundaries come from the group sizes and are discovered by scanning, no prefix sum
/// is materialized.
#[derive(Copy, Clone, Debug)]
pub struct GroupTileResolver<'a> {
    group_sizes: GroupSizes<'a>,
    tiling_scheme: TilingScheme,
    num_col_tiles: u32,
}

impl<'a> GroupTileResolver<'a> {
    pub fn new(group_sizes: GroupSizes<'a>, n: usize, tiling_scheme: &TilingScheme) -> Self {
        Self {
            group_sizes,
            tiling_scheme: *tiling_scheme,
            num_col_tiles: tiling_scheme.num_col_tiles(n as u32),
        }
    }

    /// Finds the next group owning at least one tile, starting at `state.current_group`.
    ///
    /// Empty groups are stepped over without consuming tiles. Returns the span of the found
    /// group along with the state positioned right after it.
    pub fn advance(&self, state: ResolverState) -> Option<(GroupSpan, ResolverState)> {
        let mut state = state;

        while state.current_group < self.group_sizes.num_groups() {
            let group = state.current_group;
            let m_size = self.group_sizes.size(group);
            let row_offset = state.row_offset;

            state.current_group += 1;
            state.row_offset += m_size;

            let num_row_tiles = self.tiling_scheme.num_row_tiles(m_size as u32);
            let span = GroupSpan {
                group,
                row_offset,
                m_size,
                num_row_tiles,
                num_col_tiles: self.num_col_tiles,
                tiles_before: state.tiles_consumed,
            };

            if span.num_tiles() == 0 {
                continue;
            }

            state.tiles_consumed = span.tiles_end();
            return Some((span, state));
        }

        None
    }

    /// Iterates over the spans of every non-empty group.
    pub fn spans(&self) -> impl Iterator<Item = GroupSpan> + 'a {
        let resolver = *self;
        let mut state = ResolverState::default();

        core::iter::from_fn(move || {
            let (span, next) = resolver.advance(state)?;
            state = next;
            Some(span)
        })
    }

    pub fn total_tiles(&self) -> u64 {
        self.spans().map(|span| span.num_tiles()).sum()
    }

    /// Locates flat tile `flat` with a fresh scan from the first group.
    pub fn locate(&self, flat: u64) -> Option<ResolvedTile> {
        self.spans()
            .take_while(|span| span.tiles_before <= flat)
            .find(|span| span.contains(flat))
            .map(|span| span.tile(flat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: [i32; 4] = [3, 0, 4, 3];

    fn resolver(sizes: &[i32], n: usize) -> GroupTileResolver<'_> {
        let total = sizes.iter().sum::<i32>() as usize;
        let group_sizes = GroupSizes::new(sizes, total).unwrap();
        GroupTileResolver::new(group_sizes, n, &TilingScheme::new(4, 4, 8))
    }

    #[test]
    fn advance_skips_empty_groups() {
        let resolver = resolver(&SIZES, 8);

        let (first, state) = resolver.advance(ResolverState::default()).unwrap();
        assert_eq!(first.group, 0);
        assert_eq!(first.num_tiles(), 2);
        assert_eq!(
            state,
            ResolverState {
                current_group: 1,
                tiles_consumed: 2,
                row_offset: 3,
            }
        );

        let (second, state) = resolver.advance(state).unwrap();
        assert_eq!(second.group, 2);
        assert_eq!(second.row_offset, 3);
        assert_eq!(second.tiles_before, 2);
        assert_eq!(state.current_group, 3);
        assert_eq!(state.row_offset, 7);

        let (third, state) = resolver.advance(state).unwrap();
        assert_eq!(third.group, 3);
        assert_eq!(third.row_offset, 7);
        assert_eq!(third.tiles_before, 4);

        assert_eq!(resolver.advance(state), None);
        assert_eq!(resolver.total_tiles(), 6);
    }

    #[test]
    fn locate_rescans_from_the_first_group() {
        let resolver = resolver(&SIZES, 8);

        assert_eq!(
            resolver.locate(3),
            Some(ResolvedTile {
                group: 2,
                row_offset: 3,
                m_size: 4,
                row_tile: 0,
                col_tile: 1,
            })
        );
        assert_eq!(resolver.locate(5).map(|tile| tile.group), Some(3));
        assert_eq!(resolver.locate(6), None);
    }

    #[test]
    fn row_tiles_exhaust_before_column_tiles() {
        let resolver = resolver(&[10], 8);
        let coords: Vec<_> = (0..resolver.total_tiles())
            .filter_map(|flat| resolver.locate(flat))
            .map(|tile| (tile.row_tile, tile.col_tile))
            .collect();

        assert_eq!(coords, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn partial_row_tiles_round_up() {
        let tiling_scheme = TilingScheme::new(4, 4, 8);
        let resolver = resolver(&[9, 1, 4], 6);

        let row_tiles: Vec<_> = resolver.spans().map(|span| span.num_row_tiles).collect();
        assert_eq!(row_tiles, vec![3, 1, 1]);
        assert_eq!(tiling_scheme.num_row_tiles(9), 3);
        assert_eq!(resolver.total_tiles(), 5 * 2);
    }

    #[test]
    fn all_empty_groups_have_no_tiles() {
        let resolver = resolver(&[0, 0, 0], 8);

        assert_eq!(resolver.advance(ResolverState::default()), None);
        assert_eq!(resolver.total_tiles(), 0);
        assert_eq!(resolver.locate(0), None);
    }

    #[test]
    fn no_columns_means_no_tiles() {
        let resolver = resolver(&SIZES, 0);

        assert_eq!(resolver.total_tiles(), 0);
    }
}
