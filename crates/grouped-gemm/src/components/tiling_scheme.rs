use derive_new::new;
use serde::{Deserialize, Serialize};

use super::{FormattedConfigError, GemmIdent, GroupedGemmProblem, InvalidConfigError};

/// Block sizes used to split the output into tiles and the reduction into steps.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct TilingScheme {
    /// Rows of a tile.
    #[serde(default = "default_block_m")]
    pub block_m: u32,
    /// Columns of a tile.
    #[serde(default = "default_block_n")]
    pub block_n: u32,
    /// Depth of one reduction step.
    #[serde(default = "default_block_k")]
    pub block_k: u32,
}

fn default_block_m() -> u32 {
    64
}

fn default_block_n() -> u32 {
    64
}

fn default_block_k() -> u32 {
    32
}

impl Default for TilingScheme {
    fn default() -> Self {
        Self {
            block_m: default_block_m(),
            block_n: default_block_n(),
            block_k: default_block_k(),
        }
    }
}

impl TilingScheme {
    /// Number of tiles needed to cover `m` rows.
    pub fn num_row_tiles(&self, m: u32) -> u32 {
        m.div_ceil(self.block_m)
    }

    /// Number of tiles needed to cover `n` columns.
    pub fn num_col_tiles(&self, n: u32) -> u32 {
        n.div_ceil(self.block_n)
    }

    /// Shape of the block loaded or stored for the identified matrix.
    pub fn block_shape(&self, ident: GemmIdent) -> [u32; 2] {
        match ident {
            GemmIdent::Lhs => [self.block_m, self.block_k],
            GemmIdent::Rhs => [self.block_n, self.block_k],
            GemmIdent::Out => [self.block_m, self.block_n],
        }
    }

    pub fn elements_in_block(&self, ident: GemmIdent) -> usize {
        let [rows, cols] = self.block_shape(ident);
        rows as usize * cols as usize
    }

    pub(crate) fn check(&self, problem: &GroupedGemmProblem) -> Result<(), InvalidConfigError> {
        if self.block_m == 0 || self.block_n == 0 || self.block_k == 0 {
            let tiling = *self;
            return Err(FormattedConfigError::new(move || {
                format!("Tile sizes must be non-zero, got {tiling:?}")
            }));
        }

        if problem.k % self.block_k as usize != 0 {
            let (k, block_k) = (problem.k, self.block_k);
            return Err(FormattedConfigError::new(move || {
                format!("K ({k}) must be a multiple of the reduction tile size ({block_k})")
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(k: usize) -> GroupedGemmProblem {
        GroupedGemmProblem {
            m: 10,
            n: 8,
            k,
            num_groups: 4,
        }
    }

    #[test]
    fn reduction_depth_must_divide_k() {
        let tiling = TilingScheme::new(4, 4, 8);

        assert!(tiling.check(&problem(16)).is_ok());
        assert!(tiling.check(&problem(0)).is_ok());

        let err = tiling.check(&problem(12)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "K (12) must be a multiple of the reduction tile size (8)"
        );
    }

    #[test]
    fn zero_tile_is_rejected() {
        assert!(TilingScheme::new(0, 4, 8).check(&problem(16)).is_err());
    }

    #[test]
    fn tile_counts_round_up() {
        let tiling = TilingScheme::new(4, 4, 8);

        assert_eq!(tiling.num_row_tiles(3), 1);
        assert_eq!(tiling.num_row_tiles(4), 1);
        assert_eq!(tiling.num_row_tiles(5), 2);
        assert_eq!(tiling.num_row_tiles(0), 0);
        assert_eq!(tiling.num_col_tiles(8), 2);
    }
}
