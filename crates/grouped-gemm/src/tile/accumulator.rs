use crate::components::{GemmElement, GemmIdent, TilingScheme};

/// `block_m x block_n` block of `f32`, owned by one worker and reused across its tiles.
pub struct Accumulator {
    values: Vec<f32>,
    row_scale: Vec<f32>,
    col_scale: Vec<f32>,
    cols: usize,
}

impl Accumulator {
    pub fn new(tiling_scheme: &TilingScheme) -> Self {
        let rows = tiling_scheme.block_m as usize;
        let cols = tiling_scheme.block_n as usize;

        Self {
            values: vec![0.0; tiling_scheme.elements_in_block(GemmIdent::Out)],
            row_scale: vec![0.0; rows],
            col_scale: vec![0.0; cols],
            cols,
        }
    }

    pub fn reset(&mut self) {
        self.values.fill(0.0);
    }

    /// Accumulates `lhs · rhsᵀ`.
    ///
    /// `lhs` holds `block_m` rows and `rhs` holds `block_n` rows, both of `depth` values.
    pub fn mma(&mut self, lhs: &[f32], rhs: &[f32], depth: usize) {
        for (lhs_row, acc_row) in lhs
            .chunks_exact(depth)
            .zip(self.values.chunks_exact_mut(self.cols))
        {
            for (rhs_row, acc) in rhs.chunks_exact(depth).zip(acc_row.iter_mut()) {
                *acc += lhs_row
                    .iter()
                    .zip(rhs_row)
                    .map(|(lhs, rhs)| lhs * rhs)
                    .sum::<f32>();
            }
        }
    }

    /// Row and column scale buffers, to be filled before [`Self::apply_scales`].
    pub fn scales_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.row_scale, &mut self.col_scale)
    }

    /// Multiplies every value by the outer product of the row and column scales.
    pub fn apply_scales(&mut self) {
        for (row, scale_m) in self
            .values
            .chunks_exact_mut(self.cols)
            .zip(&self.row_scale)
        {
            for (value, scale_n) in row.iter_mut().zip(&self.col_scale) {
                *value *= scale_m * scale_n;
            }
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Narrows every value to the output element.
    pub fn cast_into<E: GemmElement>(&self, out: &mut [E]) {
        for (out, value) in out.iter_mut().zip(&self.values) {
            *out = E::from_f32(*value);
        }
    }
}
