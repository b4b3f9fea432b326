use crate::components::{GemmElement, GemmIdent, TilingScheme};

/// Input and weight blocks of one reduction step, as loaded and widened to `f32`.
pub struct Stage<E> {
    lhs: Vec<E>,
    rhs: Vec<E>,
    lhs_registers: Vec<f32>,
    rhs_registers: Vec<f32>,
}

impl<E: GemmElement> Stage<E> {
    pub fn new(tiling_scheme: &TilingScheme) -> Self {
        let lhs_len = tiling_scheme.elements_in_block(GemmIdent::Lhs);
        let rhs_len = tiling_scheme.elements_in_block(GemmIdent::Rhs);

        Self {
            lhs: vec![E::default(); lhs_len],
            rhs: vec![E::default(); rhs_len],
            lhs_registers: vec![0.0; lhs_len],
            rhs_registers: vec![0.0; rhs_len],
        }
    }

    pub fn lhs_mut(&mut self) -> &mut [E] {
        &mut self.lhs
    }

    pub fn rhs_mut(&mut self) -> &mut [E] {
        &mut self.rhs
    }

    /// Widens both blocks to `f32`.
    pub fn registers(&mut self) -> (&[f32], &[f32]) {
        widen(&self.lhs, &mut self.lhs_registers);
        widen(&self.rhs, &mut self.rhs_registers);

        (&self.lhs_registers, &self.rhs_registers)
    }
}

fn widen<E: GemmElement>(values: &[E], registers: &mut [f32]) {
    for (register, value) in registers.iter_mut().zip(values) {
        *register = value.to_f32();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float::e4m3;

    #[test]
    fn registers_widen_loaded_blocks() {
        let mut stage = Stage::<e4m3>::new(&TilingScheme::new(1, 1, 2));

        stage
            .lhs_mut()
            .copy_from_slice(&[e4m3::from_f32(1.5), e4m3::from_f32(-2.0)]);
        stage
            .rhs_mut()
            .copy_from_slice(&[e4m3::from_f32(0.25), e4m3::from_f32(448.0)]);

        let (lhs, rhs) = stage.registers();
        assert_eq!(lhs, &[1.5, -2.0]);
        assert_eq!(rhs, &[0.25, 448.0]);
    }
}
