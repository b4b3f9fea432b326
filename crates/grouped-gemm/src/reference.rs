use crate::components::GemmElement;

/// Nested loop grouped GEMM in `f32`.
///
/// `lhs` is `[M, K]`, `rhs` is `[G * N, K]` and the result is `[M, N]`. Row `r` of group `g`
/// is multiplied by the rows `g * N..(g + 1) * N` of `rhs`. With `scales`, every output is
/// multiplied by its input row scale and its weight row scale.
pub fn grouped_gemm_reference<E: GemmElement>(
    lhs: &[E],
    rhs: &[E],
    group_sizes: &[i32],
    n: usize,
    k: usize,
    scales: Option<(&[f32], &[f32])>,
) -> Vec<f32> {
    let m: usize = group_sizes.iter().map(|size| *size as usize).sum();
    let mut out = vec![0.0; m * n];
    let mut row_offset = 0;

    for (group, size) in group_sizes.iter().enumerate() {
        for row in row_offset..row_offset + *size as usize {
            for col in 0..n {
                let weight_row = group * n + col;
                let mut acc = 0.0f32;

                for k_ in 0..k {
                    acc += lhs[row * k + k_].to_f32() * rhs[weight_row * k + k_].to_f32();
                }

                if let Some((lhs_scale, rhs_scale)) = scales {
                    acc *= lhs_scale[row] * rhs_scale[weight_row];
                }

                out[row * n + col] = acc;
            }
        }

        row_offset += *size as usize;
    }

    out
}
