use crate::{
    components::{FormattedConfigError, InvalidConfigError},
    float::e4m3,
};

/// Row-major `e4m3` matrix with one dequantization scale per row.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizedRows {
    pub data: Vec<e4m3>,
    pub scales: Vec<f32>,
}

impl QuantizedRows {
    /// Values of row `row` after dequantization.
    pub fn dequantize_row(&self, row: usize) -> Vec<f32> {
        let cols = self.data.len() / self.scales.len().max(1);
        let scale = self.scales[row];

        self.data[row * cols..(row + 1) * cols]
            .iter()
            .map(|value| value.to_f32() * scale)
            .collect()
    }
}

/// Quantizes a `[rows, cols]` matrix to `e4m3`, one symmetric scale per row.
///
/// The scale maps the largest magnitude of the row onto the largest finite `e4m3`. Rows of
/// zeros get a scale of one.
pub fn quantize_rowwise(
    values: &[f32],
    rows: usize,
    cols: usize,
) -> Result<QuantizedRows, InvalidConfigError> {
    let Some(len) = rows.checked_mul(cols) else {
        return Err(FormattedConfigError::new(move || {
            format!("A [{rows}, {cols}] matrix overflows the addressable size")
        }));
    };

    if values.len() != len {
        let len = values.len();
        return Err(FormattedConfigError::new(move || {
            format!("Cannot quantize {len} values as a [{rows}, {cols}] matrix")
        }));
    }

    let mut data = Vec::with_capacity(values.len());
    let mut scales = Vec::with_capacity(rows);

    for row in values.chunks_exact(cols.max(1)).take(rows) {
        let amax = row.iter().fold(0.0f32, |amax, value| amax.max(value.abs()));
        let scale = match amax > 0.0 {
            true => amax / e4m3::MAX as f32,
            false => 1.0,
        };

        data.extend(row.iter().map(|value| e4m3::from_f32(value / scale)));
        scales.push(scale);
    }

    // Rows without columns still get a scale.
    scales.resize(rows, 1.0);

    Ok(QuantizedRows { data, scales })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_magnitude_maps_to_the_largest_finite() {
        let quantized = quantize_rowwise(&[0.875, -1.75, 0.4375, 0.0, 0.0, 0.0], 2, 3).unwrap();

        assert_eq!(quantized.scales, vec![1.0 / 256.0, 1.0]);
        assert_eq!(quantized.data[0].to_f32(), 224.0);
        assert_eq!(quantized.data[1].to_f32(), -448.0);
        assert_eq!(quantized.dequantize_row(0), vec![0.875, -1.75, 0.4375]);
        assert_eq!(quantized.dequantize_row(1), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn shape_must_match() {
        assert!(quantize_rowwise(&[1.0; 5], 2, 3).is_err());
    }

    #[test]
    fn oversized_shapes_are_rejected() {
        let err = quantize_rowwise(&[], usize::MAX, 2).unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("A [{}, 2] matrix overflows the addressable size", usize::MAX)
        );
    }

    #[test]
    fn rows_without_columns_have_unit_scales() {
        let quantized = quantize_rowwise(&[], 3, 0).unwrap();

        assert!(quantized.data.is_empty());
        assert_eq!(quantized.scales, vec![1.0; 3]);
    }
}
