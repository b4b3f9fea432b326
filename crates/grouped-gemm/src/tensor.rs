use crate::components::GemmElement;

/// Owned row-major matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor<E> {
    pub data: Vec<E>,
    pub shape: [usize; 2],
}

impl<E: GemmElement> Tensor<E> {
    pub fn zeros(shape: [usize; 2]) -> Self {
        Self {
            data: vec![E::default(); shape[0] * shape[1]],
            shape,
        }
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|value| value.to_f32()).collect()
    }
}

/// Borrowed matrix with explicit strides, in elements.
#[derive(Clone, Copy, Debug)]
pub struct TensorRef<'a, E> {
    pub data: &'a [E],
    pub shape: [usize; 2],
    pub strides: [usize; 2],
}

impl<'a, E> TensorRef<'a, E> {
    /// Row-major view.
    pub fn new(data: &'a [E], shape: [usize; 2]) -> Self {
        Self {
            data,
            shape,
            strides: [shape[1], 1],
        }
    }

    pub fn with_strides(data: &'a [E], shape: [usize; 2], strides: [usize; 2]) -> Self {
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Whether rows are densely packed one after the other.
    pub fn is_contiguous(&self) -> bool {
        self.strides[1] == 1 && self.strides[0] == self.shape[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguity_follows_strides() {
        let data = [0.0f32; 12];

        assert!(TensorRef::new(&data, [3, 4]).is_contiguous());
        assert!(!TensorRef::with_strides(&data, [3, 4], [1, 3]).is_contiguous());
        assert!(!TensorRef::with_strides(&data, [2, 4], [6, 1]).is_contiguous());
    }

    #[test]
    fn zeros_fill_the_shape() {
        assert_eq!(Tensor::<f32>::zeros([2, 3]).data, vec![0.0; 6]);
        assert_eq!(Tensor::<f32>::zeros([0, 8]).data.len(), 0);
    }
}
