use core::marker::PhantomData;

use crate::components::{GemmIdent, KernelFault};

/// Read-only view over a global buffer, shared by every worker.
#[derive(Clone, Copy, Debug)]
pub struct GlobalView<'a, E> {
    data: &'a [E],
    row_stride: usize,
    ident: GemmIdent,
}

impl<'a, E: Copy> GlobalView<'a, E> {
    pub fn new(data: &'a [E], row_stride: usize, ident: GemmIdent) -> Self {
        Self {
            data,
            row_stride,
            ident,
        }
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn read(&self, index: usize) -> Result<E, KernelFault> {
        self.data
            .get(index)
            .copied()
            .ok_or_else(|| self.illegal_address(index))
    }

    /// Copies `out.len()` contiguous elements starting at `start`.
    pub fn read_into(&self, start: usize, out: &mut [E]) -> Result<(), KernelFault> {
        let end = start + out.len();
        let values = self
            .data
            .get(start..end)
            .ok_or_else(|| self.illegal_address(end.saturating_sub(1)))?;
        out.copy_from_slice(values);

        Ok(())
    }

    fn illegal_address(&self, index: usize) -> KernelFault {
        KernelFault::IllegalAddress {
            ident: self.ident,
            index,
            len: self.data.len(),
        }
    }
}

/// Writable view over the output buffer, shared by every worker.
///
/// Workers write through a raw pointer so that a single buffer can be shared. Soundness
/// relies on the tile resolver: no two workers ever own overlapping elements.
pub(crate) struct GlobalOutput<'a, E> {
    ptr: *mut E,
    len: usize,
    row_stride: usize,
    _buffer: PhantomData<&'a mut [E]>,
}

unsafe impl<E: Send> Send for GlobalOutput<'_, E> {}
unsafe impl<E: Send> Sync for GlobalOutput<'_, E> {}

impl<'a, E: Copy> GlobalOutput<'a, E> {
    pub fn new(data: &'a mut [E], row_stride: usize) -> Self {
        Self {
            ptr: data.as_mut_ptr(),
            len: data.len(),
            row_stride,
            _buffer: PhantomData,
        }
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Writes `values` contiguously starting at `start`.
    ///
    /// # Safety
    ///
    /// No other thread may read or write `start..start + values.len()` during the call.
    pub unsafe fn write_row(&self, start: usize, values: &[E]) -> Result<(), KernelFault> {
        let end = start + values.len();
        if end > self.len {
            return Err(KernelFault::IllegalAddress {
                ident: GemmIdent::Out,
                index: end - 1,
                len: self.len,
            });
        }

        // SAFETY: `start..end` is in bounds, and exclusive to this caller by contract.
        unsafe {
            core::ptr::copy_nonoverlapping(values.as_ptr(), self.ptr.add(start), values.len());
        }

        Ok(())
    }
}
