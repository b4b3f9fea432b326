use core::sync::atomic::{Ordering, fence};

use bytemuck::{Pod, Zeroable};

use crate::components::{GemmElement, GemmIdent, KernelFault};

use super::{GlobalOutput, GlobalView};

/// Size in bytes of one tensor map.
pub const TMA_SIZE: usize = 128;
/// Size in bytes of the workspace slot of one worker: one tensor map per matrix.
pub const SLOT_SIZE: usize = 3 * TMA_SIZE;

const TENSOR_MAP_MAGIC: u32 = 0x544D_4150;

/// Opaque 128 bytes describing a 2D box transfer over a global buffer.
///
/// Coordinates are `[row, col]` relative to `global_address`. Elements of a box falling
/// outside `global_size` are read as zero and never written.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct TensorMapDescriptor {
    /// Element offset of the first row in the bound buffer.
    pub global_address: u64,
    /// Extent as `[rows, cols]`.
    pub global_size: [u32; 2],
    /// Elements between two consecutive rows.
    pub global_stride: u32,
    pub box_size: [u32; 2],
    pub elem_size: u32,
    ident: u32,
    magic: u32,
    _reserved: [u32; 22],
}

const _: () = assert!(core::mem::size_of::<TensorMapDescriptor>() == TMA_SIZE);

impl TensorMapDescriptor {
    pub fn new_2d<E: GemmElement>(
        ident: GemmIdent,
        global_address: u64,
        global_size: [u32; 2],
        global_stride: u32,
        box_size: [u32; 2],
    ) -> Self {
        Self {
            global_address,
            global_size,
            global_stride,
            box_size,
            elem_size: core::mem::size_of::<E>() as u32,
            ident: ident.index() as u32,
            magic: TENSOR_MAP_MAGIC,
            _reserved: [0; 22],
        }
    }

    /// Whether the descriptor was built by [`Self::new_2d`] with a usable geometry for `E`.
    pub fn is_valid_for<E: GemmElement>(&self, ident: GemmIdent) -> bool {
        self.magic == TENSOR_MAP_MAGIC
            && self.ident == ident.index() as u32
            && self.elem_size as usize == core::mem::size_of::<E>()
            && self.box_size[0] > 0
            && self.box_size[1] > 0
            && self.global_stride >= self.global_size[1]
    }

    fn elements_in_box(&self) -> usize {
        self.box_size[0] as usize * self.box_size[1] as usize
    }

    /// Columns of the row starting at `coords` that lie inside the extent.
    fn valid_cols(&self, coords: [u32; 2]) -> usize {
        let cols = self.global_size[1].saturating_sub(coords[1]);
        cols.min(self.box_size[1]) as usize
    }

    fn row_start(&self, row: u32, col: u32) -> usize {
        self.global_address as usize + row as usize * self.global_stride as usize + col as usize
    }

    /// Loads the box at `coords` into `out`, row-major.
    pub fn load_box<E: GemmElement>(
        &self,
        global: &GlobalView<'_, E>,
        coords: [u32; 2],
        out: &mut [E],
    ) -> Result<(), KernelFault> {
        let box_cols = self.box_size[1] as usize;
        let valid_cols = self.valid_cols(coords);

        for (i, row) in out
            .chunks_exact_mut(box_cols)
            .take(self.box_size[0] as usize)
            .enumerate()
        {
            let global_row = coords[0] + i as u32;

            if global_row >= self.global_size[0] {
                row.fill(E::default());
                continue;
            }

            let (inside, outside) = row.split_at_mut(valid_cols);
            global.read_into(self.row_start(global_row, coords[1]), inside)?;
            outside.fill(E::default());
        }

        Ok(())
    }

    /// Stores `values`, row-major, at `coords`. Elements outside the extent are dropped.
    pub(crate) fn store_box<E: GemmElement>(
        &self,
        global: &GlobalOutput<'_, E>,
        coords: [u32; 2],
        values: &[E],
    ) -> Result<(), KernelFault> {
        let box_cols = self.box_size[1] as usize;
        let valid_cols = self.valid_cols(coords);
        if valid_cols == 0 {
            return Ok(());
        }

        for (i, row) in values
            .chunks_exact(box_cols)
            .take(self.box_size[0] as usize)
            .enumerate()
        {
            let global_row = coords[0] + i as u32;

            if global_row >= self.global_size[0] {
                break;
            }

            // SAFETY: the box lies in a tile owned by this worker only.
            unsafe {
                global.write_row(self.row_start(global_row, coords[1]), &row[..valid_cols])?;
            }
        }

        Ok(())
    }
}

/// One tensor map inside the workspace slot of a worker.
///
/// The bytes are only read back after [`fence_proxy_acquire`](Self::fence_proxy_acquire),
/// and any [`configure`](Self::configure) invalidates the previous acquisition.
pub struct TensorMapSlot<'a> {
    worker: u32,
    ident: GemmIdent,
    bytes: &'a mut [u8],
    acquired: Option<TensorMapDescriptor>,
}

impl<'a> TensorMapSlot<'a> {
    fn new(worker: u32, ident: GemmIdent, bytes: &'a mut [u8]) -> Self {
        Self {
            worker,
            ident,
            bytes,
            acquired: None,
        }
    }

    pub fn worker(&self) -> u32 {
        self.worker
    }

    /// Writes `descriptor` into the slot.
    pub fn configure(&mut self, descriptor: &TensorMapDescriptor) {
        log::trace!(
            "Worker {} configures {:?} tensor map at {} with extent {:?}",
            self.worker,
            self.ident,
            descriptor.global_address,
            descriptor.global_size
        );

        self.bytes.copy_from_slice(bytemuck::bytes_of(descriptor));
        self.acquired = None;
    }

    /// Makes the last configured descriptor visible to the transfers that follow.
    pub fn fence_proxy_acquire(&mut self) {
        fence(Ordering::Acquire);
        self.acquired = Some(bytemuck::pod_read_unaligned(self.bytes));
    }

    /// Descriptor usable for transfers of `E`.
    pub fn descriptor<E: GemmElement>(&self) -> Result<&TensorMapDescriptor, KernelFault> {
        let descriptor = self
            .acquired
            .as_ref()
            .ok_or(KernelFault::DescriptorNotAcquired {
                worker: self.worker,
                ident: self.ident,
            })?;

        if !descriptor.is_valid_for::<E>(self.ident) {
            return Err(KernelFault::InvalidDescriptor {
                worker: self.worker,
                ident: self.ident,
            });
        }

        Ok(descriptor)
    }

    pub fn load_box<E: GemmElement>(
        &self,
        global: &GlobalView<'_, E>,
        coords: [u32; 2],
        out: &mut [E],
    ) -> Result<(), KernelFault> {
        let descriptor = self.descriptor::<E>()?;
        if out.len() != descriptor.elements_in_box() {
            return Err(self.invalid());
        }

        descriptor.load_box(global, coords, out)
    }

    pub(crate) fn store_box<E: GemmElement>(
        &self,
        global: &GlobalOutput<'_, E>,
        coords: [u32; 2],
        values: &[E],
    ) -> Result<(), KernelFault> {
        let descriptor = self.descriptor::<E>()?;
        if values.len() != descriptor.elements_in_box() {
            return Err(self.invalid());
        }

        descriptor.store_box(global, coords, values)
    }

    fn invalid(&self) -> KernelFault {
        KernelFault::InvalidDescriptor {
            worker: self.worker,
            ident: self.ident,
        }
    }
}

/// Tensor maps owned by one worker.
pub struct WorkerTensorMaps<'a> {
    pub lhs: TensorMapSlot<'a>,
    pub rhs: TensorMapSlot<'a>,
    pub out: TensorMapSlot<'a>,
}

/// Scratch memory holding one [`SLOT_SIZE`] slot per worker.
pub struct TensorMapWorkspace {
    bytes: Vec<u8>,
}

impl TensorMapWorkspace {
    pub fn new(num_workers: u32) -> Self {
        Self {
            bytes: vec![0; num_workers as usize * SLOT_SIZE],
        }
    }

    pub fn num_slots(&self) -> usize {
        self.bytes.len() / SLOT_SIZE
    }

    /// Splits the workspace into the disjoint slots of every worker, in worker order.
    pub fn slots(&mut self) -> impl Iterator<Item = WorkerTensorMaps<'_>> {
        self.bytes
            .chunks_exact_mut(SLOT_SIZE)
            .enumerate()
            .map(|(worker, slot)| {
                let worker = worker as u32;
                let (lhs, rest) = slot.split_at_mut(TMA_SIZE);
                let (rhs, out) = rest.split_at_mut(TMA_SIZE);

                WorkerTensorMaps {
                    lhs: TensorMapSlot::new(worker, GemmIdent::Lhs, lhs),
                    rhs: TensorMapSlot::new(worker, GemmIdent::Rhs, rhs),
                    out: TensorMapSlot::new(worker, GemmIdent::Out, out),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4x3 matrix, values are `row * 10 + col`.
    fn matrix() -> Vec<f32> {
        (0..4)
            .flat_map(|row| (0..3).map(move |col| (row * 10 + col) as f32))
            .collect()
    }

    #[test]
    fn loads_zero_outside_the_extent() {
        let data = matrix();
        let view = GlobalView::new(&data, 3, GemmIdent::Lhs);
        // Rows 1..3 only, boxes of 2x2.
        let descriptor = TensorMapDescriptor::new_2d::<f32>(GemmIdent::Lhs, 3, [2, 3], 3, [2, 2]);
        let mut out = [f32::NAN; 4];

        descriptor.load_box(&view, [0, 2], &mut out).unwrap();
        assert_eq!(out, [12.0, 0.0, 22.0, 0.0]);

        descriptor.load_box(&view, [1, 0], &mut out).unwrap();
        assert_eq!(out, [20.0, 21.0, 0.0, 0.0]);
    }

    #[test]
    fn stores_are_clipped_to_the_extent() {
        let mut data = vec![0.0f32; 12];
        let output = GlobalOutput::new(&mut data, 3);
        let descriptor = TensorMapDescriptor::new_2d::<f32>(GemmIdent::Out, 3, [2, 3], 3, [2, 2]);

        descriptor
            .store_box(&output, [1, 2], &[1.0, 2.0, 3.0, 4.0])
            .unwrap();

        let mut expected = vec![0.0f32; 12];
        expected[8] = 1.0;
        assert_eq!(data, expected);
    }

    #[test]
    fn slot_must_be_fenced_after_configure() {
        let data = matrix();
        let view = GlobalView::new(&data, 3, GemmIdent::Rhs);
        let mut workspace = TensorMapWorkspace::new(1);
        let mut maps = workspace.slots().next().unwrap();
        let descriptor = TensorMapDescriptor::new_2d::<f32>(GemmIdent::Rhs, 0, [4, 3], 3, [2, 2]);
        let mut out = [0.0f32; 4];

        maps.rhs.configure(&descriptor);
        assert!(matches!(
            maps.rhs.load_box(&view, [0, 0], &mut out),
            Err(KernelFault::DescriptorNotAcquired {
                worker: 0,
                ident: GemmIdent::Rhs
            })
        ));

        maps.rhs.fence_proxy_acquire();
        maps.rhs.load_box(&view, [2, 1], &mut out).unwrap();
        assert_eq!(out, [21.0, 22.0, 31.0, 32.0]);

        maps.rhs.configure(&descriptor);
        assert!(maps.rhs.load_box(&view, [2, 1], &mut out).is_err());
    }

    #[test]
    fn unconfigured_slot_is_invalid() {
        let mut workspace = TensorMapWorkspace::new(1);
        let mut maps = workspace.slots().next().unwrap();

        maps.out.fence_proxy_acquire();
        assert!(matches!(
            maps.out.descriptor::<f32>(),
            Err(KernelFault::InvalidDescriptor {
                worker: 0,
                ident: GemmIdent::Out
            })
        ));
    }

    #[test]
    fn descriptor_for_another_element_is_invalid() {
        let mut workspace = TensorMapWorkspace::new(1);
        let mut maps = workspace.slots().next().unwrap();

        maps.lhs.configure(&TensorMapDescriptor::new_2d::<f32>(
            GemmIdent::Lhs,
            0,
            [4, 4],
            4,
            [2, 2],
        ));
        maps.lhs.fence_proxy_acquire();

        assert!(maps.lhs.descriptor::<f32>().is_ok());
        assert!(maps.lhs.descriptor::<half::bf16>().is_err());
    }

    #[test]
    fn worker_slots_do_not_alias() {
        let mut workspace = TensorMapWorkspace::new(3);
        assert_eq!(workspace.num_slots(), 3);

        {
            let mut slots: Vec<_> = workspace.slots().collect();
            let descriptor =
                TensorMapDescriptor::new_2d::<f32>(GemmIdent::Out, 7, [5, 8], 8, [4, 4]);
            slots[1].out.configure(&descriptor);

            for (worker, maps) in slots.iter_mut().enumerate() {
                assert_eq!(maps.lhs.worker(), worker as u32);
                for slot in [&mut maps.lhs, &mut maps.rhs, &mut maps.out] {
                    slot.fence_proxy_acquire();
                }
            }

            assert!(slots[1].out.descriptor::<f32>().is_ok());
            assert!(slots[0].out.descriptor::<f32>().is_err());
            assert!(slots[2].out.descriptor::<f32>().is_err());
            assert!(slots[1].lhs.descriptor::<f32>().is_err());
        }

        let written: usize = workspace.bytes.iter().filter(|byte| **byte != 0).count();
        assert!(written > 0);
        assert!(
            workspace.bytes[..SLOT_SIZE + 2 * TMA_SIZE]
                .iter()
                .all(|byte| *byte == 0)
        );
    }
}
