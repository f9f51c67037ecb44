use std::marker::PhantomData;

use bytemuck::Pod;
use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferAddress, BufferUsages, VertexAttribute, VertexBufferLayout, VertexStepMode};

/// Fixed vertex layout declared once per buffer.
#[derive(Debug, Clone, Copy)]
pub struct VertexLayout {
    pub stride: BufferAddress,
    pub step_mode: VertexStepMode,
    pub attributes: &'static [VertexAttribute],
}

impl VertexLayout {
    pub fn buffer_layout(&self) -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: self.stride,
            step_mode: self.step_mode,
            attributes: self.attributes,
        }
    }
}

/// Upload pattern of a buffer's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsageHint {
    /// Rewritten every frame. Storage is kept and grown on demand.
    Stream,
    /// Written once and drawn many times. Storage is sized exactly.
    Static,
}

/// A vertex buffer of `T` records with a declared layout.
///
/// Storage is allocated lazily by [`GpuBuffer::load_data`] or eagerly by
/// [`GpuBuffer::with_capacity`]. `len` always equals the number of records
/// most recently uploaded.
pub struct GpuBuffer<T: Pod> {
    label: &'static str,
    layout: VertexLayout,
    buffer: Option<Buffer>,
    capacity: usize,
    len: usize,
    _records: PhantomData<T>,
}

impl<T: Pod> GpuBuffer<T> {
    pub fn new(label: &'static str, layout: VertexLayout) -> Self {
        debug_assert_eq!(layout.stride as usize, std::mem::size_of::<T>());
        Self {
            label,
            layout,
            buffer: None,
            capacity: 0,
            len: 0,
            _records: PhantomData,
        }
    }

    /// Allocate room for `capacity` records without uploading anything.
    pub fn with_capacity(
        device: &wgpu::Device,
        label: &'static str,
        layout: VertexLayout,
        capacity: usize,
    ) -> Self {
        let mut buffer = Self::new(label, layout);
        buffer.allocate(device, capacity);
        buffer
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the whole contents of the buffer.
    pub fn load_data(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        records: &[T],
        usage: BufferUsageHint,
    ) {
        match usage {
            BufferUsageHint::Static => {
                if records.is_empty() {
                    self.len = 0;
                    return;
                }
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(self.label),
                    contents: bytemuck::cast_slice(records),
                    usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
                });
                self.buffer = Some(buffer);
                self.capacity = records.len();
            }
            BufferUsageHint::Stream => {
                if records.len() > self.capacity {
                    self.allocate(device, records.len().next_power_of_two());
                }
                if let Some(buffer) = &self.buffer {
                    if !records.is_empty() {
                        queue.write_buffer(buffer, 0, bytemuck::cast_slice(records));
                    }
                }
            }
        }
        self.len = records.len();
    }

    /// Replace the contents with `records` inside the allocated storage.
    ///
    /// Records past the capacity are dropped with a warning. Returns the
    /// number of records written.
    pub fn update_data(&mut self, queue: &wgpu::Queue, records: &[T]) -> usize {
        let count = self.reserve_replace(records.len());
        self.write(queue, 0, &records[..count]);
        count
    }

    /// Overwrite records starting at `first`, extending `len` when the
    /// write reaches past it. Returns the number of records written.
    pub fn update_range(&mut self, queue: &wgpu::Queue, first: usize, records: &[T]) -> usize {
        let count = self.reserve_write(first, records.len());
        self.write(queue, first, &records[..count]);
        count
    }

    fn write(&self, queue: &wgpu::Queue, first: usize, records: &[T]) {
        if records.is_empty() {
            return;
        }
        if let Some(buffer) = &self.buffer {
            let offset = (first * std::mem::size_of::<T>()) as BufferAddress;
            queue.write_buffer(buffer, offset, bytemuck::cast_slice(records));
        }
    }

    fn reserve_replace(&mut self, requested: usize) -> usize {
        self.len = 0;
        self.reserve_write(0, requested)
    }

    /// Clamp a write of `requested` records at `first` to the capacity and
    /// account for it in `len`.
    fn reserve_write(&mut self, first: usize, requested: usize) -> usize {
        let count = clamp_write(self.capacity, first, requested);
        if count < requested {
            log::warn!(
                "{}: write of {} records at {} exceeds capacity {}, truncated to {}",
                self.label,
                requested,
                first,
                self.capacity,
                count
            );
        }
        if count > 0 {
            self.len = self.len.max(first + count);
        }
        count
    }

    /// Forget the uploaded records while keeping the storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Attach the uploaded records to vertex slot `slot`.
    ///
    /// Returns `false` when there is nothing to draw.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, slot: u32) -> bool {
        match &self.buffer {
            Some(buffer) if self.len > 0 => {
                let end = (self.len * std::mem::size_of::<T>()) as BufferAddress;
                pass.set_vertex_buffer(slot, buffer.slice(..end));
                true
            }
            _ => false,
        }
    }

    fn allocate(&mut self, device: &wgpu::Device, capacity: usize) {
        let size = (capacity.max(1) * std::mem::size_of::<T>()) as BufferAddress;
        self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.capacity = capacity;
        self.len = 0;
    }
}

/// Number of records that fit when writing `requested` records at `first`.
fn clamp_write(capacity: usize, first: usize, requested: usize) -> usize {
    requested.min(capacity.saturating_sub(first))
}

/// Round `size` up to the device's dynamic uniform offset alignment.
pub(crate) fn align_to(size: u64, alignment: u64) -> u64 {
    (size + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_truncated_to_capacity() {
        assert_eq!(clamp_write(10, 0, 4), 4);
        assert_eq!(clamp_write(10, 8, 4), 2);
        assert_eq!(clamp_write(10, 10, 4), 0);
        assert_eq!(clamp_write(10, 12, 4), 0);
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Record {
        value: u32,
    }

    const RECORD_LAYOUT: VertexLayout = VertexLayout {
        stride: 4,
        step_mode: VertexStepMode::Instance,
        attributes: &[],
    };

    fn unallocated(capacity: usize) -> GpuBuffer<Record> {
        let mut buffer = GpuBuffer::new("records", RECORD_LAYOUT);
        buffer.capacity = capacity;
        buffer
    }

    #[test]
    fn replacing_writes_reset_the_length() {
        let mut buffer = unallocated(8);
        buffer.reserve_write(0, 6);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.reserve_replace(3), 3);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.reserve_replace(0), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn oversized_writes_fill_the_capacity() {
        let mut buffer = unallocated(8);
        assert_eq!(buffer.reserve_replace(20), 8);
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn range_writes_extend_the_length() {
        let mut buffer = unallocated(10);
        assert_eq!(buffer.reserve_write(4, 2), 2);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.reserve_write(0, 2), 2);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.reserve_write(12, 2), 0);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(align_to(176, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(16, 16), 16);
    }
}
