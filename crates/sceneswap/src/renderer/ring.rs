//! Triple-buffered uniform storage and the in-flight gate that keeps the CPU
//! at most three frames ahead of the GPU.
//!
//! Two buffers hold three slots each: one [`SharedUniforms`] region and one
//! block of [`MAX_ANCHOR_INSTANCES`] instance matrices per slot. Both are
//! bound once with dynamic offsets; each frame picks its slot's offsets at
//! draw time.

use crate::uniforms::{InstanceUniforms, SharedUniforms, INSTANCE_BLOCK_SIZE, MAX_ANCHOR_INSTANCES};
use parking_lot::{Condvar, Mutex};
use std::{
    num::NonZeroU64,
    sync::Arc,
    time::Duration,
};

/// Number of frames that may be in flight at once.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Minimum stride between per-frame uniform regions.
pub const UNIFORM_ALIGNMENT: u64 = 256;

/// How long one blocking acquire waits before polling the device again.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Rounds `size` up to the larger of [`UNIFORM_ALIGNMENT`] and the device's
/// own offset alignment.
pub fn aligned_stride(size: u64, device_alignment: u64) -> u64 {
    let align = device_alignment.max(UNIFORM_ALIGNMENT);
    size.div_ceil(align).max(1) * align
}

/// The slot a frame writes to and the byte offsets of its regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingSlot {
    pub index: usize,
    pub shared_offset: u64,
    pub instance_offset: u64,
}

impl RingSlot {
    /// Offsets in binding order, ready for `set_bind_group`.
    pub fn dynamic_offsets(&self) -> [u32; 2] {
        [self.shared_offset as u32, self.instance_offset as u32]
    }
}

/// Pure slot bookkeeping: the N-th advance yields slot `N mod 3`.
#[derive(Clone, Debug)]
pub struct RingCursor {
    frames: u64,
    shared_stride: u64,
    instance_stride: u64,
}

impl RingCursor {
    pub fn new(shared_stride: u64, instance_stride: u64) -> Self {
        Self {
            frames: 0,
            shared_stride,
            instance_stride,
        }
    }

    pub fn advance(&mut self) -> RingSlot {
        let index = (self.frames % MAX_FRAMES_IN_FLIGHT as u64) as usize;
        self.frames += 1;
        RingSlot {
            index,
            shared_offset: index as u64 * self.shared_stride,
            instance_offset: index as u64 * self.instance_stride,
        }
    }

    /// How many slots have been handed out so far.
    pub fn frames_advanced(&self) -> u64 {
        self.frames
    }
}

/// Counting semaphore bounding the number of outstanding frames.
#[derive(Debug)]
pub struct InFlightGate {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

impl InFlightGate {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            available: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        *self.available.lock()
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotPermit> {
        let mut available = self.available.lock();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(SlotPermit { gate: self.clone() })
    }

    /// Waits up to `timeout` for a permit.
    pub fn acquire_timeout(self: &Arc<Self>, timeout: Duration) -> Option<SlotPermit> {
        let mut available = self.available.lock();
        if *available == 0 {
            let _ = self
                .released
                .wait_while_for(&mut available, |n| *n == 0, timeout);
        }
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(SlotPermit { gate: self.clone() })
    }

    /// Waits until a permit is free.
    pub fn acquire(self: &Arc<Self>) -> SlotPermit {
        let mut available = self.available.lock();
        self.released.wait_while(&mut available, |n| *n == 0);
        *available -= 1;
        SlotPermit { gate: self.clone() }
    }

    fn release(&self) {
        let mut available = self.available.lock();
        debug_assert!(*available < self.capacity, "in-flight gate over-released");
        *available = (*available + 1).min(self.capacity);
        self.released.notify_one();
    }
}

/// Right to have one frame in flight. Dropping it frees the slot, whether the
/// frame was skipped or its GPU work completed.
#[derive(Debug)]
pub struct SlotPermit {
    gate: Arc<InFlightGate>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// GPU side of the ring: backing buffers, bind group and the gate.
pub struct FrameRing {
    gate: Arc<InFlightGate>,
    cursor: RingCursor,
    shared_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl FrameRing {
    pub fn new(device: &wgpu::Device, device_alignment: u32) -> Self {
        let shared_size = std::mem::size_of::<SharedUniforms>() as u64;
        let instance_size = INSTANCE_BLOCK_SIZE as u64;
        let shared_stride = aligned_stride(shared_size, device_alignment as u64);
        let instance_stride = aligned_stride(instance_size, device_alignment as u64);

        let make_buffer = |label: &str, stride: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: stride * MAX_FRAMES_IN_FLIGHT as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let shared_buffer = make_buffer("Shared Uniform Ring", shared_stride);
        let instance_buffer = make_buffer("Instance Uniform Ring", instance_stride);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Ring Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(shared_size),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(instance_size),
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Ring Bind"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &shared_buffer,
                        offset: 0,
                        size: NonZeroU64::new(shared_size),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &instance_buffer,
                        offset: 0,
                        size: NonZeroU64::new(instance_size),
                    }),
                },
            ],
        });

        log::debug!(
            "Frame ring: shared stride {} B, instance stride {} B, {} slots",
            shared_stride,
            instance_stride,
            MAX_FRAMES_IN_FLIGHT
        );

        Self {
            gate: InFlightGate::new(MAX_FRAMES_IN_FLIGHT),
            cursor: RingCursor::new(shared_stride, instance_stride),
            shared_buffer,
            instance_buffer,
            layout,
            bind_group,
        }
    }

    pub fn gate(&self) -> &Arc<InFlightGate> {
        &self.gate
    }

    /// Blocks until fewer than three frames are in flight.
    ///
    /// Completion callbacks only run while the device is polled, so waiting
    /// alternates between polling and a bounded wait on the gate.
    pub fn acquire(&self, device: &wgpu::Device) -> SlotPermit {
        if let Some(permit) = self.gate.try_acquire() {
            return permit;
        }
        loop {
            device.poll(wgpu::Maintain::Wait);
            if let Some(permit) = self.gate.acquire_timeout(ACQUIRE_POLL_INTERVAL) {
                return permit;
            }
            log::warn!("Still waiting for a free frame slot");
        }
    }

    /// Rotates to the next slot. Only call while holding a permit.
    pub fn advance(&mut self) -> RingSlot {
        self.cursor.advance()
    }

    pub fn frames_advanced(&self) -> u64 {
        self.cursor.frames_advanced()
    }

    /// Writes one frame's uniforms into its slot. Instances beyond
    /// [`MAX_ANCHOR_INSTANCES`] are ignored.
    pub fn write(
        &self,
        queue: &wgpu::Queue,
        slot: RingSlot,
        shared: &SharedUniforms,
        instances: &[InstanceUniforms],
    ) {
        queue.write_buffer(&self.shared_buffer, slot.shared_offset, bytemuck::bytes_of(shared));
        let n = instances.len().min(MAX_ANCHOR_INSTANCES);
        if n > 0 {
            queue.write_buffer(
                &self.instance_buffer,
                slot.instance_offset,
                bytemuck::cast_slice(&instances[..n]),
            );
        }
    }
}
