//! In-process, single-threaded [`super::GraphicsDevice`] for tests.
//!
//! "GPU work" here is plain `Vec<u8>` mutation that completes the instant
//! it's issued; `EventQuery` is a `Cell<bool>` set by `execute`. This lets
//! the frame ring coordinator's (C8) state-machine tests exercise the full
//! record -> submit -> poll -> map -> unmap cycle without a real adapter,
//! matching this crate's ambient-stack note that pure modules get direct
//! unit tests while the ring needs *some* device to drive against.

use std::cell::{Cell, RefCell};

use super::{
    BufferDesc, BufferHandle, CommandList, DescriptorIndex, DescriptorTable, EventQuery,
    GraphicsDevice, PipelineHandle, ShaderFactory,
};

#[derive(Default)]
pub struct FakeDevice {
    buffers: RefCell<Vec<RefCell<Vec<u8>>>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: write directly into a buffer, standing in for a
    /// compute dispatch that would otherwise produce this output.
    pub fn seed(&self, buffer: BufferHandle, data: &[u8]) {
        let buffers = self.buffers.borrow();
        buffers[buffer.0 as usize].borrow_mut()[..data.len()].copy_from_slice(data);
    }

    pub fn read(&self, buffer: BufferHandle) -> Vec<u8> {
        self.buffers.borrow()[buffer.0 as usize].borrow().clone()
    }
}

impl GraphicsDevice for FakeDevice {
    type CommandList = FakeCommandList;
    type EventQuery = FakeEventQuery;

    fn create_buffer(&self, desc: BufferDesc) -> BufferHandle {
        let mut buffers = self.buffers.borrow_mut();
        let handle = BufferHandle(buffers.len() as u32);
        buffers.push(RefCell::new(vec![0u8; desc.size as usize]));
        handle
    }

    fn create_command_list(&self) -> Self::CommandList {
        FakeCommandList { ops: Vec::new() }
    }

    fn create_event_query(&self) -> Self::EventQuery {
        FakeEventQuery::default()
    }

    fn execute(&self, commands: Self::CommandList, query: &Self::EventQuery) {
        for op in commands.ops {
            match op {
                Op::Write { buffer, offset, data } => {
                    let buffers = self.buffers.borrow();
                    let mut target = buffers[buffer.0 as usize].borrow_mut();
                    let start = offset as usize;
                    target[start..start + data.len()].copy_from_slice(&data);
                }
                Op::ClearU32 { buffer, value } => {
                    let buffers = self.buffers.borrow();
                    let mut target = buffers[buffer.0 as usize].borrow_mut();
                    for chunk in target.chunks_exact_mut(4) {
                        chunk.copy_from_slice(&value.to_le_bytes());
                    }
                }
                Op::Copy {
                    dst,
                    dst_offset,
                    src,
                    src_offset,
                    size,
                } => {
                    let buffers = self.buffers.borrow();
                    let src_data = buffers[src.0 as usize].borrow()
                        [src_offset as usize..(src_offset + size) as usize]
                        .to_vec();
                    let mut dst_buf = buffers[dst.0 as usize].borrow_mut();
                    dst_buf[dst_offset as usize..(dst_offset + size) as usize]
                        .copy_from_slice(&src_data);
                }
            }
        }

        query.signaled.set(true);
    }

    fn poll_event_query(&self, query: &Self::EventQuery) -> bool {
        query.signaled.get()
    }

    fn reset_event_query(&self, query: &Self::EventQuery) {
        query.signaled.set(false);
    }

    fn map_buffer_read(&self, buffer: BufferHandle) -> Vec<u8> {
        self.read(buffer)
    }
}

enum Op {
    Write {
        buffer: BufferHandle,
        offset: u64,
        data: Vec<u8>,
    },
    ClearU32 {
        buffer: BufferHandle,
        value: u32,
    },
    Copy {
        dst: BufferHandle,
        dst_offset: u64,
        src: BufferHandle,
        src_offset: u64,
        size: u64,
    },
}

pub struct FakeCommandList {
    ops: Vec<Op>,
}

impl CommandList for FakeCommandList {
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        self.ops.push(Op::Write {
            buffer,
            offset,
            data: data.to_vec(),
        });
    }

    fn clear_buffer_u32(&mut self, buffer: BufferHandle, value: u32) {
        self.ops.push(Op::ClearU32 { buffer, value });
    }

    fn copy_buffer(
        &mut self,
        dst: BufferHandle,
        dst_offset: u64,
        src: BufferHandle,
        src_offset: u64,
        size: u64,
    ) {
        self.ops.push(Op::Copy {
            dst,
            dst_offset,
            src,
            src_offset,
            size,
        });
    }

    fn dispatch(&mut self, _pipeline: PipelineHandle, _groups: [u32; 3]) {}

    fn begin_marker(&mut self, _label: &str) {}

    fn end_marker(&mut self) {}
}

#[derive(Default)]
pub struct FakeEventQuery {
    signaled: Cell<bool>,
}

impl EventQuery for FakeEventQuery {}

#[derive(Default)]
pub struct FakeShaderFactory;

impl ShaderFactory for FakeShaderFactory {
    fn compile_compute(&self, _source: &str, _entry_point: &str) -> PipelineHandle {
        PipelineHandle(0)
    }
}

#[derive(Default)]
pub struct FakeDescriptorTable {
    slots: Vec<Option<BufferHandle>>,
    free: Vec<u32>,
}

impl DescriptorTable for FakeDescriptorTable {
    fn allocate(&mut self, buffer: BufferHandle) -> DescriptorIndex {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(buffer);
            return DescriptorIndex(index);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Some(buffer));
        DescriptorIndex(index)
    }

    fn free(&mut self, index: DescriptorIndex) {
        self.slots[index.0 as usize] = None;
        self.free.push(index.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let device = FakeDevice::new();
        let buffer = device.create_buffer(BufferDesc {
            size: 8,
            cpu_readable: true,
            label: "test",
        });

        let mut commands = device.create_command_list();
        commands.write_buffer(buffer, 0, &42u64.to_le_bytes());

        let query = device.create_event_query();
        device.execute(commands, &query);

        assert!(device.poll_event_query(&query));
        let data = device.map_buffer_read(buffer);
        assert_eq!(u64::from_le_bytes(data.try_into().unwrap()), 42);
    }

    #[test]
    fn clear_u32_fills_every_word() {
        let device = FakeDevice::new();
        let buffer = device.create_buffer(BufferDesc {
            size: 16,
            cpu_readable: true,
            label: "test",
        });

        let mut commands = device.create_command_list();
        commands.clear_buffer_u32(buffer, 0xFFFF_FFFF);
        let query = device.create_event_query();
        device.execute(commands, &query);

        let data = device.map_buffer_read(buffer);
        assert!(data.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn descriptor_table_reuses_freed_slots() {
        let mut table = FakeDescriptorTable::default();
        let a = table.allocate(BufferHandle(0));
        table.free(a);
        let b = table.allocate(BufferHandle(1));
        assert_eq!(a, b);
    }
}
