use crate::driver::{AsHandle, BufferTarget, Driver, Handle, Slot, UniformValue, Usage};
use crate::errors::{Error, Result, UploadFailure};
use crate::gl_helper::{Buffer, Program, VertexArray};
use crate::shaders::{FileSourceLoader, ShaderBuilder, SourceLoader};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;

/// Which handle currently occupies each binding slot.
///
/// A slot that has never been bound reads as [`Handle::NONE`].
/// There is no lock: one context, one thread.
#[derive(Debug, Default)]
pub struct BindingState {
    slots: RefCell<HashMap<Slot, Handle>>,
}

impl BindingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, slot: Slot) -> Handle {
        self.slots.borrow().get(&slot).copied().unwrap_or_default()
    }

    pub fn is_bound(&self, slot: Slot, handle: Handle) -> bool {
        handle.is_valid() && self.current(slot) == handle
    }

    /// Occupy `slot`. Binding the handle that already occupies it is a no-op;
    /// any other occupant is a [`Error::StateConflict`] and is left in place.
    pub fn bind(&self, slot: Slot, handle: Handle) -> Result<()> {
        let mut slots = self.slots.borrow_mut();
        let current = slots.get(&slot).copied().unwrap_or_default();
        if current.is_valid() && current != handle {
            return Err(Error::StateConflict {
                slot,
                current,
                requested: handle,
            });
        }
        slots.insert(slot, handle);
        Ok(())
    }

    /// Vacate `slot`, which must be occupied by `handle`.
    pub fn unbind(&self, slot: Slot, handle: Handle) -> Result<()> {
        let mut slots = self.slots.borrow_mut();
        let current = slots.get(&slot).copied().unwrap_or_default();
        if current != handle || !handle.is_valid() {
            return Err(Error::StateMismatch {
                slot,
                current,
                expected: handle,
            });
        }
        slots.insert(slot, Handle::NONE);
        Ok(())
    }
}

//

/// One graphics context: the driver plus the bookkeeping of what is bound to it.
pub struct GPUState<D> {
    driver: D,
    bindings: BindingState,
    loader: Box<dyn SourceLoader>,
}

impl<D: Driver> GPUState<D> {
    pub fn new(driver: D) -> Self {
        Self::with_loader(driver, FileSourceLoader)
    }

    pub fn with_loader(driver: D, loader: impl SourceLoader + 'static) -> Self {
        Self {
            driver,
            bindings: BindingState::new(),
            loader: Box::new(loader),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn bindings(&self) -> &BindingState {
        &self.bindings
    }

    pub fn loader(&self) -> &dyn SourceLoader {
        self.loader.as_ref()
    }

    pub fn create_vertex_array(&self) -> Result<VertexArray<'_, D>> {
        VertexArray::new(self)
    }

    pub fn create_buffer(&self) -> Result<Buffer<'_, D>> {
        Buffer::new(self)
    }

    pub fn shader_builder(&self) -> ShaderBuilder<'_, D> {
        ShaderBuilder::new(self)
    }

    /// Record `handle` in `slot`, then tell the driver.
    /// Returns whether this call was the one that occupied the slot.
    pub(crate) fn enter(&self, slot: Slot, handle: Handle) -> Result<bool> {
        let fresh = !self.bindings.is_bound(slot, handle);
        self.bindings.bind(slot, handle)?;
        if fresh {
            log::trace!("bind {:?} <- {}", slot, handle);
            self.driver.bind(slot, handle);
        }
        Ok(fresh)
    }

    /// Vacate `slot` in the bookkeeping and the driver. A slot that someone
    /// else has taken over in the meantime is left alone in both.
    pub(crate) fn leave(&self, slot: Slot, handle: Handle) -> Result<()> {
        log::trace!("unbind {:?} ({})", slot, handle);
        let rval = self.bindings.unbind(slot, handle);
        if rval.is_ok() || !self.bindings.current(slot).is_valid() {
            self.driver.bind(slot, Handle::NONE);
        }
        rval
    }
}

//

/// A scope guard shared by all the `Bound*` types: releases the slot when dropped.
struct SlotGuard<'g, D: Driver> {
    gpu: &'g GPUState<D>,
    slot: Slot,
    handle: Handle,
    owned: bool,
}

impl<'g, D: Driver> SlotGuard<'g, D> {
    fn acquire(gpu: &'g GPUState<D>, slot: Slot, handle: Handle) -> Result<Self> {
        let owned = gpu.enter(slot, handle)?;
        Ok(Self {
            gpu,
            slot,
            handle,
            owned,
        })
    }

    fn release(&mut self) -> Result<()> {
        if !std::mem::replace(&mut self.owned, false) {
            return Ok(());
        }
        self.gpu.leave(self.slot, self.handle)
    }
}

impl<'g, D: Driver> Drop for SlotGuard<'g, D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("malfunction releasing {:?}: {}", self.slot, e);
        }
    }
}

//

/// A vertex array occupying [`Slot::VertexArray`] for as long as this value lives.
pub struct BoundVertexArray<'a, 'g, D: Driver> {
    vertex_array: &'a VertexArray<'g, D>,
    guard: SlotGuard<'g, D>,
}

impl<'a, 'g, D: Driver> BoundVertexArray<'a, 'g, D> {
    pub(crate) fn new(gpu: &'g GPUState<D>, vertex_array: &'a VertexArray<'g, D>) -> Result<Self> {
        let guard = SlotGuard::acquire(gpu, Slot::VertexArray, vertex_array.live_handle()?)?;
        Ok(Self {
            vertex_array,
            guard,
        })
    }

    /// Release the slot now, reporting what dropping would only log.
    pub fn unbind(mut self) -> Result<()> {
        self.guard.release()
    }
}

impl<'a, 'g, D: Driver> Deref for BoundVertexArray<'a, 'g, D> {
    type Target = VertexArray<'g, D>;

    fn deref(&self) -> &Self::Target {
        self.vertex_array
    }
}

//

/// A buffer bound to one [`BufferTarget`]; the only way to put data into a [`Buffer`].
pub struct BoundBuffer<'a, 'g, D: Driver> {
    buffer: &'a Buffer<'g, D>,
    target: BufferTarget,
    guard: SlotGuard<'g, D>,
}

impl<'a, 'g, D: Driver> BoundBuffer<'a, 'g, D> {
    pub(crate) fn new(
        gpu: &'g GPUState<D>,
        buffer: &'a Buffer<'g, D>,
        target: BufferTarget,
    ) -> Result<Self> {
        let guard = SlotGuard::acquire(gpu, Slot::Buffer(target), buffer.live_handle()?)?;
        Ok(Self {
            buffer,
            target,
            guard,
        })
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn buffer(&self) -> &Buffer<'g, D> {
        self.buffer
    }

    fn check_upload(&self, bytes: &[u8]) -> std::result::Result<(), UploadFailure> {
        if !self.is_still_bound() {
            return Err(UploadFailure::NotBound);
        }
        if bytes.is_empty() {
            return Err(UploadFailure::Empty);
        }
        Ok(())
    }

    fn is_still_bound(&self) -> bool {
        self.guard
            .gpu
            .bindings()
            .is_bound(Slot::Buffer(self.target), self.buffer.as_handle())
    }

    fn upload_error(&self, reason: UploadFailure) -> Error {
        Error::Upload {
            target: self.target,
            reason,
        }
    }

    /// Replace the whole store with `bytes`.
    pub fn upload(&self, bytes: &[u8], usage: Usage) -> Result<()> {
        self.check_upload(bytes)
            .map_err(|reason| self.upload_error(reason))?;
        self.guard
            .gpu
            .driver()
            .upload(self.target, bytes, usage)
            .map_err(|e| self.upload_error(e.into()))?;
        self.buffer.set_len(bytes.len());
        log::debug!(
            "uploaded {} bytes to {} ({:?}, {:?})",
            bytes.len(),
            self.buffer.as_handle(),
            self.target,
            usage
        );
        Ok(())
    }

    pub fn upload_slice<T: bytemuck::Pod>(&self, values: &[T], usage: Usage) -> Result<()> {
        self.upload(bytemuck::cast_slice(values), usage)
    }

    /// Overwrite part of the store created by the last [`Self::upload`].
    pub fn upload_sub(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check_upload(bytes)
            .map_err(|reason| self.upload_error(reason))?;
        let size = self.buffer.len();
        if offset.checked_add(bytes.len()).map_or(true, |end| end > size) {
            return Err(self.upload_error(UploadFailure::OutOfRange {
                offset,
                len: bytes.len(),
                size,
            }));
        }
        self.guard
            .gpu
            .driver()
            .upload_sub(self.target, offset, bytes)
            .map_err(|e| self.upload_error(e.into()))
    }

    pub fn unbind(mut self) -> Result<()> {
        self.guard.release()
    }
}

//

/// A program in use for drawing; uniforms can only be set through this.
pub struct BoundProgram<'a, 'g, D: Driver> {
    program: &'a Program<'g, D>,
    guard: SlotGuard<'g, D>,
}

impl<'a, 'g, D: Driver> BoundProgram<'a, 'g, D> {
    pub(crate) fn new(gpu: &'g GPUState<D>, program: &'a Program<'g, D>) -> Result<Self> {
        let guard = SlotGuard::acquire(gpu, Slot::Program, program.live_handle()?)?;
        Ok(Self { program, guard })
    }

    pub fn set_uniform(&self, name: &str, value: UniformValue) -> Result<()> {
        match self.program.uniform_location(name)? {
            Some(location) => {
                self.set_uniform_at(location, value);
                Ok(())
            }
            None => {
                log::warn!("no uniform named {:?} in {}", name, self.program.as_handle());
                Err(Error::UnknownUniform {
                    program: self.program.as_handle(),
                    name: name.to_string(),
                })
            }
        }
    }

    pub fn set_uniform_at(&self, location: i32, value: UniformValue) {
        self.guard.gpu.driver().set_uniform(location, &value);
    }

    pub fn unbind(mut self) -> Result<()> {
        self.guard.release()
    }
}

impl<'a, 'g, D: Driver> Deref for BoundProgram<'a, 'g, D> {
    type Target = Program<'g, D>;

    fn deref(&self) -> &Self::Target {
        self.program
    }
}
