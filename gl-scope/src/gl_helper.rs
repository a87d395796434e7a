use crate::driver::{
    decode_log, AsHandle, AttribLayout, BufferTarget, Driver, Handle, ObjectKind, ShaderStage,
    Slot,
};
use crate::errors::{Error, Result};
use crate::gl_fancy::{BoundBuffer, BoundProgram, BoundVertexArray, GPUState};
use crate::shaders::ShaderSource;
use itertools::Itertools;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

fn allocate<D: Driver>(gpu: &GPUState<D>, kind: ObjectKind) -> Result<Handle> {
    let handle = gpu.driver().allocate(kind);
    if !handle.is_valid() {
        return Err(Error::Allocation(kind));
    }
    log::debug!("allocated {:?} {}", kind, handle);
    Ok(handle)
}

/// Drop the slot (if `handle` holds it) and hand the object back to the driver.
fn release<D: Driver>(gpu: &GPUState<D>, kind: ObjectKind, slot: Option<Slot>, handle: Handle) {
    if let Some(slot) = slot {
        if gpu.bindings().is_bound(slot, handle) {
            if let Err(e) = gpu.leave(slot, handle) {
                log::error!("malfunction unbinding {} before release: {}", handle, e);
            }
        }
    }
    gpu.driver().release(kind, handle);
    log::debug!("released {:?} {}", kind, handle);
}

//

/// A set of attribute descriptions. Attribute calls only work while this array is bound.
pub struct VertexArray<'g, D: Driver> {
    gpu: &'g GPUState<D>,
    handle: Handle,
    enabled: RefCell<BTreeSet<u32>>,
}

impl<'g, D: Driver> VertexArray<'g, D> {
    pub fn new(gpu: &'g GPUState<D>) -> Result<Self> {
        Ok(Self {
            gpu,
            handle: allocate(gpu, ObjectKind::VertexArray)?,
            enabled: Default::default(),
        })
    }

    pub(crate) fn live_handle(&self) -> Result<Handle> {
        if self.handle.is_valid() {
            Ok(self.handle)
        } else {
            Err(Error::UseAfterRelease(ObjectKind::VertexArray))
        }
    }

    fn bound_handle(&self) -> Result<Handle> {
        let handle = self.live_handle()?;
        let current = self.gpu.bindings().current(Slot::VertexArray);
        if current != handle {
            return Err(Error::NotBound {
                slot: Slot::VertexArray,
                handle,
                current,
            });
        }
        Ok(handle)
    }

    /// Binding a second vertex array while this scope lives is a [`Error::StateConflict`].
    pub fn bound(&self) -> Result<BoundVertexArray<'_, 'g, D>> {
        BoundVertexArray::new(self.gpu, self)
    }

    pub fn enable_attrib(&self, index: u32) -> Result<()> {
        self.bound_handle()?;
        self.gpu.driver().enable_attrib(index);
        self.enabled.borrow_mut().insert(index);
        Ok(())
    }

    pub fn disable_attrib(&self, index: u32) -> Result<()> {
        self.bound_handle()?;
        self.gpu.driver().disable_attrib(index);
        self.enabled.borrow_mut().remove(&index);
        Ok(())
    }

    /// Describe how attribute `layout.index` reads the currently bound array buffer.
    pub fn describe(&self, layout: &AttribLayout) -> Result<()> {
        self.bound_handle()?;
        self.gpu.driver().describe(layout);
        Ok(())
    }

    pub fn enabled_attribs(&self) -> Result<Vec<u32>> {
        self.live_handle()?;
        Ok(self.enabled.borrow().iter().copied().collect())
    }

    pub fn is_released(&self) -> bool {
        !self.handle.is_valid()
    }

    pub fn release(&mut self) -> Result<()> {
        let handle = self.live_handle()?;
        release(self.gpu, ObjectKind::VertexArray, Some(Slot::VertexArray), handle);
        self.handle = Handle::NONE;
        self.enabled.borrow_mut().clear();
        Ok(())
    }
}

impl<'g, D: Driver> AsHandle for VertexArray<'g, D> {
    fn as_handle(&self) -> Handle {
        self.handle
    }
}

impl<'g, D: Driver> Drop for VertexArray<'g, D> {
    fn drop(&mut self) {
        if self.handle.is_valid() {
            release(self.gpu, ObjectKind::VertexArray, Some(Slot::VertexArray), self.handle);
        }
    }
}

//

/// A block of driver-side storage. Data goes in through [`BoundBuffer`].
pub struct Buffer<'g, D: Driver> {
    gpu: &'g GPUState<D>,
    handle: Handle,
    len: Cell<usize>,
}

impl<'g, D: Driver> Buffer<'g, D> {
    pub fn new(gpu: &'g GPUState<D>) -> Result<Self> {
        Ok(Self {
            gpu,
            handle: allocate(gpu, ObjectKind::Buffer)?,
            len: Cell::new(0),
        })
    }

    pub(crate) fn live_handle(&self) -> Result<Handle> {
        if self.handle.is_valid() {
            Ok(self.handle)
        } else {
            Err(Error::UseAfterRelease(ObjectKind::Buffer))
        }
    }

    pub fn bound(&self, target: BufferTarget) -> Result<BoundBuffer<'_, 'g, D>> {
        BoundBuffer::new(self.gpu, self, target)
    }

    pub fn array_buffer(&self) -> Result<BoundBuffer<'_, 'g, D>> {
        self.bound(BufferTarget::Array)
    }

    pub fn element_buffer(&self) -> Result<BoundBuffer<'_, 'g, D>> {
        self.bound(BufferTarget::ElementArray)
    }

    /// Byte length after the last full upload.
    pub fn len(&self) -> usize {
        self.len.get()
    }

    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    pub(crate) fn set_len(&self, len: usize) {
        self.len.set(len)
    }

    pub fn is_released(&self) -> bool {
        !self.handle.is_valid()
    }

    pub fn release(&mut self) -> Result<()> {
        let handle = self.live_handle()?;
        release(self.gpu, ObjectKind::Buffer, None, handle);
        self.handle = Handle::NONE;
        self.len.set(0);
        Ok(())
    }
}

impl<'g, D: Driver> AsHandle for Buffer<'g, D> {
    fn as_handle(&self) -> Handle {
        self.handle
    }
}

impl<'g, D: Driver> Drop for Buffer<'g, D> {
    fn drop(&mut self) {
        if self.handle.is_valid() {
            release(self.gpu, ObjectKind::Buffer, None, self.handle);
        }
    }
}

//

/// A compiled unit ready to be attached to a program.
pub trait ShaderUnit: AsHandle {
    fn stage(&self) -> ShaderStage;
}

/// A unit compiled outside this crate.
impl AsHandle for (ShaderStage, Handle) {
    fn as_handle(&self) -> Handle {
        self.1
    }
}

impl ShaderUnit for (ShaderStage, Handle) {
    fn stage(&self) -> ShaderStage {
        self.0
    }
}

/// One compiled pipeline stage. A `Shader` only exists if compilation succeeded.
pub struct Shader<'g, D: Driver> {
    gpu: &'g GPUState<D>,
    handle: Handle,
    stage: ShaderStage,
    name: Option<String>,
}

impl<'g, D: Driver> Shader<'g, D> {
    pub fn compile(gpu: &'g GPUState<D>, stage: ShaderStage, source: &ShaderSource) -> Result<Self> {
        let (text, name) = source.resolve(gpu.loader())?;

        let unit = allocate(gpu, ObjectKind::Shader(stage))?;
        let driver = gpu.driver();
        driver.submit_source(unit, &text);
        if !driver.compile(unit) {
            let log = decode_log(&driver.shader_log(unit));
            driver.release(ObjectKind::Shader(stage), unit);
            log::debug!("{} {:?} failed to compile", stage, name);
            return Err(Error::Compile { stage, name, log });
        }

        Ok(Self {
            gpu,
            handle: unit,
            stage,
            name,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_released(&self) -> bool {
        !self.handle.is_valid()
    }

    /// Linking copies what it needs, so this is safe right after [`Program::link`].
    pub fn release(&mut self) -> Result<()> {
        if !self.handle.is_valid() {
            return Err(Error::UseAfterRelease(ObjectKind::Shader(self.stage)));
        }
        release(self.gpu, ObjectKind::Shader(self.stage), None, self.handle);
        self.handle = Handle::NONE;
        Ok(())
    }
}

impl<'g, D: Driver> AsHandle for Shader<'g, D> {
    fn as_handle(&self) -> Handle {
        self.handle
    }
}

impl<'g, D: Driver> ShaderUnit for Shader<'g, D> {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl<'g, D: Driver> Drop for Shader<'g, D> {
    fn drop(&mut self) {
        if self.handle.is_valid() {
            release(self.gpu, ObjectKind::Shader(self.stage), None, self.handle);
        }
    }
}

//

/// A linked, executable pipeline.
pub struct Program<'g, D: Driver> {
    gpu: &'g GPUState<D>,
    handle: Handle,
    stages: Vec<ShaderStage>,
    name: Option<String>,
}

impl<'g, D: Driver> Program<'g, D> {
    /// Attach, validate and link. The shaders are detached again afterwards and
    /// remain owned by the caller, who may release them as soon as this returns.
    pub fn link(
        gpu: &'g GPUState<D>,
        shaders: &[&dyn ShaderUnit],
        name: Option<&str>,
    ) -> Result<Self> {
        for shader in shaders {
            if !shader.as_handle().is_valid() {
                return Err(Error::UseAfterRelease(ObjectKind::Shader(shader.stage())));
            }
        }
        for required in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !shaders.iter().any(|s| s.stage() == required) {
                return Err(Error::LinkPrecondition(required));
            }
        }

        let program = allocate(gpu, ObjectKind::Program)?;
        let driver = gpu.driver();
        for shader in shaders {
            driver.attach(program, shader.as_handle());
        }
        driver.validate(program);
        let linked = driver.link(program);
        for shader in shaders {
            driver.detach(program, shader.as_handle());
        }

        if !linked {
            let log = decode_log(&driver.program_log(program));
            driver.release(ObjectKind::Program, program);
            return Err(Error::Link {
                name: name.map(str::to_string),
                log,
            });
        }

        let stages: Vec<ShaderStage> = shaders.iter().map(|s| s.stage()).collect();
        log::debug!(
            "linked program {} {:?} from [{}]",
            program,
            name,
            stages.iter().join(", ")
        );
        Ok(Self {
            gpu,
            handle: program,
            stages,
            name: name.map(str::to_string),
        })
    }

    pub(crate) fn live_handle(&self) -> Result<Handle> {
        if self.handle.is_valid() {
            Ok(self.handle)
        } else {
            Err(Error::UseAfterRelease(ObjectKind::Program))
        }
    }

    /// Stages that were attached when the program was linked.
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Occupy [`Slot::Program`] so draw calls and uniform updates go to this program.
    pub fn bound(&self) -> Result<BoundProgram<'_, 'g, D>> {
        BoundProgram::new(self.gpu, self)
    }

    pub fn uniform_location(&self, name: &str) -> Result<Option<i32>> {
        let handle = self.live_handle()?;
        Ok(self.gpu.driver().uniform_location(handle, name))
    }

    pub fn attrib_location(&self, name: &str) -> Result<Option<u32>> {
        let handle = self.live_handle()?;
        Ok(self.gpu.driver().attrib_location(handle, name))
    }

    pub fn is_released(&self) -> bool {
        !self.handle.is_valid()
    }

    pub fn release(&mut self) -> Result<()> {
        let handle = self.live_handle()?;
        release(self.gpu, ObjectKind::Program, Some(Slot::Program), handle);
        self.handle = Handle::NONE;
        Ok(())
    }
}

impl<'g, D: Driver> AsHandle for Program<'g, D> {
    fn as_handle(&self) -> Handle {
        self.handle
    }
}

impl<'g, D: Driver> Drop for Program<'g, D> {
    fn drop(&mut self) {
        if self.handle.is_valid() {
            release(self.gpu, ObjectKind::Program, Some(Slot::Program), self.handle);
        }
    }
}
