//! An in-memory [`Driver`] for tests: hands out increasing handles and records every call.

use crate::driver::{
    AttribLayout, BufferTarget, Driver, Handle, ObjectKind, ShaderStage, Slot, UniformValue, Usage,
};
use crate::errors::DriverError;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Allocate(ObjectKind, Handle),
    Release(ObjectKind, Handle),
    Bind(Slot, Handle),
    Upload(BufferTarget, Vec<u8>, Usage),
    UploadSub(BufferTarget, usize, Vec<u8>),
    EnableAttrib(u32),
    DisableAttrib(u32),
    Describe(AttribLayout),
    Submit(Handle, String),
    Compile(Handle),
    Attach(Handle, Handle),
    Detach(Handle, Handle),
    Validate(Handle),
    Link(Handle),
    SetUniform(i32, UniformValue),
}

#[derive(Default)]
pub struct RecordingDriver {
    calls: RefCell<Vec<Call>>,
    next: Cell<u32>,
    refuse_allocations: Cell<bool>,
    upload_failure: RefCell<Option<DriverError>>,
    stages: RefCell<HashMap<Handle, ShaderStage>>,
    compile_failures: RefCell<HashMap<ShaderStage, Vec<u8>>>,
    link_failure: RefCell<Option<Vec<u8>>>,
    uniforms: RefCell<HashMap<String, i32>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// The handle most recently sent to `slot`, if the slot was ever touched.
    pub fn last_bind(&self, slot: Slot) -> Option<Handle> {
        self.calls.borrow().iter().rev().find_map(|c| match c {
            Call::Bind(s, h) if *s == slot => Some(*h),
            _ => None,
        })
    }

    pub fn refuse_allocations(&self) {
        self.refuse_allocations.set(true);
    }

    pub fn fail_uploads(&self, error: DriverError) {
        *self.upload_failure.borrow_mut() = Some(error);
    }

    pub fn fail_compile(&self, stage: ShaderStage, log: &[u8]) {
        self.compile_failures
            .borrow_mut()
            .insert(stage, log.to_vec());
    }

    pub fn fail_link(&self, log: &[u8]) {
        *self.link_failure.borrow_mut() = Some(log.to_vec());
    }

    pub fn define_uniform(&self, name: &str, location: i32) {
        self.uniforms.borrow_mut().insert(name.to_string(), location);
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Driver for RecordingDriver {
    fn allocate(&self, kind: ObjectKind) -> Handle {
        if self.refuse_allocations.get() {
            return Handle::NONE;
        }
        self.next.set(self.next.get() + 1);
        let handle = Handle::new(self.next.get());
        if let ObjectKind::Shader(stage) = kind {
            self.stages.borrow_mut().insert(handle, stage);
        }
        self.record(Call::Allocate(kind, handle));
        handle
    }

    fn release(&self, kind: ObjectKind, handle: Handle) {
        self.record(Call::Release(kind, handle));
    }

    fn bind(&self, slot: Slot, handle: Handle) {
        self.record(Call::Bind(slot, handle));
    }

    fn upload(&self, target: BufferTarget, bytes: &[u8], usage: Usage) -> Result<(), DriverError> {
        self.record(Call::Upload(target, bytes.to_vec(), usage));
        match self.upload_failure.borrow().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn upload_sub(&self, target: BufferTarget, offset: usize, bytes: &[u8]) -> Result<(), DriverError> {
        self.record(Call::UploadSub(target, offset, bytes.to_vec()));
        match self.upload_failure.borrow().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn enable_attrib(&self, index: u32) {
        self.record(Call::EnableAttrib(index));
    }

    fn disable_attrib(&self, index: u32) {
        self.record(Call::DisableAttrib(index));
    }

    fn describe(&self, layout: &AttribLayout) {
        self.record(Call::Describe(*layout));
    }

    fn submit_source(&self, unit: Handle, text: &str) {
        self.record(Call::Submit(unit, text.to_string()));
    }

    fn compile(&self, unit: Handle) -> bool {
        self.record(Call::Compile(unit));
        let stage = self.stages.borrow().get(&unit).copied();
        match stage {
            Some(stage) => !self.compile_failures.borrow().contains_key(&stage),
            None => false,
        }
    }

    fn shader_log(&self, unit: Handle) -> Vec<u8> {
        let stage = self.stages.borrow().get(&unit).copied();
        stage
            .and_then(|stage| self.compile_failures.borrow().get(&stage).cloned())
            .unwrap_or_default()
    }

    fn attach(&self, program: Handle, unit: Handle) {
        self.record(Call::Attach(program, unit));
    }

    fn detach(&self, program: Handle, unit: Handle) {
        self.record(Call::Detach(program, unit));
    }

    fn validate(&self, program: Handle) {
        self.record(Call::Validate(program));
    }

    fn link(&self, program: Handle) -> bool {
        self.record(Call::Link(program));
        self.link_failure.borrow().is_none()
    }

    fn program_log(&self, _program: Handle) -> Vec<u8> {
        self.link_failure.borrow().clone().unwrap_or_default()
    }

    fn uniform_location(&self, _program: Handle, name: &str) -> Option<i32> {
        self.uniforms.borrow().get(name).copied()
    }

    fn attrib_location(&self, _program: Handle, name: &str) -> Option<u32> {
        self.uniforms.borrow().get(name).map(|&l| l as u32)
    }

    fn set_uniform(&self, location: i32, value: &UniformValue) {
        self.record(Call::SetUniform(location, *value));
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
