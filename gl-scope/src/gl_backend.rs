//! [`Driver`] implementation on top of the `gl` crate.
//!
//! Every function here assumes a current OpenGL 3.3+ context on the calling thread.

use crate::driver::{
    AttribLayout, BufferTarget, ComponentType, Driver, Handle, ObjectKind, ShaderStage, Slot,
    UniformValue, Usage,
};
use crate::errors::DriverError;
use gl::types::{GLchar, GLenum, GLint, GLintptr, GLsizei, GLsizeiptr, GLuint};
use std::ffi::{c_void, CStr, CString};
use std::ptr::null;

pub fn explode_if_gl_error() -> Result<(), DriverError> {
    let mut last_err = None;
    loop {
        let err = unsafe { gl::GetError() };
        if err == gl::NO_ERROR {
            break;
        } else {
            last_err = Some(err);
        }
    }

    match last_err {
        Some(e) => Err(DriverError::new(e)),
        None => Ok(()),
    }
}

/// Discard errors left behind by earlier calls so they are not blamed on the next one.
fn drain_stale_errors() {
    if let Err(e) = explode_if_gl_error() {
        log::warn!("discarding stale GL error {}", e);
    }
}

/// A non-zero name is a live object even when the call raised an error.
fn allocation_outcome(kind: ObjectKind, raw: GLuint, status: Result<(), DriverError>) -> Handle {
    if let Err(e) = status {
        if raw == 0 {
            log::error!("allocating {:?}: {}", kind, e);
        } else {
            log::warn!("allocating {:?} raised {} but returned #{}", kind, e, raw);
        }
    }
    Handle::new(raw)
}

/// The byte offset of an attribute, spelled the way `glVertexAttribPointer` wants it.
/// Not a pointer; never dereference it.
fn gl_offset(offset: usize) -> *const c_void {
    offset as *const c_void
}

fn buffer_target(target: BufferTarget) -> GLenum {
    match target {
        BufferTarget::Array => gl::ARRAY_BUFFER,
        BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
        BufferTarget::CopyRead => gl::COPY_READ_BUFFER,
        BufferTarget::CopyWrite => gl::COPY_WRITE_BUFFER,
        BufferTarget::PixelPack => gl::PIXEL_PACK_BUFFER,
        BufferTarget::PixelUnpack => gl::PIXEL_UNPACK_BUFFER,
        BufferTarget::Texture => gl::TEXTURE_BUFFER,
        BufferTarget::TransformFeedback => gl::TRANSFORM_FEEDBACK_BUFFER,
        BufferTarget::Uniform => gl::UNIFORM_BUFFER,
    }
}

fn shader_flavor(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        ShaderStage::Geometry => gl::GEOMETRY_SHADER,
        ShaderStage::Compute => gl::COMPUTE_SHADER,
    }
}

fn usage_hint(usage: Usage) -> GLenum {
    match usage {
        Usage::StreamDraw => gl::STREAM_DRAW,
        Usage::StaticDraw => gl::STATIC_DRAW,
        Usage::DynamicDraw => gl::DYNAMIC_DRAW,
    }
}

fn type_code(ty: ComponentType) -> GLenum {
    match ty {
        ComponentType::Byte => gl::BYTE,
        ComponentType::UnsignedByte => gl::UNSIGNED_BYTE,
        ComponentType::Short => gl::SHORT,
        ComponentType::UnsignedShort => gl::UNSIGNED_SHORT,
        ComponentType::Int => gl::INT,
        ComponentType::UnsignedInt => gl::UNSIGNED_INT,
        ComponentType::HalfFloat => gl::HALF_FLOAT,
        ComponentType::Float => gl::FLOAT,
        ComponentType::Double => gl::DOUBLE,
    }
}

/// Info logs come back as `GLchar`s; `written` excludes the NUL terminator.
fn read_info_log(
    length: GLint,
    fetch: impl FnOnce(GLsizei, &mut GLsizei, *mut GLchar),
) -> Vec<u8> {
    if length <= 0 {
        return Vec::new();
    }
    let mut log = vec![0u8; length as usize];
    let mut written: GLsizei = 0;
    fetch(length, &mut written, log.as_mut_ptr() as *mut GLchar);
    log.truncate(written.clamp(0, length) as usize);
    log
}

//

/// The OpenGL driver. Holds no state of its own; the context is whatever is current.
#[derive(Copy, Clone, Debug, Default)]
pub struct GlDriver;

impl GlDriver {
    /// Load the GL entry points using the platform's `GetProcAddress`
    /// (e.g. `glutin`'s `display.get_proc_address`).
    pub fn load_with(loader: impl FnMut(&'static str) -> *const c_void) -> Self {
        gl::load_with(loader);
        Self
    }
}

impl Driver for GlDriver {
    fn allocate(&self, kind: ObjectKind) -> Handle {
        drain_stale_errors();
        let raw: GLuint = match kind {
            ObjectKind::VertexArray => {
                let mut rval = 0;
                unsafe { gl::GenVertexArrays(1, &mut rval) };
                rval
            }
            ObjectKind::Buffer => {
                let mut rval = 0;
                unsafe { gl::GenBuffers(1, &mut rval) };
                rval
            }
            ObjectKind::Shader(stage) => unsafe { gl::CreateShader(shader_flavor(stage)) },
            ObjectKind::Program => unsafe { gl::CreateProgram() },
        };
        allocation_outcome(kind, raw, explode_if_gl_error())
    }

    fn release(&self, kind: ObjectKind, handle: Handle) {
        let raw = handle.raw();
        unsafe {
            match kind {
                ObjectKind::VertexArray => gl::DeleteVertexArrays(1, &raw),
                ObjectKind::Buffer => gl::DeleteBuffers(1, &raw),
                ObjectKind::Shader(_) => gl::DeleteShader(raw),
                ObjectKind::Program => gl::DeleteProgram(raw),
            }
        }
    }

    fn bind(&self, slot: Slot, handle: Handle) {
        let raw = handle.raw();
        unsafe {
            match slot {
                Slot::VertexArray => gl::BindVertexArray(raw),
                Slot::Buffer(target) => gl::BindBuffer(buffer_target(target), raw),
                Slot::Program => gl::UseProgram(raw),
            }
        }
    }

    fn upload(&self, target: BufferTarget, bytes: &[u8], usage: Usage) -> Result<(), DriverError> {
        drain_stale_errors();
        unsafe {
            gl::BufferData(
                buffer_target(target),
                bytes.len() as GLsizeiptr,
                bytes.as_ptr() as *const c_void,
                usage_hint(usage),
            )
        }
        explode_if_gl_error()
    }

    fn upload_sub(&self, target: BufferTarget, offset: usize, bytes: &[u8]) -> Result<(), DriverError> {
        drain_stale_errors();
        unsafe {
            gl::BufferSubData(
                buffer_target(target),
                offset as GLintptr,
                bytes.len() as GLsizeiptr,
                bytes.as_ptr() as *const c_void,
            )
        }
        explode_if_gl_error()
    }

    fn enable_attrib(&self, index: u32) {
        unsafe { gl::EnableVertexAttribArray(index) }
    }

    fn disable_attrib(&self, index: u32) {
        unsafe { gl::DisableVertexAttribArray(index) }
    }

    fn describe(&self, layout: &AttribLayout) {
        let normalized = if layout.normalized { gl::TRUE } else { gl::FALSE };
        unsafe {
            gl::VertexAttribPointer(
                layout.index,
                layout.components,
                type_code(layout.component_type),
                normalized,
                layout.stride as GLsizei,
                gl_offset(layout.offset),
            )
        }
    }

    fn submit_source(&self, unit: Handle, text: &str) {
        let bytes = text.as_bytes();
        let strings = [bytes.as_ptr() as *const GLchar];
        let lengths = [bytes.len() as GLint];
        unsafe { gl::ShaderSource(unit.raw(), 1, strings.as_ptr(), lengths.as_ptr()) };
    }

    fn compile(&self, unit: Handle) -> bool {
        let mut is_compiled = 0;
        unsafe {
            gl::CompileShader(unit.raw());
            gl::GetShaderiv(unit.raw(), gl::COMPILE_STATUS, &mut is_compiled);
        }
        is_compiled != 0
    }

    fn shader_log(&self, unit: Handle) -> Vec<u8> {
        let mut max_length = 0;
        unsafe { gl::GetShaderiv(unit.raw(), gl::INFO_LOG_LENGTH, &mut max_length) };
        read_info_log(max_length, |len, written, buf| unsafe {
            gl::GetShaderInfoLog(unit.raw(), len, written, buf)
        })
    }

    fn attach(&self, program: Handle, unit: Handle) {
        unsafe { gl::AttachShader(program.raw(), unit.raw()) }
    }

    fn detach(&self, program: Handle, unit: Handle) {
        unsafe { gl::DetachShader(program.raw(), unit.raw()) }
    }

    fn validate(&self, program: Handle) {
        unsafe { gl::ValidateProgram(program.raw()) }
    }

    fn link(&self, program: Handle) -> bool {
        let mut link_status = 0;
        unsafe {
            gl::LinkProgram(program.raw());
            gl::GetProgramiv(program.raw(), gl::LINK_STATUS, &mut link_status);
        }
        link_status != 0
    }

    fn program_log(&self, program: Handle) -> Vec<u8> {
        let mut max_length = 0;
        unsafe { gl::GetProgramiv(program.raw(), gl::INFO_LOG_LENGTH, &mut max_length) };
        read_info_log(max_length, |len, written, buf| unsafe {
            gl::GetProgramInfoLog(program.raw(), len, written, buf)
        })
    }

    fn uniform_location(&self, program: Handle, name: &str) -> Option<i32> {
        let c_name = CString::new(name).ok()?;
        let rval = unsafe { gl::GetUniformLocation(program.raw(), c_name.as_ptr()) };
        (rval >= 0).then_some(rval)
    }

    fn attrib_location(&self, program: Handle, name: &str) -> Option<u32> {
        let c_name = CString::new(name).ok()?;
        let rval = unsafe { gl::GetAttribLocation(program.raw(), c_name.as_ptr()) };
        (rval >= 0).then_some(rval as u32)
    }

    fn set_uniform(&self, location: i32, value: &UniformValue) {
        unsafe {
            match *value {
                UniformValue::Int(v) => gl::Uniform1i(location, v),
                UniformValue::Int2([x, y]) => gl::Uniform2i(location, x, y),
                UniformValue::Int3([x, y, z]) => gl::Uniform3i(location, x, y, z),
                UniformValue::Int4([x, y, z, w]) => gl::Uniform4i(location, x, y, z, w),
                UniformValue::Float(v) => gl::Uniform1f(location, v),
                UniformValue::Float2([x, y]) => gl::Uniform2f(location, x, y),
                UniformValue::Float3([x, y, z]) => gl::Uniform3f(location, x, y, z),
                UniformValue::Float4([x, y, z, w]) => gl::Uniform4f(location, x, y, z, w),
                UniformValue::Bool(b) => gl::Uniform1i(location, b as GLint),
                UniformValue::Mat4(m) => gl::UniformMatrix4fv(location, 1, gl::FALSE, m.as_ptr()),
            }
        }
    }
}

//

/// Lowest driver debug severity forwarded to the `log` crate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DebugSeverity {
    /// everything, including notifications
    #[default]
    Any,
    Low,
    Medium,
    High,
}

fn severity_name(severity: GLenum) -> Option<(&'static str, log::Level)> {
    match severity {
        gl::DEBUG_SEVERITY_NOTIFICATION => Some(("NOTIFICATION", log::Level::Debug)),
        gl::DEBUG_SEVERITY_LOW => Some(("LOW", log::Level::Info)),
        gl::DEBUG_SEVERITY_MEDIUM => Some(("MEDIUM", log::Level::Warn)),
        gl::DEBUG_SEVERITY_HIGH => Some(("HIGH", log::Level::Error)),
        _ => None,
    }
}

extern "system" fn gl_debug_callback(
    _source: GLenum,
    _gltype: GLenum,
    id: GLuint,
    severity: GLenum,
    _length: GLsizei,
    message: *const GLchar,
    _user_param: *mut c_void,
) {
    if message.is_null() {
        return;
    }
    let msg = unsafe { CStr::from_ptr(message) }.to_string_lossy();
    match severity_name(severity) {
        Some((name, level)) => log::log!(target: "OpenGL", level, "[{}] {}: {}", name, id, msg),
        None => log::error!(target: "OpenGL", "[0x{:x}] {}: {}", severity, id, msg),
    }
}

/// Route driver debug output to `log`. Call once the context is current.
pub fn start_debug_logger(minimum: DebugSeverity) {
    unsafe {
        gl::Enable(gl::DEBUG_OUTPUT);
        // synchronous, so a message is logged before the offending call returns
        gl::Enable(gl::DEBUG_OUTPUT_SYNCHRONOUS);
    }
    if !gl::DebugMessageCallback::is_loaded() {
        log::error!("glDebugMessageCallback is unavailable, was the context created yet?");
        return;
    }
    unsafe {
        gl::DebugMessageCallback(Some(gl_debug_callback), null());
        // start from nothing, then open up from the requested severity upward
        gl::DebugMessageControl(gl::DONT_CARE, gl::DONT_CARE, gl::DONT_CARE, 0, null(), gl::FALSE);
        let levels: &[GLenum] = match minimum {
            DebugSeverity::Any => &[
                gl::DEBUG_SEVERITY_NOTIFICATION,
                gl::DEBUG_SEVERITY_LOW,
                gl::DEBUG_SEVERITY_MEDIUM,
                gl::DEBUG_SEVERITY_HIGH,
            ],
            DebugSeverity::Low => &[
                gl::DEBUG_SEVERITY_LOW,
                gl::DEBUG_SEVERITY_MEDIUM,
                gl::DEBUG_SEVERITY_HIGH,
            ],
            DebugSeverity::Medium => &[gl::DEBUG_SEVERITY_MEDIUM, gl::DEBUG_SEVERITY_HIGH],
            DebugSeverity::High => &[gl::DEBUG_SEVERITY_HIGH],
        };
        for &level in levels {
            gl::DebugMessageControl(gl::DONT_CARE, gl::DONT_CARE, level, 0, null(), gl::TRUE);
        }
    }
    if let Err(e) = explode_if_gl_error() {
        log::warn!("enabling debug output: {}", e);
    }
}
