//! Binding discipline and shader pipeline construction over a stateful,
//! handle-based graphics driver.
//!
//! A [`GPUState`] owns the [`Driver`] and the [`BindingState`] that records
//! which object occupies each binding slot. Objects borrow the state, scoped
//! binds are guard values that free their slot on every exit path, and
//! [`ShaderBuilder`] turns per-stage sources into a linked [`Program`].
//!
//! ```no_run
//! # #[cfg(feature = "gl-backend")]
//! # fn demo(get_proc_address: impl FnMut(&'static str) -> *const std::ffi::c_void) -> gl_scope::Result<()> {
//! use gl_scope::{AttribLayout, GPUState, GlDriver, Usage, VertexData};
//!
//! let gpu = GPUState::new(GlDriver::load_with(get_proc_address));
//! let vao = gpu.create_vertex_array()?;
//! let vbo = gpu.create_buffer()?;
//!
//! let triangle = VertexData::new()
//!     .append_vertex(0.0, 1.0, 0.0)
//!     .append_vertex(-1.0, -1.0, 0.0)
//!     .append_vertex(1.0, -1.0, 0.0)
//!     .export_bytes()?;
//!
//! let bound_vbo = vbo.array_buffer()?;
//! bound_vbo.upload(&triangle, Usage::StaticDraw)?;
//! let bound_vao = vao.bound()?;
//! bound_vao.enable_attrib(0)?;
//! bound_vao.describe(&AttribLayout::packed_f32(0, 3))?;
//! # Ok(()) }
//! ```

pub mod driver;
pub mod errors;
pub mod gl_fancy;
pub mod gl_helper;
pub mod shaders;
pub mod vertex_data;

#[cfg(feature = "gl-backend")]
pub mod gl_backend;

#[cfg(test)]
mod recording_driver;

pub use driver::{
    AsHandle, AttribLayout, BufferTarget, ComponentType, Driver, Handle, ObjectKind, ShaderStage,
    Slot, UniformValue, Usage,
};
pub use errors::{DriverError, Error, Result, UploadFailure};
pub use gl_fancy::{BindingState, BoundBuffer, BoundProgram, BoundVertexArray, GPUState};
pub use gl_helper::{Buffer, Program, Shader, ShaderUnit, VertexArray};
pub use shaders::{FileSourceLoader, ShaderBuilder, ShaderSource, SourceLoader};
pub use vertex_data::VertexData;

#[cfg(feature = "gl-backend")]
pub use gl_backend::{start_debug_logger, DebugSeverity, GlDriver};
