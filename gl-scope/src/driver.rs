use crate::errors::DriverError;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Opaque name of a driver-side object. `0` is never a live object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const NONE: Handle = Handle(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that can be resolved to a raw driver [`Handle`].
pub trait AsHandle {
    fn as_handle(&self) -> Handle;
}

impl AsHandle for Handle {
    fn as_handle(&self) -> Handle {
        *self
    }
}

//

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    CopyRead,
    CopyWrite,
    PixelPack,
    PixelUnpack,
    Texture,
    TransformFeedback,
    Uniform,
}

/// A binding point that at most one handle may occupy at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    VertexArray,
    Buffer(BufferTarget),
    Program,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    Compute,
}

impl ShaderStage {
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex shader",
            ShaderStage::Fragment => "fragment shader",
            ShaderStage::Geometry => "geometry shader",
            ShaderStage::Compute => "compute shader",
        }
    }

    /// The stage a file extension conventionally implies, if any.
    pub fn implied_by_path(path: &Path) -> Option<ShaderStage> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "vs" | "vert" => Some(ShaderStage::Vertex),
            "fs" | "frag" => Some(ShaderStage::Fragment),
            "gs" | "geom" => Some(ShaderStage::Geometry),
            "comp" => Some(ShaderStage::Compute),
            _ => None,
        }
    }
}

impl Display for ShaderStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The class of object passed to [`Driver::allocate`] and [`Driver::release`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    VertexArray,
    Buffer,
    Shader(ShaderStage),
    Program,
}

/// Advisory hint for how often uploaded data changes. No correctness effect.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Usage {
    StreamDraw,
    #[default]
    StaticDraw,
    DynamicDraw,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    HalfFloat,
    Float,
    Double,
}

impl ComponentType {
    pub const fn size_in_bytes(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort | ComponentType::HalfFloat => 2,
            ComponentType::Int | ComponentType::UnsignedInt | ComponentType::Float => 4,
            ComponentType::Double => 8,
        }
    }
}

/// Memory layout of one vertex attribute inside the currently bound array buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AttribLayout {
    /// the `location` of the attribute in the vertex shader
    pub index: u32,
    /// 3 for a vec3, 2 for a vec2
    pub components: i32,
    pub component_type: ComponentType,
    pub normalized: bool,
    /// bytes between the start of consecutive vertices; 0 means tightly packed
    pub stride: usize,
    /// bytes between the start of a vertex and this attribute's first component
    pub offset: usize,
}

impl AttribLayout {
    /// A tightly packed float attribute starting at byte 0, e.g. the xyz of [`crate::VertexData`].
    pub const fn packed_f32(index: u32, components: u8) -> Self {
        Self {
            index,
            components: components as i32,
            component_type: ComponentType::Float,
            normalized: false,
            stride: components as usize * ComponentType::Float.size_in_bytes(),
            offset: 0,
        }
    }

    /// `stride` and `offset` counted in floats, for interleaved data such as XYZUV rows.
    pub const fn interleaved_f32(index: u32, components: u8, stride: usize, offset: usize) -> Self {
        let float = ComponentType::Float.size_in_bytes();
        Self {
            index,
            components: components as i32,
            component_type: ComponentType::Float,
            normalized: false,
            stride: stride * float,
            offset: offset * float,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Int2([i32; 2]),
    Int3([i32; 3]),
    Int4([i32; 4]),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Bool(bool),
    /// column-major
    Mat4([f32; 16]),
}

//

/// The immediate-mode graphics API underneath this crate.
///
/// Every call is synchronous and happens on the thread that owns the context.
/// Implementations report allocation failure by returning [`Handle::NONE`];
/// binding discipline is enforced above this layer, not here.
pub trait Driver {
    fn allocate(&self, kind: ObjectKind) -> Handle;
    fn release(&self, kind: ObjectKind, handle: Handle);

    /// `Handle::NONE` unbinds the slot.
    fn bind(&self, slot: Slot, handle: Handle);

    fn upload(&self, target: BufferTarget, bytes: &[u8], usage: Usage) -> Result<(), DriverError>;
    fn upload_sub(&self, target: BufferTarget, offset: usize, bytes: &[u8]) -> Result<(), DriverError>;

    fn enable_attrib(&self, index: u32);
    fn disable_attrib(&self, index: u32);
    fn describe(&self, layout: &AttribLayout);

    fn submit_source(&self, unit: Handle, text: &str);
    /// `true` when compilation succeeded
    fn compile(&self, unit: Handle) -> bool;
    fn shader_log(&self, unit: Handle) -> Vec<u8>;

    fn attach(&self, program: Handle, unit: Handle);
    fn detach(&self, program: Handle, unit: Handle);
    fn validate(&self, program: Handle);
    /// `true` when linking succeeded
    fn link(&self, program: Handle) -> bool;
    fn program_log(&self, program: Handle) -> Vec<u8>;

    fn uniform_location(&self, program: Handle, name: &str) -> Option<i32>;
    fn attrib_location(&self, program: Handle, name: &str) -> Option<u32>;
    /// applies to the program currently occupying [`Slot::Program`]
    fn set_uniform(&self, location: i32, value: &UniformValue);
}

/// Turn a driver info log into text. Logs are usually NUL-terminated ASCII.
/// Only the NUL padding and one trailing line break are dropped.
pub(crate) fn decode_log(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let decoded = String::from_utf8_lossy(&raw[..end]);
    let text: &str = &decoded;
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text).to_string()
}
