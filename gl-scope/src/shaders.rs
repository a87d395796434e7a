use crate::driver::{Driver, ShaderStage};
use crate::errors::{Error, Result};
use crate::gl_fancy::GPUState;
use crate::gl_helper::{Program, Shader, ShaderUnit};
use itertools::Itertools;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::panic::Location;
use std::path::{Path, PathBuf};

/// Where the text of a shader comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShaderSource {
    Inline { text: String, name: Option<String> },
    File(PathBuf),
}

impl ShaderSource {
    /// Inline text named after the calling line, so compile errors point back at it.
    #[track_caller]
    pub fn inline(text: impl Into<String>) -> Self {
        Self::named(text, Location::caller().to_string())
    }

    pub fn named(text: impl Into<String>, name: impl Into<String>) -> Self {
        ShaderSource::Inline {
            text: text.into(),
            name: Some(name.into()),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        ShaderSource::File(path.into())
    }

    pub fn name(&self) -> Option<Cow<'_, str>> {
        match self {
            ShaderSource::Inline { name, .. } => name.as_deref().map(Cow::Borrowed),
            ShaderSource::File(path) => Some(path.to_string_lossy()),
        }
    }

    /// The text plus an identifier for error messages.
    pub(crate) fn resolve(&self, loader: &dyn SourceLoader) -> Result<(Cow<'_, str>, Option<String>)> {
        match self {
            ShaderSource::Inline { text, name } => Ok((Cow::Borrowed(text), name.clone())),
            ShaderSource::File(path) => {
                let text = loader
                    .load(path)
                    .map_err(|source| Error::SourceUnavailable {
                        path: path.clone(),
                        source,
                    })?;
                Ok((Cow::Owned(text), Some(path.display().to_string())))
            }
        }
    }
}

impl From<&str> for ShaderSource {
    fn from(text: &str) -> Self {
        ShaderSource::Inline {
            text: text.to_string(),
            name: None,
        }
    }
}

impl From<String> for ShaderSource {
    fn from(text: String) -> Self {
        ShaderSource::Inline { text, name: None }
    }
}

impl From<&Path> for ShaderSource {
    fn from(path: &Path) -> Self {
        ShaderSource::File(path.to_path_buf())
    }
}

impl From<PathBuf> for ShaderSource {
    fn from(path: PathBuf) -> Self {
        ShaderSource::File(path)
    }
}

//

/// Reads shader text referenced by path. Errors surface as [`Error::SourceUnavailable`].
pub trait SourceLoader {
    fn load(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads UTF-8 text from the filesystem.
#[derive(Copy, Clone, Debug, Default)]
pub struct FileSourceLoader;

impl SourceLoader for FileSourceLoader {
    fn load(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

impl<F> SourceLoader for F
where
    F: Fn(&Path) -> std::io::Result<String>,
{
    fn load(&self, path: &Path) -> std::io::Result<String> {
        self(path)
    }
}

//

/// Collects one source per stage, then compiles and links them in one go.
///
/// ```no_run
/// # use gl_scope::{GPUState, Driver, Result};
/// # fn demo<D: Driver>(gpu: &GPUState<D>) -> Result<()> {
/// let _program = gpu
///     .shader_builder()
///     .vertex("#version 330 core\nvoid main() { gl_Position = vec4(0.0); }")
///     .fragment(std::path::Path::new("shaders/flat.fs"))
///     .named("flat")
///     .build()?;
/// # Ok(()) }
/// ```
pub struct ShaderBuilder<'g, D: Driver> {
    gpu: &'g GPUState<D>,
    pending: BTreeMap<ShaderStage, ShaderSource>,
    name: Option<String>,
}

impl<'g, D: Driver> ShaderBuilder<'g, D> {
    pub fn new(gpu: &'g GPUState<D>) -> Self {
        Self {
            gpu,
            pending: BTreeMap::new(),
            name: None,
        }
    }

    #[track_caller]
    pub fn vertex(self, source: impl Into<ShaderSource>) -> Self {
        self.stage(ShaderStage::Vertex, source)
    }

    #[track_caller]
    pub fn fragment(self, source: impl Into<ShaderSource>) -> Self {
        self.stage(ShaderStage::Fragment, source)
    }

    #[track_caller]
    pub fn geometry(self, source: impl Into<ShaderSource>) -> Self {
        self.stage(ShaderStage::Geometry, source)
    }

    /// A later source for the same stage replaces the earlier one.
    #[track_caller]
    pub fn stage(mut self, stage: ShaderStage, source: impl Into<ShaderSource>) -> Self {
        let source = match source.into() {
            ShaderSource::Inline { text, name: None } => ShaderSource::Inline {
                text,
                name: Some(Location::caller().to_string()),
            },
            ShaderSource::File(path) => {
                if let Some(implied) = ShaderStage::implied_by_path(&path) {
                    if implied != stage {
                        log::warn!(
                            "{} loaded from {:?}, whose suffix suggests a {}",
                            stage,
                            path,
                            implied
                        );
                    }
                }
                ShaderSource::File(path)
            }
            other => other,
        };
        if let Some(previous) = self.pending.insert(stage, source) {
            log::debug!("{} replaced (was {:?})", stage, previous.name());
        }
        self
    }

    /// Names the program in link errors.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn pending_stages(&self) -> Vec<ShaderStage> {
        self.pending.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Compile every pending stage, stopping at the first failure, then link.
    /// The intermediate shaders are released when this returns.
    pub fn build(&self) -> Result<Program<'g, D>> {
        log::debug!(
            "building program {:?} from [{}]",
            self.name,
            self.pending.keys().join(", ")
        );
        let shaders = self
            .pending
            .iter()
            .map(|(stage, source)| Shader::compile(self.gpu, *stage, source))
            .collect::<Result<Vec<_>>>()?;
        let units: Vec<&dyn ShaderUnit> = shaders.iter().map(|s| s as &dyn ShaderUnit).collect();
        Program::link(self.gpu, &units, self.name.as_deref())
    }
}
