//! Shader sources, addressed by logical name.
//!
//! The pipeline asks for each stage by [`ShaderName`]; the built-in WGSL can
//! be replaced per name before a session is started.

use std::collections::HashMap;
use std::fmt;

use crate::error::ShaderError;

pub const FULLSCREEN_VERTEX: &str = include_str!("shaders/fullscreen.vert.wgsl");
pub const INIT_FRAGMENT: &str = include_str!("shaders/init.frag.wgsl");
pub const UPDATE_FRAGMENT: &str = include_str!("shaders/update.frag.wgsl");
pub const RENDER_VERTEX: &str = include_str!("shaders/render.vert.wgsl");
pub const RENDER_FRAGMENT: &str = include_str!("shaders/render.frag.wgsl");

/// Pipeline stage of a shader source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => write!(f, "vertex"),
            StageKind::Fragment => write!(f, "fragment"),
        }
    }
}

/// Logical name of every shader source the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderName {
    InitVertex,
    InitFragment,
    UpdateVertex,
    UpdateFragment,
    RenderVertex,
    RenderFragment,
}

impl ShaderName {
    pub const ALL: [ShaderName; 6] = [
        ShaderName::InitVertex,
        ShaderName::InitFragment,
        ShaderName::UpdateVertex,
        ShaderName::UpdateFragment,
        ShaderName::RenderVertex,
        ShaderName::RenderFragment,
    ];

    /// Stable key, also accepted by [`ShaderName::from_key`].
    pub fn key(self) -> &'static str {
        match self {
            ShaderName::InitVertex => "init_vertex",
            ShaderName::InitFragment => "init_fragment",
            ShaderName::UpdateVertex => "update_vertex",
            ShaderName::UpdateFragment => "update_fragment",
            ShaderName::RenderVertex => "render_vertex",
            ShaderName::RenderFragment => "render_fragment",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.key() == key)
    }

    pub fn stage(self) -> StageKind {
        match self {
            ShaderName::InitVertex | ShaderName::UpdateVertex | ShaderName::RenderVertex => {
                StageKind::Vertex
            }
            ShaderName::InitFragment | ShaderName::UpdateFragment | ShaderName::RenderFragment => {
                StageKind::Fragment
            }
        }
    }
}

/// Map from [`ShaderName`] to WGSL source text.
#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    sources: HashMap<ShaderName, String>,
}

impl ShaderLibrary {
    /// An empty library. Every lookup fails until sources are added.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The shaders shipped with the crate.
    ///
    /// Init and update share one full-target vertex stage.
    pub fn builtin() -> Self {
        Self::empty()
            .with_source(ShaderName::InitVertex, FULLSCREEN_VERTEX)
            .with_source(ShaderName::InitFragment, INIT_FRAGMENT)
            .with_source(ShaderName::UpdateVertex, FULLSCREEN_VERTEX)
            .with_source(ShaderName::UpdateFragment, UPDATE_FRAGMENT)
            .with_source(ShaderName::RenderVertex, RENDER_VERTEX)
            .with_source(ShaderName::RenderFragment, RENDER_FRAGMENT)
    }

    /// Register or replace the source for `name`.
    pub fn with_source(mut self, name: ShaderName, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: ShaderName, source: impl Into<String>) {
        self.sources.insert(name, source.into());
    }

    pub fn get(&self, name: ShaderName) -> Result<&str, ShaderError> {
        self.sources
            .get(&name)
            .map(String::as_str)
            .ok_or(ShaderError::MissingSource(name))
    }

    /// Vertex and fragment source of one program.
    pub fn pair(&self, vertex: ShaderName, fragment: ShaderName) -> Result<(&str, &str), ShaderError> {
        Ok((self.get(vertex)?, self.get(fragment)?))
    }
}
