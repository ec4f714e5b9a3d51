use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::key::Key;

/// Error raised by a factory
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Keys traversed while a failure bubbled up through nested constructions.
///
/// The first key is the one that failed, every following key is an enclosing construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPath {
    keys: Vec<Key>,
}

impl ResolutionPath {
    pub(crate) fn new(key: &Key) -> Self {
        Self {
            keys: vec![key.clone()],
        }
    }

    /// The key where the failure originated
    pub fn origin(&self) -> &Key {
        &self.keys[0]
    }

    /// The outermost construction, i.e. the token originally requested
    pub fn root(&self) -> &Key {
        &self.keys[self.keys.len() - 1]
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn push(&mut self, key: &Key) {
        self.keys.push(key.clone());
    }
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys.len() < 2 {
            return Ok(());
        }
        let chain: Vec<String> = self.keys.iter().rev().map(Key::to_string).collect();
        write!(f, " ({})", chain.join(" -> "))
    }
}

/// Errors triggered while storing, looking up or instantiating bindings
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// No binding reachable from the requesting scope
    #[error("No provider for {}!{}", .path.origin(), .path)]
    NoBinding { path: ResolutionPath },

    /// The construction counter exceeded the number of slots of the injector
    #[error("Cannot instantiate cyclic dependency!{path}")]
    CyclicDependency { path: ResolutionPath },

    /// A factory failed
    #[error(
        "Error during instantiation of {}!{} ORIGINAL ERROR: {}",
        .path.origin(),
        .path,
        .cause
    )]
    Instantiation {
        path: ResolutionPath,
        #[source]
        cause: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error("Index {0} is out-of-bounds.")]
    OutOfBounds(usize),

    #[error("Invalid binding for '{key}': {reason}")]
    InvalidBinding { key: Key, reason: String },

    #[error("Cannot mix multi bindings and regular bindings for '{0}'")]
    MixingMultiBindingsWithRegularBindings(Key),

    #[error("'{key}' resolved to an instance that is not a '{expected}'")]
    TypeMismatch { key: Key, expected: &'static str },
}

impl DiError {
    pub(crate) fn no_binding(key: &Key) -> Self {
        Self::NoBinding {
            path: ResolutionPath::new(key),
        }
    }

    pub(crate) fn cyclic(key: &Key) -> Self {
        Self::CyclicDependency {
            path: ResolutionPath::new(key),
        }
    }

    pub(crate) fn instantiation(key: &Key, cause: DynError) -> Self {
        Self::Instantiation {
            path: ResolutionPath::new(key),
            cause: Arc::from(cause),
        }
    }

    pub(crate) fn invalid(key: &Key, reason: impl Into<String>) -> Self {
        Self::InvalidBinding {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    /// Record an enclosing construction on errors that carry a resolution path.
    pub(crate) fn add_key(mut self, key: &Key) -> Self {
        if let Some(path) = self.path_mut() {
            path.push(key);
        }
        self
    }

    /// Resolution path of binding errors, `None` for structural errors
    pub fn path(&self) -> Option<&ResolutionPath> {
        match self {
            Self::NoBinding { path }
            | Self::CyclicDependency { path }
            | Self::Instantiation { path, .. } => Some(path),
            _ => None,
        }
    }

    fn path_mut(&mut self) -> Option<&mut ResolutionPath> {
        match self {
            Self::NoBinding { path }
            | Self::CyclicDependency { path }
            | Self::Instantiation { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Failures converting resolved values into typed factory parameters
#[derive(Error, Debug, Clone)]
pub enum ArgumentError {
    #[error("required dependency of type '{expected}' is absent")]
    Missing { expected: &'static str },
    #[error("dependency is not of type '{expected}'")]
    Mismatch { expected: &'static str },
}
