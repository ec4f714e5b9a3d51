//! Token identities.
//!
//! Every distinct [Token] is issued exactly one [Key] for the lifetime of the process.
//! Keys carry a small integer id which the binding stores compare instead of the token itself.

use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use once_cell::sync::Lazy;

use crate::injector::InjectorRef;

/// Id reserved for the [InjectorRef] handle, issued when the registry is created
pub const INJECTOR_KEY_ID: usize = 0;

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}

impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Opaque identifier a binding is registered under: a type or a name
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Token {
    Type(TypeInfo),
    Name(Arc<str>),
}

impl Token {
    pub fn of<T: 'static + ?Sized>() -> Token {
        Token::Type(TypeInfo::of::<T>())
    }

    pub fn named(name: impl Into<Arc<str>>) -> Token {
        Token::Name(name.into())
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::Name(name.into())
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::Name(name.into())
    }
}

impl From<TypeInfo> for Token {
    fn from(info: TypeInfo) -> Self {
        Token::Type(info)
    }
}

impl From<&Key> for Token {
    fn from(key: &Key) -> Self {
        key.token.clone()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type(info) => f.write_str(info.type_name),
            Token::Name(name) => f.write_str(name),
        }
    }
}

/// Unique identity of a token.
///
/// Keys compare by id: two keys are equal only if the registry issued them for the same token.
#[derive(Debug, Clone)]
pub struct Key {
    token: Token,
    id: usize,
}

impl Key {
    /// Retrieve the key of a token from the process-wide registry, issuing it on first use.
    pub fn get(token: impl Into<Token>) -> Key {
        registry().get(token.into())
    }

    pub fn of<T: 'static + ?Sized>() -> Key {
        Key::get(Token::of::<T>())
    }

    /// Number of keys issued by the process-wide registry
    pub fn number_of_keys() -> usize {
        registry().number_of_keys()
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn display_name(&self) -> String {
        self.token.to_string()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.token.fmt(f)
    }
}

/// Append-only map from tokens to keys, only reachable through [Key::get]
#[derive(Debug)]
pub(crate) struct KeyRegistry {
    all_keys: HashMap<Token, Key>,
}

impl KeyRegistry {
    /// Create a registry holding only the reserved [InjectorRef] key
    pub(crate) fn new() -> Self {
        let mut registry = KeyRegistry {
            all_keys: HashMap::new(),
        };
        let injector = registry.get(Token::of::<InjectorRef>());
        debug_assert_eq!(injector.id, INJECTOR_KEY_ID);
        registry
    }

    pub(crate) fn get(&mut self, token: Token) -> Key {
        if let Some(key) = self.all_keys.get(&token) {
            return key.clone();
        }
        let key = Key {
            token: token.clone(),
            id: self.all_keys.len(),
        };
        self.all_keys.insert(token, key.clone());
        key
    }

    pub(crate) fn number_of_keys(&self) -> usize {
        self.all_keys.len()
    }
}

static KEY_REGISTRY: Lazy<Mutex<KeyRegistry>> = Lazy::new(|| Mutex::new(KeyRegistry::new()));

fn registry() -> MutexGuard<'static, KeyRegistry> {
    // The registry is append-only, a panic elsewhere cannot leave it half-written
    KEY_REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}
