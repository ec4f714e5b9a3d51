//! Binding storage of an injector scope.
//!
//! A [ProtoInjector] is the immutable template of a scope: the ordered (binding, visibility)
//! pairs. Small scopes use an inline strategy with a fixed number of slots, larger scopes switch
//! to parallel vectors. Each injector created from the template owns an [InstanceCache] with one
//! lazily filled slot per binding.

use once_cell::unsync::OnceCell;

use crate::{errors::DiError, resolve::ResolvedBinding, Instance};

/// Number of slots of the inline strategy, also the cycle bound of inline injectors
pub const INLINE_CAPACITY: usize = 10;

/// Visibility of a binding towards child injectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Visible to regular (as opposed to host) child injectors
    #[default]
    Public,
    /// Visible to host child injectors only
    Private,
    /// Visible to both host and regular child injectors
    PublicAndPrivate,
}

impl Visibility {
    pub fn can_see(self, other: Visibility) -> bool {
        self == other
            || self == Visibility::PublicAndPrivate
            || other == Visibility::PublicAndPrivate
    }
}

/// A binding paired with its visibility, consumed by [ProtoInjector::new]
#[derive(Debug, Clone)]
pub struct BindingWithVisibility {
    pub binding: ResolvedBinding,
    pub visibility: Visibility,
}

impl BindingWithVisibility {
    pub fn new(binding: ResolvedBinding, visibility: Visibility) -> Self {
        Self {
            binding,
            visibility,
        }
    }

    fn key_id(&self) -> usize {
        self.binding.key().id()
    }
}

/// Lookup interface shared by both storage strategies
pub(crate) trait BindingStore {
    fn binding_count(&self) -> usize;

    /// Fails with [DiError::OutOfBounds] past the binding count
    fn binding_at_index(&self, index: usize) -> Result<&ResolvedBinding, DiError>;

    /// First slot bound to `key_id` whose visibility can see `visibility`
    fn find(
        &self,
        key_id: usize,
        visibility: Visibility,
    ) -> Option<(usize, &ResolvedBinding, Visibility)>;

    fn create_cache(&self) -> InstanceCache;
}

/// Fixed slots, scanned linearly
#[derive(Debug)]
pub(crate) struct InlineStrategy {
    len: usize,
    bindings: [Option<ResolvedBinding>; INLINE_CAPACITY],
    key_ids: [usize; INLINE_CAPACITY],
    visibilities: [Visibility; INLINE_CAPACITY],
}

impl InlineStrategy {
    fn new(bwv: &[BindingWithVisibility]) -> Self {
        debug_assert!(bwv.len() <= INLINE_CAPACITY);
        InlineStrategy {
            len: bwv.len(),
            bindings: std::array::from_fn(|i| bwv.get(i).map(|b| b.binding.clone())),
            key_ids: std::array::from_fn(|i| {
                bwv.get(i).map_or(usize::MAX, BindingWithVisibility::key_id)
            }),
            visibilities: std::array::from_fn(|i| {
                bwv.get(i).map_or_else(Visibility::default, |b| b.visibility)
            }),
        }
    }
}

impl BindingStore for InlineStrategy {
    fn binding_count(&self) -> usize {
        self.len
    }

    fn binding_at_index(&self, index: usize) -> Result<&ResolvedBinding, DiError> {
        match self.bindings.get(index) {
            Some(Some(binding)) if index < self.len => Ok(binding),
            _ => Err(DiError::OutOfBounds(index)),
        }
    }

    fn find(
        &self,
        key_id: usize,
        visibility: Visibility,
    ) -> Option<(usize, &ResolvedBinding, Visibility)> {
        for i in 0..self.len {
            if self.key_ids[i] == key_id && self.visibilities[i].can_see(visibility) {
                let binding = self.bindings[i].as_ref()?;
                return Some((i, binding, self.visibilities[i]));
            }
        }
        None
    }

    fn create_cache(&self) -> InstanceCache {
        InstanceCache::Inline {
            len: self.len,
            objs: Default::default(),
        }
    }
}

/// Parallel vectors for scopes larger than the inline capacity
#[derive(Debug)]
pub(crate) struct DynamicStrategy {
    bindings: Vec<ResolvedBinding>,
    key_ids: Vec<usize>,
    visibilities: Vec<Visibility>,
}

impl DynamicStrategy {
    fn new(bwv: &[BindingWithVisibility]) -> Self {
        DynamicStrategy {
            bindings: bwv.iter().map(|b| b.binding.clone()).collect(),
            key_ids: bwv.iter().map(BindingWithVisibility::key_id).collect(),
            visibilities: bwv.iter().map(|b| b.visibility).collect(),
        }
    }
}

impl BindingStore for DynamicStrategy {
    fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    fn binding_at_index(&self, index: usize) -> Result<&ResolvedBinding, DiError> {
        self.bindings.get(index).ok_or(DiError::OutOfBounds(index))
    }

    fn find(
        &self,
        key_id: usize,
        visibility: Visibility,
    ) -> Option<(usize, &ResolvedBinding, Visibility)> {
        self.key_ids
            .iter()
            .zip(&self.visibilities)
            .position(|(&id, v)| id == key_id && v.can_see(visibility))
            .map(|i| (i, &self.bindings[i], self.visibilities[i]))
    }

    fn create_cache(&self) -> InstanceCache {
        InstanceCache::Dynamic {
            objs: (0..self.bindings.len()).map(|_| OnceCell::new()).collect(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ProtoInjectorStrategy {
    Inline(InlineStrategy),
    Dynamic(DynamicStrategy),
}

impl ProtoInjectorStrategy {
    fn store(&self) -> &dyn BindingStore {
        match self {
            Self::Inline(inline) => inline,
            Self::Dynamic(dynamic) => dynamic,
        }
    }
}

/// Immutable template of an injector scope, shared by every injector created from it
#[derive(Debug)]
pub struct ProtoInjector {
    strategy: ProtoInjectorStrategy,
}

impl ProtoInjector {
    pub fn new(bwv: impl IntoIterator<Item = BindingWithVisibility>) -> Self {
        let bwv: Vec<BindingWithVisibility> = bwv.into_iter().collect();
        let strategy = if bwv.len() > INLINE_CAPACITY {
            ProtoInjectorStrategy::Dynamic(DynamicStrategy::new(&bwv))
        } else {
            ProtoInjectorStrategy::Inline(InlineStrategy::new(&bwv))
        };
        tracing::debug!(
            "Created proto injector with {} bindings using the {} strategy",
            bwv.len(),
            if bwv.len() > INLINE_CAPACITY { "dynamic" } else { "inline" }
        );
        ProtoInjector { strategy }
    }

    /// Template giving every binding the same visibility
    pub fn from_resolved(
        bindings: impl IntoIterator<Item = ResolvedBinding>,
        visibility: Visibility,
    ) -> Self {
        Self::new(
            bindings
                .into_iter()
                .map(|binding| BindingWithVisibility::new(binding, visibility)),
        )
    }

    pub fn number_of_bindings(&self) -> usize {
        self.store().binding_count()
    }

    pub fn binding_at_index(&self, index: usize) -> Result<&ResolvedBinding, DiError> {
        self.store().binding_at_index(index)
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.strategy, ProtoInjectorStrategy::Inline(_))
    }

    pub(crate) fn find(
        &self,
        key_id: usize,
        visibility: Visibility,
    ) -> Option<(usize, &ResolvedBinding, Visibility)> {
        self.store().find(key_id, visibility)
    }

    pub(crate) fn create_cache(&self) -> InstanceCache {
        self.store().create_cache()
    }

    fn store(&self) -> &dyn BindingStore {
        self.strategy.store()
    }
}

/// Per-injector instances, one slot per binding of the template
#[derive(Debug)]
pub(crate) enum InstanceCache {
    Inline {
        len: usize,
        objs: [OnceCell<Instance>; INLINE_CAPACITY],
    },
    Dynamic {
        objs: Vec<OnceCell<Instance>>,
    },
}

impl InstanceCache {
    pub(crate) fn slot(&self, index: usize) -> Result<&OnceCell<Instance>, DiError> {
        let slot = match self {
            Self::Inline { len, objs } if index < *len => objs.get(index),
            Self::Inline { .. } => None,
            Self::Dynamic { objs } => objs.get(index),
        };
        slot.ok_or(DiError::OutOfBounds(index))
    }

    /// Instance at `index`, `None` while the slot was not constructed yet
    pub(crate) fn obj_at_index(&self, index: usize) -> Result<Option<Instance>, DiError> {
        Ok(self.slot(index)?.get().cloned())
    }

    /// Construction bound before a cycle is assumed
    pub(crate) fn max_number_of_objects(&self) -> usize {
        match self {
            Self::Inline { .. } => INLINE_CAPACITY,
            Self::Dynamic { objs } => objs.len(),
        }
    }
}
