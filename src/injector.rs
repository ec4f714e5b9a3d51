use std::{
    any::{type_name, Any},
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use crate::{
    errors::DiError,
    key::{Key, Token, INJECTOR_KEY_ID},
    resolve::{
        resolve_bindings, Binding, Dependency, LowerBound, ResolvedBinding, ResolvedFactory,
        UpperBound,
    },
    store::{InstanceCache, ProtoInjector, Visibility},
    Instance,
};

/// Supplies values that are not backed by bindings, consulted before the regular lookup
pub trait DependencyProvider {
    /// Returns `None` to fall back to the regular lookup
    fn get_dependency(
        &self,
        injector: &Injector,
        binding: &ResolvedBinding,
        dependency: &Dependency,
    ) -> Option<Instance>;
}

/// Non-owning handle on the injector performing a lookup, handed out for dependencies on
/// [InjectorRef].
///
/// Objects cached by an injector can keep the handle without keeping that injector alive.
#[derive(Clone)]
pub struct InjectorRef(Weak<Injector>);

impl InjectorRef {
    /// The injector, unless its owner released it
    pub fn upgrade(&self) -> Option<Rc<Injector>> {
        self.0.upgrade()
    }
}

impl fmt::Debug for InjectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InjectorRef").field(&self.upgrade()).finish()
    }
}

/// Configure and create an [Injector] from a shared template
pub struct InjectorBuilder {
    proto: Rc<ProtoInjector>,
    parent: Weak<Injector>,
    is_host: bool,
    dependency_provider: Option<Rc<dyn DependencyProvider>>,
}

impl InjectorBuilder {
    pub fn new(proto: Rc<ProtoInjector>) -> Self {
        InjectorBuilder {
            proto,
            parent: Weak::new(),
            is_host: false,
            dependency_provider: None,
        }
    }

    /// Link to a parent scope. The child does not keep the parent alive.
    pub fn parent(mut self, parent: &Rc<Injector>) -> Self {
        self.parent = Rc::downgrade(parent);
        self
    }

    /// Mark the injector as sitting on a host boundary
    pub fn host(mut self, is_host: bool) -> Self {
        self.is_host = is_host;
        self
    }

    pub fn dependency_provider(mut self, provider: Rc<dyn DependencyProvider>) -> Self {
        self.dependency_provider = Some(provider);
        self
    }

    pub fn build(self) -> Rc<Injector> {
        let InjectorBuilder {
            proto,
            parent,
            is_host,
            dependency_provider,
        } = self;

        tracing::debug!(
            "Creating injector with {} bindings (host: {}, has parent: {})",
            proto.number_of_bindings(),
            is_host,
            parent.strong_count() > 0
        );

        Rc::new_cyclic(|this| Injector {
            objs: proto.create_cache(),
            proto,
            parent: RefCell::new(parent),
            is_host: Cell::new(is_host),
            construction_counter: Cell::new(0),
            constructing: Cell::new(0),
            dependency_provider,
            this: this.clone(),
        })
    }
}

/// A scope resolving tokens to lazily constructed, cached instances.
///
/// Lookups that miss in the own store walk up the parent chain, filtered by the visibility of
/// each binding and the host flag of each traversed injector.
pub struct Injector {
    proto: Rc<ProtoInjector>,
    objs: InstanceCache,
    parent: RefCell<Weak<Injector>>,
    is_host: Cell<bool>,
    /// Number of slot constructions since the last top-level lookup
    construction_counter: Cell<usize>,
    /// Slot constructions currently running on this injector
    constructing: Cell<usize>,
    dependency_provider: Option<Rc<dyn DependencyProvider>>,
    this: Weak<Injector>,
}

impl Injector {
    /// Normalize binding declarations
    pub fn resolve(
        bindings: impl IntoIterator<Item = Binding>,
    ) -> Result<Vec<ResolvedBinding>, DiError> {
        resolve_bindings(bindings)
    }

    /// Root injector from binding declarations
    pub fn resolve_and_create(
        bindings: impl IntoIterator<Item = Binding>,
    ) -> Result<Rc<Injector>, DiError> {
        Ok(Self::from_resolved_bindings(Self::resolve(bindings)?))
    }

    /// Root injector with all bindings public
    pub fn from_resolved_bindings(
        bindings: impl IntoIterator<Item = ResolvedBinding>,
    ) -> Rc<Injector> {
        let proto = ProtoInjector::from_resolved(bindings, Visibility::Public);
        Self::builder(Rc::new(proto)).build()
    }

    pub fn builder(proto: Rc<ProtoInjector>) -> InjectorBuilder {
        InjectorBuilder::new(proto)
    }

    /// Instance bound to `token` in this scope or a visible ancestor
    pub fn get(&self, token: impl Into<Token>) -> Result<Instance, DiError> {
        let key = Key::get(token);
        self.begin_top_level();
        self.get_by_key(
            &key,
            LowerBound::Unbounded,
            UpperBound::Unbounded,
            false,
            Visibility::PublicAndPrivate,
        )?
        .ok_or_else(|| DiError::no_binding(&key))
    }

    /// Like [Injector::get], but an unbound token yields `None`
    pub fn get_optional(&self, token: impl Into<Token>) -> Result<Option<Instance>, DiError> {
        let key = Key::get(token);
        self.begin_top_level();
        self.get_by_key(
            &key,
            LowerBound::Unbounded,
            UpperBound::Unbounded,
            true,
            Visibility::PublicAndPrivate,
        )
    }

    /// Typed lookup of a type token
    pub fn inject<T: Any>(&self) -> Result<Rc<T>, DiError> {
        downcast(&Key::of::<T>(), self.get(Token::of::<T>())?)
    }

    pub fn inject_optional<T: Any>(&self) -> Result<Option<Rc<T>>, DiError> {
        self.get_optional(Token::of::<T>())?
            .map(|instance| downcast(&Key::of::<T>(), instance))
            .transpose()
    }

    /// Cached instance of the slot at `index`, `None` if it was not constructed yet
    pub fn get_at(&self, index: usize) -> Result<Option<Instance>, DiError> {
        self.objs.obj_at_index(index)
    }

    pub fn parent(&self) -> Option<Rc<Injector>> {
        self.parent.borrow().upgrade()
    }

    pub fn is_host(&self) -> bool {
        self.is_host.get()
    }

    /// Re-link this injector below `parent`
    pub fn attach(&self, parent: &Rc<Injector>, is_host: bool) {
        *self.parent.borrow_mut() = Rc::downgrade(parent);
        self.is_host.set(is_host);
    }

    pub fn proto(&self) -> &Rc<ProtoInjector> {
        &self.proto
    }

    pub fn number_of_bindings(&self) -> usize {
        self.proto.number_of_bindings()
    }

    /// Child scope from binding declarations.
    ///
    /// The child only holds a weak link: the caller must keep this injector alive.
    pub fn resolve_and_create_child(
        &self,
        bindings: impl IntoIterator<Item = Binding>,
    ) -> Result<Rc<Injector>, DiError> {
        Ok(self.create_child_from_resolved(Self::resolve(bindings)?))
    }

    pub fn create_child_from_resolved(
        &self,
        bindings: impl IntoIterator<Item = ResolvedBinding>,
    ) -> Rc<Injector> {
        let proto = Rc::new(ProtoInjector::from_resolved(bindings, Visibility::Public));
        let builder = Self::builder(proto);
        match self.this.upgrade() {
            Some(this) => builder.parent(&this).build(),
            None => builder.build(),
        }
    }

    /// Construct a value from a declaration without caching it
    pub fn resolve_and_instantiate(&self, binding: Binding) -> Result<Instance, DiError> {
        let key = Key::get(binding.token().clone());
        let resolved = Self::resolve([binding])?
            .into_iter()
            .next()
            .ok_or_else(|| DiError::invalid(&key, "nothing to instantiate"))?;
        self.instantiate_resolved(&resolved)
    }

    /// Construct a value from a resolved binding without caching it
    pub fn instantiate_resolved(&self, binding: &ResolvedBinding) -> Result<Instance, DiError> {
        self.begin_top_level();
        tracing::trace!("Instantiating {} without caching", binding.key());
        self.instantiate_binding(binding, Visibility::PublicAndPrivate)
    }

    pub fn display_name(&self) -> String {
        let names: Vec<String> = (0..self.proto.number_of_bindings())
            .filter_map(|i| self.proto.binding_at_index(i).ok())
            .map(|binding| format!("\"{}\"", binding.key().display_name()))
            .collect();
        format!("Injector(bindings: [{}])", names.join(", "))
    }
}

// Construction
impl Injector {
    /// Reset the construction counters of this injector and its idle ancestors
    fn begin_top_level(&self) {
        if self.constructing.get() == 0 {
            self.construction_counter.set(0);
        }
        let mut ancestor = self.parent();
        while let Some(inj) = ancestor {
            if inj.constructing.get() == 0 {
                inj.construction_counter.set(0);
            }
            ancestor = inj.parent();
        }
    }

    /// Cached instance of the first slot bound to `key_id` that can see `visibility`,
    /// constructing it on first demand.
    ///
    /// `Ok(None)` when no such slot exists.
    fn obj_by_key_id(
        &self,
        key_id: usize,
        visibility: Visibility,
    ) -> Result<Option<Instance>, DiError> {
        let Some((index, binding, binding_visibility)) = self.proto.find(key_id, visibility) else {
            return Ok(None);
        };
        let slot = self.objs.slot(index)?;
        if let Some(instance) = slot.get() {
            return Ok(Some(instance.clone()));
        }
        let instance = self.new_instance(binding, binding_visibility)?;
        Ok(Some(slot.get_or_init(|| instance).clone()))
    }

    fn new_instance(
        &self,
        binding: &ResolvedBinding,
        visibility: Visibility,
    ) -> Result<Instance, DiError> {
        let count = self.construction_counter.get();
        self.construction_counter.set(count + 1);
        if count > self.objs.max_number_of_objects() {
            tracing::error!("Cyclic dependency detected while constructing {}", binding.key());
            return Err(DiError::cyclic(binding.key()));
        }

        tracing::trace!("Constructing {}", binding.key());
        self.constructing.set(self.constructing.get() + 1);
        let result = self.instantiate_binding(binding, visibility);
        self.constructing.set(self.constructing.get() - 1);
        result
    }

    fn instantiate_binding(
        &self,
        binding: &ResolvedBinding,
        visibility: Visibility,
    ) -> Result<Instance, DiError> {
        let factories = binding.resolved_factories();
        if binding.is_multi_binding() {
            let instances = factories
                .iter()
                .map(|factory| self.instantiate(binding, factory, visibility))
                .collect::<Result<Vec<Instance>, DiError>>()?;
            return Ok(Rc::new(instances) as Instance);
        }
        match factories.first() {
            Some(factory) => self.instantiate(binding, factory, visibility),
            None => Err(DiError::invalid(binding.key(), "no factory")),
        }
    }

    fn instantiate(
        &self,
        binding: &ResolvedBinding,
        factory: &ResolvedFactory,
        visibility: Visibility,
    ) -> Result<Instance, DiError> {
        let mut values = Vec::with_capacity(factory.dependencies().len());
        for dependency in factory.dependencies() {
            let value = self
                .get_by_dependency(binding, dependency, visibility)
                .map_err(|e| e.add_key(binding.key()))?;
            values.push(value);
        }

        factory.invoke(values).map_err(|cause| {
            tracing::debug!("Factory for {} failed: {}", binding.key(), cause);
            DiError::instantiation(binding.key(), cause)
        })
    }

    fn get_by_dependency(
        &self,
        binding: &ResolvedBinding,
        dependency: &Dependency,
        binding_visibility: Visibility,
    ) -> Result<Option<Instance>, DiError> {
        if let Some(provider) = &self.dependency_provider {
            if let Some(special) = provider.get_dependency(self, binding, dependency) {
                return Ok(Some(special));
            }
        }
        self.get_by_key(
            dependency.key(),
            dependency.lower_bound(),
            dependency.upper_bound(),
            dependency.is_optional(),
            binding_visibility,
        )
    }
}

// Lookup
impl Injector {
    fn get_by_key(
        &self,
        key: &Key,
        lower_bound: LowerBound,
        upper_bound: UpperBound,
        optional: bool,
        binding_visibility: Visibility,
    ) -> Result<Option<Instance>, DiError> {
        if key.id() == INJECTOR_KEY_ID {
            return Ok(Some(Rc::new(InjectorRef(self.this.clone())) as Instance));
        }

        match upper_bound {
            UpperBound::SelfOnly => self.get_by_key_self(key, optional, binding_visibility),
            UpperBound::Host => {
                self.get_by_key_host(key, optional, binding_visibility, lower_bound)
            }
            UpperBound::Unbounded => {
                self.get_by_key_default(key, optional, binding_visibility, lower_bound)
            }
        }
    }

    fn get_by_key_self(
        &self,
        key: &Key,
        optional: bool,
        binding_visibility: Visibility,
    ) -> Result<Option<Instance>, DiError> {
        match self.obj_by_key_id(key.id(), binding_visibility)? {
            Some(obj) => Ok(Some(obj)),
            None => throw_or_none(key, optional),
        }
    }

    fn get_by_key_host(
        &self,
        key: &Key,
        optional: bool,
        binding_visibility: Visibility,
        lower_bound: LowerBound,
    ) -> Result<Option<Instance>, DiError> {
        let mut inj = self.this.upgrade();

        if lower_bound == LowerBound::SkipSelf {
            if self.is_host() {
                return self.get_private_dependency(key, optional, self);
            }
            inj = self.parent();
        }

        while let Some(current) = inj {
            if let Some(obj) = current.obj_by_key_id(key.id(), binding_visibility)? {
                return Ok(Some(obj));
            }
            // Past the host only Private bindings of the host's parent are reachable
            if current.is_host() && current.parent().is_some() {
                return self.get_private_dependency(key, optional, &current);
            }
            inj = current.parent();
        }

        throw_or_none(key, optional)
    }

    fn get_private_dependency(
        &self,
        key: &Key,
        optional: bool,
        host: &Injector,
    ) -> Result<Option<Instance>, DiError> {
        let Some(parent) = host.parent() else {
            return throw_or_none(key, optional);
        };
        match parent.obj_by_key_id(key.id(), Visibility::Private)? {
            Some(obj) => Ok(Some(obj)),
            None => throw_or_none(key, optional),
        }
    }

    fn get_by_key_default(
        &self,
        key: &Key,
        optional: bool,
        mut binding_visibility: Visibility,
        lower_bound: LowerBound,
    ) -> Result<Option<Instance>, DiError> {
        let mut inj = self.this.upgrade();

        if lower_bound == LowerBound::SkipSelf {
            binding_visibility = crossing_visibility(self);
            inj = self.parent();
        }

        while let Some(current) = inj {
            if let Some(obj) = current.obj_by_key_id(key.id(), binding_visibility)? {
                return Ok(Some(obj));
            }
            binding_visibility = crossing_visibility(&current);
            inj = current.parent();
        }

        throw_or_none(key, optional)
    }
}

/// Visibility usable in the parent of `inj`: a host exposes private bindings of its parent
fn crossing_visibility(inj: &Injector) -> Visibility {
    if inj.is_host() {
        Visibility::PublicAndPrivate
    } else {
        Visibility::Public
    }
}

fn throw_or_none(key: &Key, optional: bool) -> Result<Option<Instance>, DiError> {
    if optional {
        Ok(None)
    } else {
        Err(DiError::no_binding(key))
    }
}

fn downcast<T: Any>(key: &Key, instance: Instance) -> Result<Rc<T>, DiError> {
    instance.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        key: key.clone(),
        expected: type_name::<T>(),
    })
}

impl fmt::Display for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.proto.number_of_bindings())
            .field("is_host", &self.is_host())
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}
