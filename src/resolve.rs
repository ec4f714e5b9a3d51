//! Resolved binding records consumed by the injector.
//!
//! A [ResolvedBinding] associates a [Key] with one or more [ResolvedFactory] (several for multi
//! bindings). Each factory declares the ordered list of [Dependency] that are resolved and handed
//! over as its parameters.
//!
//! [Binding] is the lightweight declaration used by the `resolve_and_*` entry points;
//! [resolve_bindings] turns a list of declarations into resolved records.

use std::{any::Any, collections::HashMap, fmt, rc::Rc};

use crate::{
    errors::{DiError, DynError},
    inject::{Arguments, Callable, MAX_ARITY},
    key::{Key, Token},
    Instance,
};

/// Lower bound of the lookup: where the walk starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LowerBound {
    #[default]
    Unbounded,
    /// Start at the parent of the requesting injector
    SkipSelf,
}

/// Upper bound of the lookup: how far up the walk may go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpperBound {
    #[default]
    Unbounded,
    /// Only the requesting injector
    SelfOnly,
    /// Stop at the host boundary
    Host,
}

/// A dependency of a factory
#[derive(Debug, Clone)]
pub struct Dependency {
    key: Key,
    optional: bool,
    lower_bound: LowerBound,
    upper_bound: UpperBound,
}

impl Dependency {
    pub fn new(token: impl Into<Token>) -> Self {
        Self::from_key(Key::get(token))
    }

    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::from_key(Key::of::<T>())
    }

    pub fn from_key(key: Key) -> Self {
        Dependency {
            key,
            optional: false,
            lower_bound: LowerBound::Unbounded,
            upper_bound: UpperBound::Unbounded,
        }
    }

    /// Resolve to an absent value instead of failing when no binding is reachable
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn skip_self(mut self) -> Self {
        self.lower_bound = LowerBound::SkipSelf;
        self
    }

    pub fn self_only(mut self) -> Self {
        self.upper_bound = UpperBound::SelfOnly;
        self
    }

    pub fn host(mut self) -> Self {
        self.upper_bound = UpperBound::Host;
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn lower_bound(&self) -> LowerBound {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> UpperBound {
        self.upper_bound
    }
}

type ErasedFactory = dyn Fn(Vec<Option<Instance>>) -> Result<Instance, DynError>;

/// A factory with its ordered dependency list
#[derive(Clone)]
pub struct ResolvedFactory {
    factory: Rc<ErasedFactory>,
    arity: usize,
    dependencies: Vec<Dependency>,
}

impl fmt::Debug for ResolvedFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFactory")
            .field("arity", &self.arity)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl ResolvedFactory {
    /// Wrap an infallible constructor.
    ///
    /// The parameters of `factory` receive the resolved `dependencies` in order.
    pub fn new<F, Args, T>(factory: F, dependencies: impl IntoIterator<Item = Dependency>) -> Self
    where
        F: Callable<Args, T>,
        Args: Arguments,
        T: Any,
    {
        let erased = move |values: Vec<Option<Instance>>| -> Result<Instance, DynError> {
            let args = Args::from_values(values)?;
            Ok(Rc::new(factory.call(args)) as Instance)
        };
        Self::from_erased(Rc::new(erased), Args::ARITY, dependencies)
    }

    /// Wrap a constructor which may fail
    pub fn fallible<F, Args, T, E>(
        factory: F,
        dependencies: impl IntoIterator<Item = Dependency>,
    ) -> Self
    where
        F: Callable<Args, Result<T, E>>,
        Args: Arguments,
        T: Any,
        E: Into<DynError>,
    {
        let erased = move |values: Vec<Option<Instance>>| -> Result<Instance, DynError> {
            let args = Args::from_values(values)?;
            let instance = factory.call(args).map_err(Into::into)?;
            Ok(Rc::new(instance) as Instance)
        };
        Self::from_erased(Rc::new(erased), Args::ARITY, dependencies)
    }

    /// A factory handing out clones of an existing value
    pub fn value<T: Any + Clone>(value: T) -> Self {
        Self::new(move || value.clone(), [])
    }

    fn from_erased(
        factory: Rc<ErasedFactory>,
        arity: usize,
        dependencies: impl IntoIterator<Item = Dependency>,
    ) -> Self {
        ResolvedFactory {
            factory,
            arity,
            dependencies: dependencies.into_iter().collect(),
        }
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invoke the factory with exactly one value per declared dependency
    pub(crate) fn invoke(&self, values: Vec<Option<Instance>>) -> Result<Instance, DynError> {
        (self.factory)(values)
    }
}

/// Immutable record associating a key with its factories
#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    key: Key,
    resolved_factories: Vec<ResolvedFactory>,
    multi_binding: bool,
}

impl ResolvedBinding {
    /// Build a validated record.
    ///
    /// A regular binding needs exactly one factory, a multi binding at least one, and every
    /// factory must declare as many dependencies as it takes parameters.
    pub fn new(
        key: Key,
        resolved_factories: Vec<ResolvedFactory>,
        multi_binding: bool,
    ) -> Result<Self, DiError> {
        match (multi_binding, resolved_factories.len()) {
            (_, 0) => return Err(DiError::invalid(&key, "no factory")),
            (false, n) if n > 1 => {
                return Err(DiError::invalid(
                    &key,
                    format!("{n} factories for a regular binding"),
                ))
            }
            _ => {}
        }
        for factory in &resolved_factories {
            let declared = factory.dependencies.len();
            if declared > MAX_ARITY {
                return Err(DiError::invalid(
                    &key,
                    format!("{declared} dependencies exceed the maximum of {MAX_ARITY}"),
                ));
            }
            if declared != factory.arity {
                return Err(DiError::invalid(
                    &key,
                    format!(
                        "{declared} dependencies declared for a factory taking {} parameters",
                        factory.arity
                    ),
                ));
            }
        }
        Ok(ResolvedBinding {
            key,
            resolved_factories,
            multi_binding,
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn resolved_factories(&self) -> &[ResolvedFactory] {
        &self.resolved_factories
    }

    pub fn is_multi_binding(&self) -> bool {
        self.multi_binding
    }
}

/// Declaration of a binding, normalized by [resolve_bindings]
#[derive(Debug, Clone)]
pub struct Binding {
    token: Token,
    factory: Option<ResolvedFactory>,
    multi: bool,
}

impl Binding {
    pub fn new(token: impl Into<Token>) -> Self {
        Binding {
            token: token.into(),
            factory: None,
            multi: false,
        }
    }

    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::new(Token::of::<T>())
    }

    pub fn to_factory<F, Args, T>(
        self,
        factory: F,
        dependencies: impl IntoIterator<Item = Dependency>,
    ) -> Self
    where
        F: Callable<Args, T>,
        Args: Arguments,
        T: Any,
    {
        self.to_resolved_factory(ResolvedFactory::new(factory, dependencies))
    }

    pub fn to_fallible_factory<F, Args, T, E>(
        self,
        factory: F,
        dependencies: impl IntoIterator<Item = Dependency>,
    ) -> Self
    where
        F: Callable<Args, Result<T, E>>,
        Args: Arguments,
        T: Any,
        E: Into<DynError>,
    {
        self.to_resolved_factory(ResolvedFactory::fallible(factory, dependencies))
    }

    pub fn to_value<T: Any + Clone>(self, value: T) -> Self {
        self.to_resolved_factory(ResolvedFactory::value(value))
    }

    pub fn to_resolved_factory(mut self, factory: ResolvedFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Contribute to a multi binding instead of replacing previous declarations
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}

/// Normalize declarations into resolved bindings.
///
/// Keeps the order in which keys are first declared. A later regular declaration replaces an
/// earlier one, multi declarations of a key are merged in declaration order.
pub fn resolve_bindings(
    bindings: impl IntoIterator<Item = Binding>,
) -> Result<Vec<ResolvedBinding>, DiError> {
    let mut resolved: Vec<ResolvedBinding> = Vec::new();
    let mut positions: HashMap<Key, usize> = HashMap::new();

    for binding in bindings {
        let key = Key::get(binding.token);
        let Some(factory) = binding.factory else {
            return Err(DiError::invalid(&key, "no factory was provided"));
        };
        let next = ResolvedBinding::new(key.clone(), vec![factory], binding.multi)?;

        let Some(&position) = positions.get(&key) else {
            positions.insert(key, resolved.len());
            resolved.push(next);
            continue;
        };

        let existing = &mut resolved[position];
        match (existing.multi_binding, next.multi_binding) {
            (true, true) => existing.resolved_factories.extend(next.resolved_factories),
            (false, false) => *existing = next,
            _ => return Err(DiError::MixingMultiBindingsWithRegularBindings(key)),
        }
    }

    Ok(resolved)
}
