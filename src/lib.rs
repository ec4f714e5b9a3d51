//! Hierarchical dependency injection with per-scope singletons and host-aware visibility.
//!
//! # Simple use case
//!
//! ```
//! # use std::rc::Rc;
//! # use tiered_di::*;
//! struct Engine;
//!
//! struct Car {
//!     engine: Rc<Engine>,
//! }
//!
//! # fn main() -> Result<(), DiError> {
//! let injector = Injector::resolve_and_create([
//!     Binding::of::<Engine>().to_factory(|| Engine, []),
//!     Binding::of::<Car>().to_factory(
//!         |engine: Rc<Engine>| Car { engine },
//!         [Dependency::of::<Engine>()],
//!     ),
//! ])?;
//!
//! let car: Rc<Car> = injector.inject()?;
//! let engine: Rc<Engine> = injector.inject()?;
//! assert!(Rc::ptr_eq(&car.engine, &engine));
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! * Every token (a type or a name) is issued a [Key] with a small integer id by a process-wide
//!   registry. The id of [InjectorRef] is reserved: depending on it hands out a weak handle on
//!   the injector performing the lookup.
//! * A [ResolvedBinding] associates a key with one factory, or several for multi bindings, and the
//!   ordered [Dependency] list of each factory. Factories are plain closures taking up to 10
//!   parameters, each one either `Rc<T>` or `Option<Rc<T>>`.
//! * A [ProtoInjector] is the immutable template of a scope: the bindings with their
//!   [Visibility]. Up to 10 bindings are kept in fixed inline slots, larger scopes use vectors.
//!   The template is shared by every injector created from it.
//! * An [Injector] owns one lazily filled instance slot per binding and a weak link to its parent.
//!   Lookups walk up the parents: public bindings are visible to every child, private bindings
//!   only across a host boundary.
//!
//! Resolution is synchronous and single-threaded, instances are `Rc<dyn Any>`. A construction
//! counter bounds the number of constructions per lookup to the number of slots of the scope, so a
//! dependency cycle fails with [DiError::CyclicDependency] instead of overflowing the stack.

mod errors;
mod inject;
mod injector;
mod key;
mod resolve;
mod store;

use std::{any::Any, rc::Rc};

pub use errors::{ArgumentError, DiError, DynError, ResolutionPath};
pub use inject::{Argument, Arguments, Callable, MAX_ARITY};
pub use injector::{DependencyProvider, Injector, InjectorBuilder, InjectorRef};
pub use key::{Key, Token, TypeInfo, INJECTOR_KEY_ID};
pub use resolve::{
    resolve_bindings, Binding, Dependency, LowerBound, ResolvedBinding, ResolvedFactory,
    UpperBound,
};
pub use store::{BindingWithVisibility, ProtoInjector, Visibility, INLINE_CAPACITY};

/// A constructed object, shared between the injector cache and its consumers
pub type Instance = Rc<dyn Any>;
