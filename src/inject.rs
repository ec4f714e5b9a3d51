use std::{any::type_name, any::Any, rc::Rc};

use crate::{errors::ArgumentError, Instance};

/// Highest number of dependencies a factory can declare
pub const MAX_ARITY: usize = 10;

/*
 * The following is used to call a factory with up to 10 resolved dependencies
 * inspired by https://nickbryan.co.uk/software/using-a-type-map-for-dependency-injection-in-rust/
 */

/// A Callable has a ```call``` function with a single argument and a single return type.
///
/// This trait is implemented for all functions with up to 10 arguments, using a tuple to
/// wrap them all in a single type.
pub trait Callable<Args, Ret>: 'static {
    fn call(&self, args: Args) -> Ret;
}

/// A tuple of parameters built from resolved dependency values, in declaration order
pub trait Arguments: Sized {
    /// Number of dependencies the tuple consumes
    const ARITY: usize;

    fn from_values(values: Vec<Option<Instance>>) -> Result<Self, ArgumentError>;
}

/// A single factory parameter.
///
/// Required dependencies are taken as `Rc<T>`, optional ones as `Option<Rc<T>>`.
pub trait Argument: Sized {
    fn from_value(value: Option<Instance>) -> Result<Self, ArgumentError>;
}

impl<T: Any> Argument for Rc<T> {
    fn from_value(value: Option<Instance>) -> Result<Self, ArgumentError> {
        let expected = type_name::<T>();
        value
            .ok_or(ArgumentError::Missing { expected })?
            .downcast::<T>()
            .map_err(|_| ArgumentError::Mismatch { expected })
    }
}

impl<T: Any> Argument for Option<Rc<T>> {
    fn from_value(value: Option<Instance>) -> Result<Self, ArgumentError> {
        value
            .map(|instance| {
                instance.downcast::<T>().map_err(|_| ArgumentError::Mismatch {
                    expected: type_name::<T>(),
                })
            })
            .transpose()
    }
}

macro_rules! callable_tuple ({ $($param:ident)* } => {
    impl<Func, Ret, $($param,)*> Callable<($($param,)*), Ret> for Func
    where
        Func: Fn($($param),*) -> Ret + 'static,
    {
        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Ret {
            (self)($($param,)*)
        }
    }

    // Convert the resolved values, one per parameter
    #[allow(clippy::unused_unit)]
    impl<$($param: Argument,)*> Arguments for ($($param,)*) {
        const ARITY: usize = <[&str]>::len(&[$(stringify!($param)),*]);

        #[inline]
        #[allow(unused_mut, unused_variables)]
        fn from_values(values: Vec<Option<Instance>>) -> Result<Self, ArgumentError> {
            let mut values = values.into_iter();
            Ok(($(<$param as Argument>::from_value(values.next().flatten())?,)*))
        }
    }
});

callable_tuple! {}
callable_tuple! { A }
callable_tuple! { A B }
callable_tuple! { A B C }
callable_tuple! { A B C D }
callable_tuple! { A B C D E }
callable_tuple! { A B C D E F }
callable_tuple! { A B C D E F G }
callable_tuple! { A B C D E F G H }
callable_tuple! { A B C D E F G H I }
callable_tuple! { A B C D E F G H I J }
