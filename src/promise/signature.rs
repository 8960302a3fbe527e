//! Function profiling and argument binding.
//!
//! Closures become promise bodies through [`PromiseFn`], which records a
//! [`Signature`]: the input positions and the result profile. Profiling is
//! resolved per closure shape, while binding (matching supplied values or a
//! predecessor's results against the inputs) stays a runtime check, so a
//! mismatched composition fails where it is written, not where it runs.

use super::error::Error;
use super::value::{TypeDesc, Value, ValueType};

/// How one input position of a promise body binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgDesc {
    /// Takes exactly one value of the described type.
    Fixed(TypeDesc),
    /// Trailing variadic position; absorbs any number of values of the
    /// described element type.
    Variadic(TypeDesc),
}

/// The shape of a promise body: input positions, result types, and whether
/// the body carries an error channel.
#[derive(Clone, Debug)]
pub struct Signature {
    /// Input positions, in declaration order. Only the last may be
    /// [`ArgDesc::Variadic`].
    pub inputs: Vec<ArgDesc>,
    /// Result types, with the error channel stripped.
    pub results: Vec<TypeDesc>,
    /// Whether the body returns a `Result`.
    pub returns_error: bool,
}

/// Specializes `inputs` against a supplied arity: a trailing variadic
/// position is repeated to absorb the surplus (possibly zero positions).
/// `Err` carries the arity the inputs would display in a mismatch report.
pub(crate) fn specialize(inputs: &[ArgDesc], arity: usize) -> Result<Vec<TypeDesc>, usize> {
    let (tail, head) = match inputs.split_last() {
        Some(split) => split,
        None => {
            return if arity == 0 { Ok(Vec::new()) } else { Err(0) };
        }
    };
    let fixed = |desc: &ArgDesc| match *desc {
        ArgDesc::Fixed(fixed) => fixed,
        ArgDesc::Variadic(_) => unreachable!("variadic before the tail"),
    };
    match *tail {
        ArgDesc::Variadic(elem) => {
            if arity < head.len() {
                return Err(inputs.len());
            }
            let mut positions: Vec<TypeDesc> = head.iter().map(fixed).collect();
            positions.resize(arity, elem);
            Ok(positions)
        }
        ArgDesc::Fixed(_) => {
            if inputs.len() != arity {
                return Err(inputs.len());
            }
            Ok(inputs.iter().map(fixed).collect())
        }
    }
}

/// A trailing variadic parameter: absorbs the rest of a predecessor's
/// results as a `Vec` of one element type.
///
/// ```
/// use vow::{all, Promise, Variadic};
///
/// let first = Promise::new(|| 3u32, ());
/// let second = Promise::new(|| 4u32, ());
/// let sum = all([&first, &second]).then(|vals: Variadic<u32>| {
///     vals.iter().sum::<u32>()
/// });
/// let mut total: u32 = 0;
/// sum.wait((&mut total,)).unwrap();
/// assert_eq!(7, total);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> Variadic<T> {
    /// Unwraps the absorbed values.
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> std::ops::Deref for Variadic<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> IntoIterator for Variadic<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Shape markers distinguishing the [`IntoResults`] and [`PromiseFn`]
/// impls. Never named directly; the compiler picks them from the closure
/// shape.
pub mod marker {
    /// Return type `()`: no results.
    pub struct Nothing;
    /// A bare value: one result.
    pub struct Single;
    /// A tuple of values: one result per element.
    pub struct Many;
    /// A `Result`: the inner shape plus an error channel.
    pub struct Fallible<M>(M);
    /// A body whose every parameter is fixed.
    pub struct Plain<M>(M);
    /// A body with a trailing [`Variadic`](super::Variadic) parameter.
    pub struct Spread<M>(M);
}

/// Conversion from a promise body's return type into the erased result
/// list, classifying a `Result` return as an error channel.
pub trait IntoResults<M> {
    #[doc(hidden)]
    fn result_types() -> (Vec<TypeDesc>, bool);
    #[doc(hidden)]
    fn into_results(self) -> Result<Vec<Value>, Error>;
}

impl IntoResults<marker::Nothing> for () {
    fn result_types() -> (Vec<TypeDesc>, bool) {
        (Vec::new(), false)
    }

    fn into_results(self) -> Result<Vec<Value>, Error> {
        Ok(Vec::new())
    }
}

impl<T: ValueType> IntoResults<marker::Single> for T {
    fn result_types() -> (Vec<TypeDesc>, bool) {
        (vec![TypeDesc::of::<T>()], false)
    }

    fn into_results(self) -> Result<Vec<Value>, Error> {
        Ok(vec![Value::new(self)])
    }
}

macro_rules! impl_into_results {
    ($($t:ident),+) => {
        impl<$($t: ValueType),+> IntoResults<marker::Many> for ($($t,)+) {
            fn result_types() -> (Vec<TypeDesc>, bool) {
                (vec![$(TypeDesc::of::<$t>()),+], false)
            }

            #[allow(non_snake_case)]
            fn into_results(self) -> Result<Vec<Value>, Error> {
                let ($($t,)+) = self;
                Ok(vec![$(Value::new($t)),+])
            }
        }
    };
}

impl_into_results!(T1, T2);
impl_into_results!(T1, T2, T3);
impl_into_results!(T1, T2, T3, T4);
impl_into_results!(T1, T2, T3, T4, T5);
impl_into_results!(T1, T2, T3, T4, T5, T6);
impl_into_results!(T1, T2, T3, T4, T5, T6, T7);
impl_into_results!(T1, T2, T3, T4, T5, T6, T7, T8);

impl<R, M, E> IntoResults<marker::Fallible<M>> for Result<R, E>
where
    R: IntoResults<M>,
    E: std::error::Error + Send + Sync + 'static,
{
    fn result_types() -> (Vec<TypeDesc>, bool) {
        let (types, _) = R::result_types();
        (types, true)
    }

    fn into_results(self) -> Result<Vec<Value>, Error> {
        match self {
            Ok(results) => results.into_results(),
            Err(cause) => Err(Error::user(Box::new(cause))),
        }
    }
}

/// A function usable as a promise body.
///
/// Implemented for `FnOnce` closures of arity 0 through 8 whose parameters
/// are [`ValueType`]s (the last may instead be a [`Variadic`]) and whose
/// return type satisfies [`IntoResults`]. The `Args` and `Marker` parameters
/// are inferred from the closure shape.
pub trait PromiseFn<Args, Marker>: Send + 'static {
    /// The profiled shape of this body.
    fn signature() -> Signature;

    #[doc(hidden)]
    fn invoke(self, args: Vec<Value>) -> Result<Vec<Value>, Error>;
}

fn bound<T: ValueType>(value: Option<Value>) -> T {
    match value.and_then(|v| v.downcast::<T>().ok()) {
        Some(value) => value,
        None => unreachable!("arguments were validated at construction"),
    }
}

macro_rules! impl_promise_fn {
    ($($a:ident),*) => {
        impl<F, R, M, $($a),*> PromiseFn<($($a,)*), marker::Plain<M>> for F
        where
            F: FnOnce($($a),*) -> R + Send + 'static,
            R: IntoResults<M>,
            $($a: ValueType,)*
        {
            fn signature() -> Signature {
                let (results, returns_error) = R::result_types();
                Signature {
                    inputs: vec![$(ArgDesc::Fixed(TypeDesc::of::<$a>())),*],
                    results,
                    returns_error,
                }
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
                let mut args = args.into_iter();
                $(let $a: $a = bound(args.next());)*
                debug_assert!(args.next().is_none());
                self($($a),*).into_results()
            }
        }
    };
}

impl_promise_fn!();
impl_promise_fn!(T1);
impl_promise_fn!(T1, T2);
impl_promise_fn!(T1, T2, T3);
impl_promise_fn!(T1, T2, T3, T4);
impl_promise_fn!(T1, T2, T3, T4, T5);
impl_promise_fn!(T1, T2, T3, T4, T5, T6);
impl_promise_fn!(T1, T2, T3, T4, T5, T6, T7);
impl_promise_fn!(T1, T2, T3, T4, T5, T6, T7, T8);

macro_rules! impl_promise_fn_variadic {
    ($($head:ident),*) => {
        impl<F, R, M, $($head,)* V> PromiseFn<($($head,)* Variadic<V>,), marker::Spread<M>> for F
        where
            F: FnOnce($($head,)* Variadic<V>) -> R + Send + 'static,
            R: IntoResults<M>,
            $($head: ValueType,)*
            V: ValueType,
        {
            fn signature() -> Signature {
                let (results, returns_error) = R::result_types();
                Signature {
                    inputs: vec![
                        $(ArgDesc::Fixed(TypeDesc::of::<$head>()),)*
                        ArgDesc::Variadic(TypeDesc::of::<V>()),
                    ],
                    results,
                    returns_error,
                }
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn invoke(self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
                let mut args = args.into_iter();
                $(let $head: $head = bound(args.next());)*
                let rest: Vec<V> = args.map(|v| bound(Some(v))).collect();
                self($($head,)* Variadic(rest)).into_results()
            }
        }
    };
}

impl_promise_fn_variadic!();
impl_promise_fn_variadic!(T1);
impl_promise_fn_variadic!(T1, T2);
impl_promise_fn_variadic!(T1, T2, T3);
impl_promise_fn_variadic!(T1, T2, T3, T4);
impl_promise_fn_variadic!(T1, T2, T3, T4, T5);
impl_promise_fn_variadic!(T1, T2, T3, T4, T5, T6);
impl_promise_fn_variadic!(T1, T2, T3, T4, T5, T6, T7);

/// Construction-time arguments for [`Promise::new`](super::Promise::new):
/// a tuple of values, erased for binding.
pub trait ArgList {
    #[doc(hidden)]
    fn into_values(self) -> Vec<Value>;
}

impl ArgList for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

macro_rules! impl_arg_list {
    ($($t:ident),+) => {
        impl<$($t: ValueType),+> ArgList for ($($t,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($t,)+) = self;
                vec![$(Value::new($t)),+]
            }
        }
    };
}

impl_arg_list!(T1);
impl_arg_list!(T1, T2);
impl_arg_list!(T1, T2, T3);
impl_arg_list!(T1, T2, T3, T4);
impl_arg_list!(T1, T2, T3, T4, T5);
impl_arg_list!(T1, T2, T3, T4, T5, T6);
impl_arg_list!(T1, T2, T3, T4, T5, T6, T7);
impl_arg_list!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use super::*;

    fn sig_of<F, A, M>(_: &F) -> Signature
    where
        F: PromiseFn<A, M>,
    {
        F::signature()
    }

    #[test]
    fn profiles_a_plain_closure() {
        let sig = sig_of(&|x: i32, label: String| (x, label));
        assert_eq!(
            vec![
                ArgDesc::Fixed(TypeDesc::of::<i32>()),
                ArgDesc::Fixed(TypeDesc::of::<String>()),
            ],
            sig.inputs
        );
        assert_eq!(
            vec![TypeDesc::of::<i32>(), TypeDesc::of::<String>()],
            sig.results
        );
        assert!(!sig.returns_error);
    }

    #[test]
    fn result_return_becomes_an_error_channel() {
        let sig = sig_of(&|| -> Result<u64, std::io::Error> { Ok(1) });
        assert_eq!(vec![TypeDesc::of::<u64>()], sig.results);
        assert!(sig.returns_error);
    }

    #[test]
    fn unit_return_has_no_results() {
        let sig = sig_of(&|| {});
        assert!(sig.results.is_empty());
        assert!(!sig.returns_error);
    }

    #[test]
    fn variadic_tail_is_profiled() {
        let sig = sig_of(&|first: bool, rest: Variadic<i32>| {
            let _ = (first, rest);
        });
        assert_eq!(
            vec![
                ArgDesc::Fixed(TypeDesc::of::<bool>()),
                ArgDesc::Variadic(TypeDesc::of::<i32>()),
            ],
            sig.inputs
        );
    }

    #[test]
    fn specialize_fixed_arity() {
        let inputs = [
            ArgDesc::Fixed(TypeDesc::of::<i32>()),
            ArgDesc::Fixed(TypeDesc::of::<bool>()),
        ];
        let positions = specialize(&inputs, 2).unwrap();
        assert_eq!(
            vec![TypeDesc::of::<i32>(), TypeDesc::of::<bool>()],
            positions
        );
        assert_eq!(Err(2), specialize(&inputs, 3));
    }

    #[test]
    fn specialize_expands_a_variadic_tail() {
        let inputs = [
            ArgDesc::Fixed(TypeDesc::of::<bool>()),
            ArgDesc::Variadic(TypeDesc::of::<i32>()),
        ];
        let spread = specialize(&inputs, 4).unwrap();
        assert_eq!(
            vec![
                TypeDesc::of::<bool>(),
                TypeDesc::of::<i32>(),
                TypeDesc::of::<i32>(),
                TypeDesc::of::<i32>(),
            ],
            spread
        );
        // the variadic position may absorb nothing at all
        assert_eq!(
            vec![TypeDesc::of::<bool>()],
            specialize(&inputs, 1).unwrap()
        );
        assert_eq!(Err(2), specialize(&inputs, 0));
    }

    #[test]
    fn invoke_packs_the_variadic_tail() {
        let body = |first: bool, rest: Variadic<i32>| -> i32 {
            assert!(first);
            rest.iter().sum()
        };
        let out = body
            .invoke(vec![Value::new(true), Value::new(2i32), Value::new(3i32)])
            .unwrap();
        assert_eq!(Some(&5), out[0].downcast_ref::<i32>());
    }
}
