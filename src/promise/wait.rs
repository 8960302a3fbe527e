use super::cell::Promise;
use super::error::Error;
use super::value::{TypeDesc, Value, ValueType};

/// Destructured output slots for [`Promise::wait`]: a tuple of `&mut T`,
/// one slot per result.
pub trait WaitOutputs {
    #[doc(hidden)]
    fn descs(&self) -> Vec<TypeDesc>;
    #[doc(hidden)]
    fn fill(self, results: &[Value]);
}

impl WaitOutputs for () {
    fn descs(&self) -> Vec<TypeDesc> {
        Vec::new()
    }

    fn fill(self, _results: &[Value]) {}
}

fn extract<T: ValueType>(value: &Value) -> T {
    match value.downcast_ref::<T>() {
        Some(value) => value.clone(),
        None => unreachable!("output type was validated before blocking"),
    }
}

macro_rules! impl_wait_outputs {
    ($($idx:tt => $t:ident),+) => {
        impl<'a, $($t: ValueType),+> WaitOutputs for ($(&'a mut $t,)+) {
            fn descs(&self) -> Vec<TypeDesc> {
                vec![$(TypeDesc::of::<$t>()),+]
            }

            fn fill(self, results: &[Value]) {
                $(*self.$idx = extract::<$t>(&results[$idx]);)+
            }
        }
    };
}

impl_wait_outputs!(0 => T1);
impl_wait_outputs!(0 => T1, 1 => T2);
impl_wait_outputs!(0 => T1, 1 => T2, 2 => T3);
impl_wait_outputs!(0 => T1, 1 => T2, 2 => T3, 3 => T4);
impl_wait_outputs!(0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5);
impl_wait_outputs!(0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6);
impl_wait_outputs!(0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7);
impl_wait_outputs!(0 => T1, 1 => T2, 2 => T3, 3 => T4, 4 => T5, 5 => T6, 6 => T7, 7 => T8);

impl Promise {
    /// Blocks until this promise settles, then writes each result into its
    /// slot.
    ///
    /// On failure the slots are left untouched and the stored error comes
    /// back wrapped as "panic during promise execution". Waiting consumes
    /// nothing; a promise may be waited on any number of times.
    ///
    /// # Panics
    ///
    /// If the slot count or any slot type does not match the result
    /// profile. The check runs before blocking.
    ///
    /// # Examples
    ///
    /// ```
    /// use vow::Promise;
    ///
    /// let p = Promise::new(|| (1i32, String::from("one")), ());
    /// let mut number = 0;
    /// let mut name = String::new();
    /// p.wait((&mut number, &mut name)).unwrap();
    /// assert_eq!(1, number);
    /// assert_eq!("one", name);
    /// ```
    pub fn wait<O: WaitOutputs>(&self, outputs: O) -> Result<(), Error> {
        let have = self.inner.profile();
        let slots = outputs.descs();
        if have.len() != slots.len() {
            panic!(
                "promise returns {} values, wait was asked to set {} values",
                have.len(),
                slots.len()
            );
        }
        for (i, (want, slot)) in have.iter().zip(&slots).enumerate() {
            if want != slot {
                panic!(
                    "for output {}: expected type {}, got type {}",
                    i, want, slot
                );
            }
        }
        self.inner.block_until_complete();
        let (results, error) = self.inner.snapshot();
        if let Some(cause) = error {
            return Err(Error::wrap("panic during promise execution", cause));
        }
        outputs.fill(&results);
        Ok(())
    }

    /// Blocks until this promise settles, then collects every result into
    /// one freshly sized vector.
    ///
    /// This is the ergonomic face of a homogeneous [`all`](super::all): a
    /// join of n same-typed promises lands in one `Vec` instead of n
    /// slots. A promise whose single result already is a `Vec<T>` is
    /// served by [`wait`](Promise::wait) instead.
    ///
    /// # Panics
    ///
    /// If the promise has no results, or any result type differs from `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vow::{all, Promise};
    ///
    /// let promises: Vec<_> = (1u8..=3).map(|n| Promise::new(|n: u8| n * 10, (n,))).collect();
    /// let mut tens: Vec<u8> = Vec::new();
    /// all(&promises).wait_collect(&mut tens).unwrap();
    /// assert_eq!(vec![10, 20, 30], tens);
    /// ```
    pub fn wait_collect<T: ValueType>(&self, output: &mut Vec<T>) -> Result<(), Error> {
        let have = self.inner.profile();
        let elem = TypeDesc::of::<T>();
        if have.is_empty() {
            panic!("promise returns no values, nothing to collect");
        }
        for (i, want) in have.iter().enumerate() {
            if *want != elem {
                panic!(
                    "for output {}: expected type {}, got type {}",
                    i, want, elem
                );
            }
        }
        self.inner.block_until_complete();
        let (results, error) = self.inner.snapshot();
        if let Some(cause) = error {
            return Err(Error::wrap("panic during promise execution", cause));
        }
        let mut collected = Vec::with_capacity(results.len());
        for value in &results {
            collected.push(extract::<T>(value));
        }
        *output = collected;
        Ok(())
    }
}
