//! A reference that is either borrowed or owned via `Arc`, so callers can hand either a `&T`
//! or a cheaply-cloned `Arc<T>` to the same API without forcing a clone on the borrowed path.

use std::ops::Deref;
use std::sync::Arc;

pub enum Refs<'a, T> {
    Borrowed(&'a T),
    Arced(Arc<T>),
}

impl<T> Deref for Refs<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self {
            Refs::Borrowed(r) => r,
            Refs::Arced(r) => r,
        }
    }
}

impl<'a, T> From<&'a T> for Refs<'a, T> {
    fn from(value: &'a T) -> Self {
        Refs::Borrowed(value)
    }
}

impl<T> From<Arc<T>> for Refs<'_, T> {
    fn from(value: Arc<T>) -> Self {
        Refs::Arced(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Refs;
    use std::sync::Arc;

    #[test]
    fn borrowed_and_arced_deref_the_same() {
        let owned = 7u32;
        let borrowed: Refs<u32> = (&owned).into();
        assert_eq!(*borrowed, 7);

        let arced: Refs<u32> = Arc::new(7u32).into();
        assert_eq!(*arced, 7);
    }
}
