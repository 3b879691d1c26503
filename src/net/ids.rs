use std::fmt;
use std::hash::Hash;

/// Trait implemented by every type usable as a place identifier.
///
/// Places are opaque keys: the engine only hashes, orders and clones them.
pub trait PlaceKey: Clone + Eq + Ord + Hash + fmt::Debug {}

impl<T> PlaceKey for T where T: Clone + Eq + Ord + Hash + fmt::Debug {}

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u64 {
                self.0
            }

            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

define_id!(WaiterId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiter_ids_are_monotonic() {
        let first = WaiterId::new(0);
        let second = first.next();
        assert!(first < second);
        assert_eq!(second.raw(), 1);
        assert_eq!(format!("{:?}", second), "WaiterId(1)");
        assert_eq!(second.to_string(), "#1");
    }
}
