//! Statically typed message tuples and their runtime shapes.
//!
//! [`MessageTuple`] is implemented for Rust tuples up to arity eight whose
//! elements qualify as payload slot values. A [`Shape`] is the runtime
//! descriptor of such a tuple: the compile-time type token plus the per-slot
//! type ids, used for O(1) shape checks during pattern matching.

// Layer 1: Standard library imports
use std::any::TypeId;
use std::fmt;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::payload::Payload;
use super::value::PayloadValue;

/// Runtime descriptor of a tuple shape.
#[derive(Clone, PartialEq, Eq)]
pub struct Shape {
    token: TypeId,
    slots: Box<[TypeId]>,
    names: Box<[&'static str]>,
}

impl Shape {
    pub(crate) fn new(token: TypeId, slots: Vec<TypeId>, names: Vec<&'static str>) -> Self {
        Self {
            token,
            slots: slots.into_boxed_slice(),
            names: names.into_boxed_slice(),
        }
    }

    /// The shape of the statically typed tuple `T`.
    pub fn of<T: MessageTuple>() -> Self {
        T::shape()
    }

    /// Compile-time type token of the whole tuple.
    pub fn token(&self) -> TypeId {
        self.token
    }

    /// Number of slots.
    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    /// Per-slot runtime type ids.
    pub fn slot_types(&self) -> &[TypeId] {
        &self.slots
    }

    /// Per-slot type names for diagnostics.
    pub fn slot_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Whether `payload` matches this shape.
    ///
    /// Statically typed payloads match by token in O(1); dynamic payloads
    /// fall back to a slot-wise type comparison.
    pub fn matches(&self, payload: &Payload) -> bool {
        if payload.type_token() == Some(self.token) {
            return true;
        }
        if payload.len() != self.slots.len() {
            return false;
        }
        self.slots
            .iter()
            .enumerate()
            .all(|(i, t)| payload.type_at(i) == Some(*t))
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape(")?;
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            f.write_str(name)?;
        }
        write!(f, ")")
    }
}

/// A Rust tuple usable as a statically typed message payload.
///
/// Implemented for tuples of arity zero through eight. Every element must
/// satisfy the payload slot bounds (`Clone + PartialEq + Debug + Serialize +
/// DeserializeOwned + Send + Sync + 'static`).
pub trait MessageTuple: Send + Sync + 'static {
    /// Number of slots.
    const ARITY: usize;

    /// Runtime shape descriptor of this tuple type.
    fn shape() -> Shape;

    /// Borrow the slot at `index`, if in range.
    fn slot(&self, index: usize) -> Option<&dyn PayloadValue>;

    /// Mutably borrow the slot at `index`, if in range.
    fn slot_mut(&mut self, index: usize) -> Option<&mut dyn PayloadValue>;

    /// Decompose into boxed slot values.
    fn into_values(self) -> Vec<Box<dyn PayloadValue>>;

    /// Clone a tuple of this type out of a payload, if the shapes agree.
    fn from_payload(payload: &Payload) -> Option<Self>
    where
        Self: Sized;
}

macro_rules! count_idents {
    () => { 0 };
    ($head:ident $($tail:ident)*) => { 1 + count_idents!($($tail)*) };
}

macro_rules! impl_message_tuple {
    ($($idx:tt $name:ident),*) => {
        impl<$($name),*> MessageTuple for ($($name,)*)
        where
            $($name: PayloadValue + Clone,)*
        {
            const ARITY: usize = count_idents!($($name)*);

            fn shape() -> Shape {
                Shape::new(
                    TypeId::of::<Self>(),
                    vec![$(TypeId::of::<$name>()),*],
                    vec![$(std::any::type_name::<$name>()),*],
                )
            }

            fn slot(&self, index: usize) -> Option<&dyn PayloadValue> {
                match index {
                    $($idx => Some(&self.$idx as &dyn PayloadValue),)*
                    _ => None,
                }
            }

            fn slot_mut(&mut self, index: usize) -> Option<&mut dyn PayloadValue> {
                match index {
                    $($idx => Some(&mut self.$idx as &mut dyn PayloadValue),)*
                    _ => None,
                }
            }

            fn into_values(self) -> Vec<Box<dyn PayloadValue>> {
                vec![$(Box::new(self.$idx) as Box<dyn PayloadValue>),*]
            }

            fn from_payload(payload: &Payload) -> Option<Self> {
                if payload.len() != Self::ARITY {
                    return None;
                }
                Some(($(payload.at($idx)?.downcast_ref::<$name>()?.clone(),)*))
            }
        }
    };
}

impl_message_tuple!();
impl_message_tuple!(0 A);
impl_message_tuple!(0 A, 1 B);
impl_message_tuple!(0 A, 1 B, 2 C);
impl_message_tuple!(0 A, 1 B, 2 C, 3 D);
impl_message_tuple!(0 A, 1 B, 2 C, 3 D, 4 E);
impl_message_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_message_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_message_tuple!(0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Ping;

    #[test]
    fn test_arities() {
        assert_eq!(<()>::ARITY, 0);
        assert_eq!(<(i64,)>::ARITY, 1);
        assert_eq!(<(Ping, i64, String)>::ARITY, 3);
    }

    #[test]
    fn test_shape_slot_types() {
        let shape = Shape::of::<(Ping, i64)>();
        assert_eq!(shape.arity(), 2);
        assert_eq!(shape.slot_types()[0], TypeId::of::<Ping>());
        assert_eq!(shape.slot_types()[1], TypeId::of::<i64>());
        assert_eq!(shape.token(), TypeId::of::<(Ping, i64)>());
    }

    #[test]
    fn test_shape_equality_by_tuple_type() {
        assert_eq!(Shape::of::<(i64, i64)>(), Shape::of::<(i64, i64)>());
        assert_ne!(Shape::of::<(i64, i64)>(), Shape::of::<(i64, u64)>());
    }

    #[test]
    fn test_slot_access() {
        let t = (Ping, 9i64);
        assert!(t.slot(0).unwrap().is::<Ping>());
        assert_eq!(t.slot(1).unwrap().downcast_ref::<i64>(), Some(&9));
        assert!(t.slot(2).is_none());
    }

    #[test]
    fn test_slot_mut_access() {
        let mut t = (1i64, String::from("a"));
        *t.slot_mut(0).unwrap().downcast_mut::<i64>().unwrap() = 5;
        assert_eq!(t.0, 5);
    }

    #[test]
    fn test_into_values_preserves_order() {
        let values = (Ping, 2i64, String::from("x")).into_values();
        assert_eq!(values.len(), 3);
        assert!(values[0].is::<Ping>());
        assert!(values[1].is::<i64>());
        assert!(values[2].is::<String>());
    }

    #[test]
    fn test_shape_debug_lists_names() {
        let shape = Shape::of::<(Ping, i64)>();
        let text = format!("{shape:?}");
        assert!(text.contains("Ping"));
        assert!(text.contains("i64"));
    }
}
