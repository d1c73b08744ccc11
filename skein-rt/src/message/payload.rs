//! Type-erased, copy-on-write message payloads.
//!
//! A [`Payload`] is a heterogeneous tuple held behind a shared pointer.
//! Reads are free to share; the first write detaches (clones) the storage so
//! no other reference observes the mutation.
//!
//! Four storage variants sit behind the same interface:
//!
//! - a statically typed tuple with a compile-time type token (packed storage,
//!   O(1) shape checks),
//! - a dynamic array of boxed slot values,
//! - a decorator presenting a permuted or offset view of another payload,
//! - a container adapter exposing a homogeneous `Vec<T>` as an N-slot tuple.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::tuple::MessageTuple;
use super::value::PayloadValue;

/// Uniform interface over the payload storage variants.
pub(crate) trait TupleData: Send + Sync {
    /// Number of visible slots.
    fn len(&self) -> usize;

    /// Borrow the slot at `index`.
    fn slot(&self, index: usize) -> Option<&dyn PayloadValue>;

    /// Mutably borrow the slot at `index`.
    ///
    /// Only reachable through [`Payload::mutable_at`], which guarantees the
    /// storage is unique and not a view.
    fn slot_mut(&mut self, index: usize) -> Option<&mut dyn PayloadValue>;

    /// Compile-time type token, present only for statically typed storage.
    fn type_token(&self) -> Option<TypeId>;

    /// Deep copy preserving the storage variant.
    fn clone_data(&self) -> Box<dyn TupleData>;

    /// Whether this storage forwards into another payload's slots.
    fn is_view(&self) -> bool {
        false
    }
}

/// Packed storage for a statically typed tuple.
struct TypedTuple<T: MessageTuple + Clone> {
    tuple: T,
}

impl<T: MessageTuple + Clone> TupleData for TypedTuple<T> {
    fn len(&self) -> usize {
        T::ARITY
    }

    fn slot(&self, index: usize) -> Option<&dyn PayloadValue> {
        self.tuple.slot(index)
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut dyn PayloadValue> {
        self.tuple.slot_mut(index)
    }

    fn type_token(&self) -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn clone_data(&self) -> Box<dyn TupleData> {
        Box::new(TypedTuple {
            tuple: self.tuple.clone(),
        })
    }
}

/// Runtime-heterogeneous storage.
struct DynTuple {
    slots: Vec<Box<dyn PayloadValue>>,
}

impl TupleData for DynTuple {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, index: usize) -> Option<&dyn PayloadValue> {
        self.slots.get(index).map(AsRef::as_ref)
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut dyn PayloadValue> {
        self.slots.get_mut(index).map(AsMut::as_mut)
    }

    fn type_token(&self) -> Option<TypeId> {
        None
    }

    fn clone_data(&self) -> Box<dyn TupleData> {
        Box::new(DynTuple {
            slots: self.slots.iter().map(|s| s.clone_value()).collect(),
        })
    }
}

/// Index-remapped view over another payload's storage.
struct DecoratedTuple {
    base: Arc<dyn TupleData>,
    mapping: Box<[usize]>,
}

impl TupleData for DecoratedTuple {
    fn len(&self) -> usize {
        self.mapping.len()
    }

    fn slot(&self, index: usize) -> Option<&dyn PayloadValue> {
        self.base.slot(*self.mapping.get(index)?)
    }

    fn slot_mut(&mut self, _index: usize) -> Option<&mut dyn PayloadValue> {
        // Views are materialized by detach before any mutation.
        None
    }

    fn type_token(&self) -> Option<TypeId> {
        None
    }

    fn clone_data(&self) -> Box<dyn TupleData> {
        Box::new(DecoratedTuple {
            base: Arc::clone(&self.base),
            mapping: self.mapping.clone(),
        })
    }

    fn is_view(&self) -> bool {
        true
    }
}

/// Homogeneous container adapter.
struct VecTuple<T: PayloadValue + Clone> {
    items: Vec<T>,
}

impl<T: PayloadValue + Clone> TupleData for VecTuple<T> {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn slot(&self, index: usize) -> Option<&dyn PayloadValue> {
        self.items.get(index).map(|v| v as &dyn PayloadValue)
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut dyn PayloadValue> {
        self.items.get_mut(index).map(|v| v as &mut dyn PayloadValue)
    }

    fn type_token(&self) -> Option<TypeId> {
        None
    }

    fn clone_data(&self) -> Box<dyn TupleData> {
        Box::new(VecTuple {
            items: self.items.clone(),
        })
    }
}

/// Deep-copy any storage into a dynamic tuple.
fn materialize(data: &dyn TupleData) -> Box<dyn TupleData> {
    let slots = (0..data.len())
        .filter_map(|i| data.slot(i).map(PayloadValue::clone_value))
        .collect();
    Box::new(DynTuple { slots })
}

/// The type-erased, copy-on-write message payload.
///
/// Cloning a payload shares the underlying tuple; mutation goes through
/// [`mutable_at`](Self::mutable_at), which detaches first.
pub struct Payload {
    data: Arc<dyn TupleData>,
}

impl Payload {
    /// Wrap a statically typed tuple.
    pub fn from_tuple<T: MessageTuple + Clone>(tuple: T) -> Self {
        Self {
            data: Arc::new(TypedTuple { tuple }),
        }
    }

    /// The empty payload.
    pub fn unit() -> Self {
        Self::from_tuple(())
    }

    /// Build a dynamic payload from boxed slot values.
    pub fn from_values(values: Vec<Box<dyn PayloadValue>>) -> Self {
        Self {
            data: Arc::new(DynTuple { slots: values }),
        }
    }

    /// Expose a homogeneous sequence as an N-slot payload.
    pub fn from_sequence<T: PayloadValue + Clone>(items: Vec<T>) -> Self {
        Self {
            data: Arc::new(VecTuple { items }),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload has no slots.
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Borrow the slot at `index`.
    pub fn at(&self, index: usize) -> Option<&dyn PayloadValue> {
        self.data.slot(index)
    }

    /// Borrow the slot at `index` downcast to `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.at(index)?.downcast_ref::<T>()
    }

    /// Runtime type id of the slot at `index`.
    pub fn type_at(&self, index: usize) -> Option<TypeId> {
        self.at(index).map(PayloadValue::value_type)
    }

    /// Type name of the slot at `index`, for diagnostics.
    pub fn type_name_at(&self, index: usize) -> Option<&'static str> {
        self.at(index).map(PayloadValue::value_type_name)
    }

    /// Compile-time type token of the whole tuple, when statically typed.
    pub fn type_token(&self) -> Option<TypeId> {
        self.data.type_token()
    }

    /// Whether the slot at `index` holds a value of type `T`.
    pub fn is<T: Any>(&self, index: usize) -> bool {
        self.type_at(index) == Some(TypeId::of::<T>())
    }

    /// Clone a statically typed tuple out of the payload.
    pub fn extract<T: MessageTuple>(&self) -> Option<T> {
        T::from_payload(self)
    }

    /// Whether other references currently share this payload's storage.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    /// Ensure this handle is the unique owner of its storage.
    ///
    /// Shared storage is deep-copied; views are materialized into a dynamic
    /// tuple. No-op when already unique and concrete.
    pub fn detach(&mut self) {
        if self.data.is_view() {
            self.data = Arc::from(materialize(self.data.as_ref()));
        } else if Arc::get_mut(&mut self.data).is_none() {
            self.data = Arc::from(self.data.clone_data());
        }
    }

    /// Mutably borrow the slot at `index`, detaching first.
    pub fn mutable_at(&mut self, index: usize) -> Option<&mut dyn PayloadValue> {
        self.detach();
        Arc::get_mut(&mut self.data).and_then(|d| d.slot_mut(index))
    }

    /// Mutably borrow the slot at `index` downcast to `T`, detaching first.
    pub fn get_mut<T: Any>(&mut self, index: usize) -> Option<&mut T> {
        self.mutable_at(index)?.downcast_mut::<T>()
    }

    /// A view of `count` slots starting at `offset`, sharing storage.
    pub fn sliced(&self, offset: usize, count: usize) -> Option<Payload> {
        if offset.checked_add(count)? > self.len() {
            return None;
        }
        let mapping: Box<[usize]> = (offset..offset + count).collect();
        Some(Payload {
            data: Arc::new(DecoratedTuple {
                base: Arc::clone(&self.data),
                mapping,
            }),
        })
    }

    /// A permuted view over this payload, sharing storage.
    ///
    /// Every index must be in range; indices may repeat.
    pub fn permuted(&self, indices: &[usize]) -> Option<Payload> {
        if indices.iter().any(|&i| i >= self.len()) {
            return None;
        }
        Some(Payload {
            data: Arc::new(DecoratedTuple {
                base: Arc::clone(&self.data),
                mapping: indices.to_vec().into_boxed_slice(),
            }),
        })
    }

    /// Shape-and-value equality.
    pub fn equals(&self, other: &Payload) -> bool {
        if self.len() != other.len() {
            return false;
        }
        (0..self.len()).all(|i| match (self.at(i), other.at(i)) {
            (Some(a), Some(b)) => a.eq_value(b),
            _ => false,
        })
    }
}

impl Clone for Payload {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("Payload");
        for i in 0..self.len() {
            match self.at(i) {
                Some(slot) => tuple.field(&slot),
                None => tuple.field(&"<missing>"),
            };
        }
        tuple.finish()
    }
}

// Boundary serialization: a payload serializes as the JSON sequence of its
// slots. Deserialization cannot recover the original Rust types, so it
// produces a dynamic payload whose slots are `serde_json::Value` trees.
// This is sufficient for the inspection boundary; wire codecs with type
// registries live outside the core.
impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for i in 0..self.len() {
            let json = self
                .at(i)
                .ok_or_else(|| serde::ser::Error::custom("payload slot out of range"))?
                .to_json()
                .map_err(serde::ser::Error::custom)?;
            seq.serialize_element(&json)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SlotsVisitor;

        impl<'de> Visitor<'de> for SlotsVisitor {
            type Value = Payload;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a sequence of payload slots")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Payload, A::Error> {
                let mut values: Vec<Box<dyn PayloadValue>> = Vec::new();
                while let Some(value) = seq.next_element::<serde_json::Value>()? {
                    values.push(Box::new(value));
                }
                Ok(Payload::from_values(values))
            }
        }

        deserializer.deserialize_seq(SlotsVisitor)
    }
}

/// Build a statically typed [`Payload`] from a list of values.
///
/// ```
/// use skein_rt::payload;
///
/// let p = payload!(3i64, 4i64, String::from("sum"));
/// assert_eq!(p.len(), 3);
/// assert_eq!(p.get::<i64>(1), Some(&4));
/// ```
#[macro_export]
macro_rules! payload {
    () => { $crate::message::Payload::unit() };
    ($($value:expr),+ $(,)?) => {
        $crate::message::Payload::from_tuple(($($value,)+))
    };
}
