//! The per-slot value vtable backing type-erased payloads.
//!
//! Every value stored in a payload slot goes through [`PayloadValue`], a
//! blanket-implemented object-safe trait providing clone, equality, runtime
//! type information and JSON visitation. The JSON hooks are the boundary
//! glue used by [`crate::inspect`]; wire formats themselves live outside the
//! core.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::fmt::Debug;

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;
use serde::Serialize;

// Layer 3: Internal module imports
// (none)

/// Object-safe view of one payload slot.
///
/// Implemented for every `T` that is `Clone + PartialEq + Debug + Serialize
/// + DeserializeOwned + Send + Sync + 'static`; user code never implements
/// this trait directly.
pub trait PayloadValue: Any + Send + Sync + Debug {
    /// Clone the value behind the erased pointer.
    fn clone_value(&self) -> Box<dyn PayloadValue>;

    /// Type-aware equality. Values of different runtime types compare
    /// unequal.
    fn eq_value(&self, other: &dyn PayloadValue) -> bool;

    /// The runtime type token of the stored value.
    fn value_type(&self) -> TypeId;

    /// Human-readable type name for diagnostics.
    fn value_type_name(&self) -> &'static str;

    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Serialize the value into a JSON tree.
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Deserialize a JSON tree into a fresh value of *this* value's type.
    ///
    /// `self` only supplies the type; its contents are not read.
    fn from_json(&self, value: serde_json::Value)
        -> Result<Box<dyn PayloadValue>, serde_json::Error>;

    /// Overwrite the value in place from a JSON tree of the same type.
    fn write_json(&mut self, value: serde_json::Value) -> Result<(), serde_json::Error>;
}

impl<T> PayloadValue for T
where
    T: Any + Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync,
{
    fn clone_value(&self) -> Box<dyn PayloadValue> {
        Box::new(self.clone())
    }

    fn eq_value(&self, other: &dyn PayloadValue) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(rhs) => self == rhs,
            None => false,
        }
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn value_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn from_json(
        &self,
        value: serde_json::Value,
    ) -> Result<Box<dyn PayloadValue>, serde_json::Error> {
        serde_json::from_value::<T>(value).map(|v| Box::new(v) as Box<dyn PayloadValue>)
    }

    fn write_json(&mut self, value: serde_json::Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value::<T>(value)?;
        Ok(())
    }
}

impl dyn PayloadValue {
    /// Whether the stored value has type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the stored value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the stored value as `T`.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl Clone for Box<dyn PayloadValue> {
    fn clone(&self) -> Self {
        self.clone_value()
    }
}

impl PartialEq for Box<dyn PayloadValue> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_value(other.as_ref())
    }
}
