//! Inspection glue: per-slot reads and writes for boundary interop.
//!
//! Serializers outside the core walk a payload slot by slot through these
//! hooks. The visitor format is JSON trees; wire encodings themselves are
//! out of scope here.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::message::Payload;

/// Inspection failures.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// Slot index past the end of the payload.
    #[error("slot {index} out of range (payload has {len} slots)")]
    OutOfRange {
        /// Requested index.
        index: usize,
        /// Payload arity.
        len: usize,
    },

    /// The slot value could not be serialized.
    #[error("failed to read slot {index}: {source}")]
    Read {
        /// Slot index.
        index: usize,
        /// Underlying serializer error.
        source: serde_json::Error,
    },

    /// The value tree did not deserialize into the slot's type.
    #[error("failed to write slot {index}: {source}")]
    Write {
        /// Slot index.
        index: usize,
        /// Underlying deserializer error.
        source: serde_json::Error,
    },
}

/// Read the slot at `index` as a JSON tree.
pub fn read_slot(payload: &Payload, index: usize) -> Result<serde_json::Value, InspectError> {
    let slot = payload.at(index).ok_or(InspectError::OutOfRange {
        index,
        len: payload.len(),
    })?;
    slot.to_json()
        .map_err(|source| InspectError::Read { index, source })
}

/// Overwrite the slot at `index` from a JSON tree.
///
/// Detaches the payload first, so other references keep their view; the
/// tree must deserialize into the slot's existing runtime type.
pub fn write_slot(
    payload: &mut Payload,
    index: usize,
    value: serde_json::Value,
) -> Result<(), InspectError> {
    let len = payload.len();
    let slot = payload
        .mutable_at(index)
        .ok_or(InspectError::OutOfRange { index, len })?;
    slot.write_json(value)
        .map_err(|source| InspectError::Write { index, source })
}

/// Read a whole payload as a JSON array of slot trees.
pub fn read_payload(payload: &Payload) -> Result<serde_json::Value, InspectError> {
    let mut slots = Vec::with_capacity(payload.len());
    for index in 0..payload.len() {
        slots.push(read_slot(payload, index)?);
    }
    Ok(serde_json::Value::Array(slots))
}

/// The slot type names, for diagnostics at the boundary.
pub fn slot_type_names(payload: &Payload) -> Vec<&'static str> {
    (0..payload.len())
        .filter_map(|i| payload.type_name_at(i))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::payload;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_read_slot() {
        let p = payload!(7i64, Point { x: 1, y: 2 });
        assert_eq!(read_slot(&p, 0).unwrap(), json!(7));
        assert_eq!(read_slot(&p, 1).unwrap(), json!({ "x": 1, "y": 2 }));
    }

    #[test]
    fn test_read_out_of_range() {
        let p = payload!(1i64);
        assert!(matches!(
            read_slot(&p, 3),
            Err(InspectError::OutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_write_slot_same_type() {
        let mut p = payload!(Point { x: 1, y: 2 });
        write_slot(&mut p, 0, json!({ "x": 9, "y": 9 })).unwrap();
        assert_eq!(p.get::<Point>(0), Some(&Point { x: 9, y: 9 }));
    }

    #[test]
    fn test_write_detaches_shared_payload() {
        let mut a = payload!(1i64);
        let b = a.clone();
        write_slot(&mut a, 0, json!(2)).unwrap();
        assert_eq!(a.get::<i64>(0), Some(&2));
        assert_eq!(b.get::<i64>(0), Some(&1));
    }

    #[test]
    fn test_write_type_mismatch_rejected() {
        let mut p = payload!(1i64);
        assert!(matches!(
            write_slot(&mut p, 0, json!("not a number")),
            Err(InspectError::Write { index: 0, .. })
        ));
        // The original value is untouched.
        assert_eq!(p.get::<i64>(0), Some(&1));
    }

    #[test]
    fn test_read_payload_array() {
        let p = payload!(1i64, String::from("two"));
        assert_eq!(read_payload(&p).unwrap(), json!([1, "two"]));
    }

    #[test]
    fn test_slot_type_names() {
        let p = payload!(1i64, String::from("x"));
        let names = slot_type_names(&p);
        assert_eq!(names.len(), 2);
        assert!(names[0].contains("i64"));
        assert!(names[1].contains("String"));
    }
}
