//! Property tests over identifiers, payload algebra, and shapes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use proptest::prelude::*;
use skein_rt::message::{MessageId, MessageKind, Payload, Shape};
use skein_rt::payload;

const SEQ_LIMIT: u64 = (1 << 61) - 1;

proptest! {
    #[test]
    fn message_id_fields_roundtrip(seq in 0u64..=SEQ_LIMIT, urgent in any::<bool>()) {
        let mut id = MessageId::request(seq);
        if urgent {
            id = id.with_urgent_priority();
        }
        prop_assert_eq!(id.sequence(), seq);
        prop_assert_eq!(id.kind(), MessageKind::Request);
        prop_assert_eq!(id.is_urgent(), urgent);
        prop_assert_eq!(MessageId::from_raw(id.as_u64()), id);
    }

    #[test]
    fn respond_to_is_an_involution_on_requests(seq in 0u64..=SEQ_LIMIT) {
        let request = MessageId::request(seq);
        let response = request.respond_to();
        prop_assert!(response.is_response());
        prop_assert_eq!(response.sequence(), seq);
        prop_assert_eq!(response.respond_to(), request);
    }

    #[test]
    fn urgent_ids_order_above_all_normal_ids(a in 0u64..=SEQ_LIMIT, b in 0u64..=SEQ_LIMIT) {
        let urgent = MessageId::request(a).with_urgent_priority();
        let normal = MessageId::request(b);
        prop_assert!(urgent > normal);
    }

    #[test]
    fn sequence_payload_equals_itself(values in proptest::collection::vec(any::<i64>(), 0..16)) {
        let a = Payload::from_sequence(values.clone());
        let b = Payload::from_sequence(values.clone());
        prop_assert_eq!(a.len(), values.len());
        prop_assert!(a.equals(&b));
    }

    #[test]
    fn detached_clone_is_independent(values in proptest::collection::vec(any::<i64>(), 1..16),
                                     index in 0usize..16,
                                     replacement in any::<i64>()) {
        let index = index % values.len();
        let original = Payload::from_sequence(values.clone());
        let mut copy = original.clone();
        *copy.get_mut::<i64>(index).unwrap() = replacement;

        prop_assert_eq!(original.get::<i64>(index), Some(&values[index]));
        prop_assert_eq!(copy.get::<i64>(index), Some(&replacement));
    }

    #[test]
    fn sliced_view_agrees_with_base(values in proptest::collection::vec(any::<i64>(), 1..16),
                                    offset in 0usize..16,
                                    count in 0usize..16) {
        let base = Payload::from_sequence(values.clone());
        let offset = offset % (values.len() + 1);
        let count = count % (values.len() - offset + 1);
        let view = base.sliced(offset, count).unwrap();

        prop_assert_eq!(view.len(), count);
        for i in 0..count {
            prop_assert_eq!(view.get::<i64>(i), Some(&values[offset + i]));
        }
    }

    #[test]
    fn permuted_view_remaps_slots(values in proptest::collection::vec(any::<i64>(), 1..8)) {
        let base = Payload::from_sequence(values.clone());
        let reversed: Vec<usize> = (0..values.len()).rev().collect();
        let view = base.permuted(&reversed).unwrap();

        for (i, &src) in reversed.iter().enumerate() {
            prop_assert_eq!(view.get::<i64>(i), Some(&values[src]));
        }
    }

    #[test]
    fn typed_shape_matches_only_same_arity(x in any::<i64>(), y in any::<i64>()) {
        let two = payload!(x, y);
        prop_assert!(Shape::of::<(i64, i64)>().matches(&two));
        prop_assert!(!Shape::of::<(i64,)>().matches(&two));
        prop_assert!(!Shape::of::<(i64, u64)>().matches(&two));
    }

    #[test]
    fn extraction_roundtrips_pairs(x in any::<i64>(), y in any::<i64>()) {
        let p = payload!(x, y);
        let (a, b): (i64, i64) = p.extract().unwrap();
        prop_assert_eq!((a, b), (x, y));
    }
}
