//! Property tests for the packed register file.

use super::*;
use crate::virtual_machine::errors::RegisterError;
use crate::virtual_machine::operand::{RegisterClass, SlotDescriptor};
use proptest::prelude::*;

fn class_strategy() -> impl Strategy<Value = RegisterClass> {
    prop::sample::select(RegisterClass::ALL.to_vec())
}

/// Values that fit `class`, biased toward the edges of the range.
fn value_strategy(class: RegisterClass) -> impl Strategy<Value = i32> {
    let max = class.max_magnitude() as i32;
    prop_oneof![
        Just(0),
        Just(1),
        Just(-1),
        Just(max),
        Just(-max),
        -max..=max,
    ]
}

/// A class and a run of values that fit it.
fn class_and_values() -> impl Strategy<Value = (RegisterClass, Vec<i32>)> {
    class_strategy().prop_flat_map(|class| {
        (Just(class), prop::collection::vec(value_strategy(class), 1..40))
    })
}

/// Adds one slot per value, sequentially, the way the allocator does.
fn fill(class: RegisterClass, values: &[i32]) -> (BitPackedRegisterFile, Vec<SlotDescriptor>) {
    let mut file = BitPackedRegisterFile::new(class);
    let mut slots = Vec::with_capacity(values.len());
    for &value in values {
        let last = file.last_slot();
        let slot = SlotDescriptor::new(last.end(), class.bits());
        file.add(slot, value).unwrap();
        slots.push(slot);
    }
    (file, slots)
}

#[test]
fn overwrite_negative_with_positive() {
    for class in RegisterClass::ALL {
        let (mut file, slots) = fill(class, &[3, -42, 9]);
        file.set(slots[1], 7).unwrap();
        assert_eq!(file.get(slots[0]).unwrap(), 3);
        assert_eq!(file.get(slots[1]).unwrap(), 7);
        assert_eq!(file.get(slots[2]).unwrap(), 9);
    }
}

#[test]
fn extremes_round_trip() {
    for class in RegisterClass::ALL {
        let max = class.max_magnitude() as i32;
        let (file, slots) = fill(class, &[max, -max, 0]);
        assert_eq!(file.get(slots[0]).unwrap(), i64::from(max));
        assert_eq!(file.get(slots[1]).unwrap(), -i64::from(max));
        assert_eq!(file.get(slots[2]).unwrap(), 0);
    }
}

#[test]
fn word_count_matches_layout() {
    let (narrow, _) = fill(RegisterClass::Narrow, &[1; 9]);
    assert_eq!(narrow.word_count(), 2);
    let (wide, _) = fill(RegisterClass::Wide, &[1; 9]);
    assert_eq!(wide.word_count(), 3);
    let (temporary, _) = fill(RegisterClass::Temporary, &[1; 9]);
    assert_eq!(temporary.word_count(), 9);
}

#[test]
fn out_of_range_set_leaves_file_untouched() {
    let (mut file, slots) = fill(RegisterClass::Narrow, &[5, -6]);
    let before = (file.magnitude_words().to_vec(), file.sign_words().to_vec());
    assert!(matches!(
        file.set(slots[0], 1000),
        Err(RegisterError::ValueOutOfRange { value: 1000, bits: 8 })
    ));
    assert_eq!(file.magnitude_words(), before.0.as_slice());
    assert_eq!(file.sign_words(), before.1.as_slice());
}

proptest! {
    #[test]
    fn add_then_get_round_trips((class, values) in class_and_values()) {
        let (file, slots) = fill(class, &values);
        for (slot, value) in slots.iter().zip(&values) {
            prop_assert_eq!(file.get(*slot).unwrap(), i64::from(*value));
        }
    }

    #[test]
    fn set_only_changes_target(
        (class, values) in class_and_values(),
        pick in any::<prop::sample::Index>(),
        replacement in any::<i16>(),
    ) {
        let (mut file, slots) = fill(class, &values);
        let target = pick.index(slots.len());
        let max = class.max_magnitude() as i32;
        let replacement = i32::from(replacement).clamp(-max, max);

        file.set(slots[target], replacement).unwrap();

        for (i, (slot, value)) in slots.iter().zip(&values).enumerate() {
            let expected = if i == target { replacement } else { *value };
            prop_assert_eq!(file.get(*slot).unwrap(), i64::from(expected));
        }
    }

    #[test]
    fn sign_is_symmetric((class, values) in class_and_values()) {
        let negated: Vec<i32> = values.iter().map(|v| -v).collect();
        let (file, slots) = fill(class, &values);
        let (mirror, _) = fill(class, &negated);
        prop_assert_eq!(file.magnitude_words(), mirror.magnitude_words());
        for slot in slots {
            prop_assert_eq!(file.get(slot).unwrap(), -mirror.get(slot).unwrap());
        }
    }

    #[test]
    fn offsets_are_monotonic((class, values) in class_and_values()) {
        let (file, slots) = fill(class, &values);
        for pair in slots.windows(2) {
            prop_assert_eq!(pair[1].offset, pair[0].end());
        }
        prop_assert_eq!(file.last_slot(), *slots.last().unwrap());
    }
}
