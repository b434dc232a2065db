use std::collections::VecDeque;

use mring::BoundedBuffer;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Put(u8),
    Take,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u8>().prop_map(Op::Put), Just(Op::Take)]
}

proptest! {
    // Single-threaded, so ops that would block are skipped rather than issued.
    #[test]
    fn matches_fifo_model(capacity in 1usize..8, ops in prop::collection::vec(op(), 0..256)) {
        let b: BoundedBuffer = BoundedBuffer::new(capacity).unwrap();
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Put(item) if model.len() < capacity => {
                    b.put(item);
                    model.push_back(item);
                }
                Op::Take if !model.is_empty() => {
                    prop_assert_eq!(Some(b.take()), model.pop_front());
                }
                _ => {}
            }
            prop_assert_eq!(b.len(), model.len());
            prop_assert!(b.len() <= b.capacity());
            prop_assert_eq!(b.is_full(), model.len() == capacity);
        }

        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(b.take(), expected);
        }
        prop_assert!(b.is_empty());
    }
}
