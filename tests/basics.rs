use mring::{BoundedBuffer, Error};

#[test]
fn zero_capacity() {
    assert!(BoundedBuffer::<u8>::new(0).unwrap_err() == Error::ZeroCapacity);
}

#[test]
fn put_and_take() {
    let b: BoundedBuffer = BoundedBuffer::new(2).unwrap();
    assert!(b.is_empty());
    b.put(22);
    b.put(23);
    assert!(b.is_full());
    assert!(b.take() == 22);
    assert!(b.take() == 23);
    assert!(b.is_empty());
}

#[test]
fn single_slot() {
    let b: BoundedBuffer = BoundedBuffer::new(1).unwrap();
    for i in 0..=255u8 {
        b.put(i);
        assert!(b.is_full());
        assert!(b.take() == i);
    }
}

#[test]
fn wrap_around() {
    let b: BoundedBuffer<u32> = BoundedBuffer::new(5).unwrap();
    let mut next_in = 0;
    let mut next_out = 0;
    for burst in 1..=5 {
        for _ in 0..burst {
            b.put(next_in);
            next_in += 1;
        }
        assert!(b.len() == burst);
        for _ in 0..burst {
            assert!(b.take() == next_out);
            next_out += 1;
        }
    }
    assert!(next_out == 15);
}

#[test]
fn len() {
    let b: BoundedBuffer = BoundedBuffer::new(3).unwrap();
    assert!(b.capacity() == 3);
    assert!(b.len() == 0);
    b.put(1);
    assert!(b.len() == 1);
    b.put(2);
    b.put(3);
    assert!(b.len() == 3);
    assert!(b.is_full());
    b.take();
    assert!(b.len() == 2);
    assert!(!b.is_full() && !b.is_empty());
}

#[test]
fn owned_items() {
    let b: BoundedBuffer<String> = BoundedBuffer::new(2).unwrap();
    b.put("first".to_string());
    b.put("second".to_string());
    assert!(b.take() == "first");
    b.put("third".to_string());
    assert!(b.take() == "second");
    assert!(b.take() == "third");
}

#[test]
fn debug_shows_occupancy() {
    let b: BoundedBuffer = BoundedBuffer::new(3).unwrap();
    b.put(10);
    b.put(11);
    b.take();
    let shown = format!("{b:?}");
    assert!(shown == "BoundedBuffer { capacity: 3, count: 1, write_index: 2, read_index: 1 }");
}
