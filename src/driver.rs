//! Launches producer and consumer threads against one shared buffer.
//!
//! A run creates a single [`BoundedBuffer`], spawns every producer and
//! consumer as a scoped thread borrowing it, and returns once all of them
//! have finished.  The total number of items produced is split across the
//! consumers so that every thread performs a bounded number of calls and the
//! run always terminates, even when there are more consumers than items.

use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::{BoundedBuffer, Error};

/// Shape of a producer/consumer run.
///
/// The default mirrors the classic demonstration: a three-slot buffer, five
/// producers that each insert one item (`10` through `14`) and five
/// consumers that each remove one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Number of slots in the shared buffer.
    pub capacity: usize,
    /// Number of producer threads.
    pub producers: usize,
    /// Number of consumer threads.
    pub consumers: usize,
    /// Items inserted by each producer.
    pub items_per_producer: usize,
    /// Value of the first item of producer 0.  Later items count up from
    /// here, wrapping around at 256.
    pub first_item: u8,
    /// Simulated work, slept outside the buffer's lock before every `put`
    /// and after every `take`.
    pub work_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            capacity: 3,
            producers: 5,
            consumers: 5,
            items_per_producer: 1,
            first_item: 10,
            work_delay: Duration::ZERO,
        }
    }
}

impl DriverConfig {
    /// Check that the run has at least one slot, producer and consumer, and
    /// that its total item count fits in a `usize`.
    pub fn validate(&self) -> Result<(), Error> {
        if self.capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        if self.producers == 0 {
            return Err(Error::NoProducers);
        }
        if self.consumers == 0 {
            return Err(Error::NoConsumers);
        }
        if self.producers.checked_mul(self.items_per_producer).is_none() {
            return Err(Error::TooManyItems);
        }
        Ok(())
    }

    /// Number of items inserted over the whole run, saturating at
    /// `usize::MAX` for configs that [`validate`](Self::validate) rejects.
    pub fn total_items(&self) -> usize {
        self.producers.saturating_mul(self.items_per_producer)
    }

    /// Number of `take` calls made by consumer `consumer`.  The first
    /// `total_items() % consumers` consumers make one extra call, so the
    /// counts always add up to `total_items()`.
    pub fn takes_for(&self, consumer: usize) -> usize {
        let total = self.total_items();
        if self.consumers == 0 {
            return 0;
        }
        total / self.consumers + usize::from(consumer < total % self.consumers)
    }

    /// The `k`th item inserted by producer `producer`.
    pub fn item(&self, producer: usize, k: usize) -> u8 {
        // Only the low 8 bits matter, and wrapping usize arithmetic keeps them.
        let offset = producer
            .wrapping_mul(self.items_per_producer)
            .wrapping_add(k) as u8;
        self.first_item.wrapping_add(offset)
    }
}

/// What each thread did during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Items inserted by each producer, in insertion order.
    pub produced: Vec<Vec<u8>>,
    /// Items removed by each consumer, in removal order.
    pub consumed: Vec<Vec<u8>>,
    /// Buffer occupancy after every thread finished.
    pub final_len: usize,
}

impl RunReport {
    /// Return `true` if every produced item was consumed exactly once: the
    /// produced and consumed items are equal as multisets.
    pub fn all_delivered_once(&self) -> bool {
        let mut produced: Vec<u8> = self.produced.iter().flatten().copied().collect();
        let mut consumed: Vec<u8> = self.consumed.iter().flatten().copied().collect();
        produced.sort_unstable();
        consumed.sort_unstable();
        produced == consumed
    }

    /// Total number of `take` calls across all consumers.
    pub fn consumed_total(&self) -> usize {
        self.consumed.iter().map(Vec::len).sum()
    }
}

/// Run `config` to completion.
///
/// A panic in any worker thread only happens if the buffer detects a broken
/// invariant.  The other workers could then stay blocked in `put` or `take`
/// forever, so the panic is logged and the process aborted instead of
/// unwinding into the scope.
pub fn run(config: &DriverConfig) -> Result<RunReport, Error> {
    config.validate()?;
    let buffer = BoundedBuffer::new(config.capacity)?;
    info!(
        "starting {} producers and {} consumers on a {}-slot buffer ({} items)",
        config.producers,
        config.consumers,
        config.capacity,
        config.total_items()
    );

    let (produced, consumed) = thread::scope(|s| {
        let buffer = &buffer;
        let producers: Vec<_> = (0..config.producers)
            .map(|index| s.spawn(move || abort_on_panic(|| producer(index, buffer, config))))
            .collect();
        let consumers: Vec<_> = (0..config.consumers)
            .map(|index| s.spawn(move || abort_on_panic(|| consumer(index, buffer, config))))
            .collect();

        let produced: Vec<Vec<u8>> = producers.into_iter().map(join).collect();
        let consumed: Vec<Vec<u8>> = consumers.into_iter().map(join).collect();
        (produced, consumed)
    });

    let report = RunReport {
        produced,
        consumed,
        final_len: buffer.len(),
    };
    info!(
        "run finished: {} items consumed, {} left in buffer",
        report.consumed_total(),
        report.final_len
    );
    Ok(report)
}

fn producer(index: usize, buffer: &BoundedBuffer<u8>, config: &DriverConfig) -> Vec<u8> {
    debug!("producer({index}) starting");
    let items: Vec<u8> = (0..config.items_per_producer)
        .map(|k| config.item(index, k))
        .collect();
    for &item in &items {
        pause(config.work_delay);
        buffer.put(item);
        debug!("producer({index}) put {item}");
    }
    debug!("producer({index}) done");
    items
}

fn consumer(index: usize, buffer: &BoundedBuffer<u8>, config: &DriverConfig) -> Vec<u8> {
    let takes = config.takes_for(index);
    debug!("consumer({index}) starting, {takes} takes");
    let mut items = Vec::with_capacity(takes);
    for _ in 0..takes {
        let item = buffer.take();
        debug!("consumer({index}) took {item}");
        items.push(item);
        pause(config.work_delay);
    }
    debug!("consumer({index}) done");
    items
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

fn abort_on_panic<T>(work: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(value) => value,
        Err(_) => {
            error!("worker panicked on a broken buffer invariant, aborting");
            process::abort();
        }
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| panic::resume_unwind(payload))
}
