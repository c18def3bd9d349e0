use log::trace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread;

// Background job runner: every submission spawns its own thread and
// the typed result comes back over a multi-producer/single-consumer
// channel. `drain` is the single completion point, called once per
// control-loop tick on the owning thread; it yields results in the
// order jobs *finished*, not the order they were submitted.
//
// There is no cancellation: a submitted job always runs to completion
// and always enqueues its result. Dropping the dispatcher discards
// results that were never drained. A job that panics kills only its
// own thread and never delivers, permanently stalling whatever was
// waiting on it; that is treated as a data-generation bug, not a
// recoverable condition.
pub struct JobDispatcher<E> {
    tx: Sender<E>,
    rx: Receiver<E>,
    in_flight: Arc<AtomicUsize>,
}

impl<E: Send + 'static> JobDispatcher<E> {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    // Run `job` on a fresh background thread and enqueue its result.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() -> E + Send + 'static,
    {
        let tx = self.tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);
        trace!("dispatching background job");
        thread::spawn(move || {
            let result = job();
            // send fails only when the dispatcher was dropped, in
            // which case the result is discarded by design.
            let _ = tx.send(result);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    // Pop every queued completion, in FIFO finishing order. Never
    // blocks.
    pub fn drain(&self) -> Vec<E> {
        self.rx.try_iter().collect()
    }

    // Jobs submitted but not yet finished. Observability only; the
    // count is racy by nature.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl<E: Send + 'static> Default for JobDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn drain_until<E: Send + 'static>(
        dispatcher: &JobDispatcher<E>,
        count: usize,
    ) -> Vec<E> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut results = Vec::new();
        while results.len() < count {
            results.extend(dispatcher.drain());
            assert!(Instant::now() < deadline, "jobs did not complete in time");
            thread::sleep(Duration::from_millis(1));
        }
        results
    }

    #[test]
    fn completions_arrive_in_finishing_order() {
        let dispatcher = JobDispatcher::new();
        // Staggered durations: submitted slow-first, finishing fast-first.
        for (id, delay_ms) in [(0u32, 120u64), (1, 60), (2, 5)] {
            dispatcher.submit(move || {
                thread::sleep(Duration::from_millis(delay_ms));
                id
            });
        }
        let results = drain_until(&dispatcher, 3);
        assert_eq!(results, vec![2, 1, 0]);
    }

    #[test]
    fn drain_is_empty_when_nothing_finished() {
        let dispatcher: JobDispatcher<u32> = JobDispatcher::new();
        assert!(dispatcher.drain().is_empty());
    }

    #[test]
    fn in_flight_returns_to_zero() {
        let dispatcher = JobDispatcher::new();
        for _ in 0..4 {
            dispatcher.submit(|| 1u32);
        }
        let results = drain_until(&dispatcher, 4);
        assert_eq!(results.len(), 4);
        // All results were delivered, so every worker has finished
        // (or is about to); wait for the counter to settle.
        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.in_flight() > 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn results_carry_owned_data() {
        let dispatcher = JobDispatcher::new();
        dispatcher.submit(|| vec![1.0f32; 1024]);
        let results = drain_until(&dispatcher, 1);
        assert_eq!(results[0].len(), 1024);
    }
}
