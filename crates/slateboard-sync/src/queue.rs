//! Realtime event queue with priorities, backpressure and rate
//! smoothing.
//!
//! The queue never owns a timer: the caller pumps [`EventQueue::tick`]
//! at roughly 60 Hz while `is_running()` and the queue marks itself
//! stopped when it drains. Capacity problems are reported as `false`
//! returns and counters, never as errors.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use serde_json::Value;

/// Priority levels, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// Auth, errors, page clears.
    Critical = 0,
    /// Messages and board content.
    High = 1,
    /// Presence, typing.
    Normal = 2,
    /// Analytics and other droppables.
    Low = 3,
}

const PRIORITIES: [EventPriority; 4] = [
    EventPriority::Critical,
    EventPriority::High,
    EventPriority::Normal,
    EventPriority::Low,
];

/// Static event-type → priority table. Unknown types are Normal.
pub fn priority_for(event_type: &str) -> EventPriority {
    match event_type {
        "system" | "board:clear" => EventPriority::Critical,
        "chat:message" | "board:stroke" | "board:object" => EventPriority::High,
        "chat:typing" | "presence:update" | "presence:online" | "presence:offline"
        | "notification" => EventPriority::Normal,
        "chat:read" => EventPriority::Low,
        _ => EventPriority::Normal,
    }
}

/// Handler key matching every event type.
pub const WILDCARD: &str = "*";

/// A queued event as seen by handlers.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event_type: String,
    pub payload: Value,
    pub priority: EventPriority,
    pub enqueued_at: Instant,
}

/// Queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Hard cap on queued events.
    pub max_queue_size: usize,
    /// Events processed per tick at most.
    pub batch_size: usize,
    /// Fraction of `max_queue_size` where backpressure starts.
    pub backpressure_threshold: f64,
    /// Rate-limiter budget per window.
    pub max_events_per_second: usize,
    /// Rate-limiter sliding window.
    pub window: Duration,
    /// Intended tick cadence (~60 Hz); the caller owns the timer.
    pub tick_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            batch_size: 50,
            backpressure_threshold: 0.8,
            max_events_per_second: 100,
            window: Duration::from_secs(1),
            tick_interval: Duration::from_millis(16),
        }
    }
}

/// Counters surfaced by [`EventQueue::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub processed: u64,
    pub dropped: u64,
    pub backpressure_events: u64,
    pub queue_size: usize,
    pub running: bool,
    pub backpressured: bool,
    pub current_rate: usize,
}

/// Sliding-window rate limiter.
#[derive(Debug)]
struct RateLimiter {
    max: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            timestamps: VecDeque::new(),
        }
    }

    fn cleanup(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn available(&mut self, now: Instant) -> usize {
        self.cleanup(now);
        self.max.saturating_sub(self.timestamps.len())
    }

    fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    fn current_rate(&mut self, now: Instant) -> usize {
        self.cleanup(now);
        self.timestamps.len()
    }
}

type Handler = Box<dyn FnMut(&QueuedEvent)>;

/// Unique handle for unregistering a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// The queue itself. Constructed per connection; no global instance.
pub struct EventQueue {
    config: QueueConfig,
    queues: [VecDeque<QueuedEvent>; 4],
    limiter: RateLimiter,
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
    next_handler: u64,
    running: bool,
    enqueued: u64,
    processed: u64,
    dropped: u64,
    backpressure_events: u64,
    backpressure_armed: bool,
    on_backpressure: Option<Box<dyn FnMut(usize)>>,
}

impl EventQueue {
    pub fn new(config: QueueConfig) -> Self {
        let limiter = RateLimiter::new(config.max_events_per_second, config.window);
        Self {
            config,
            queues: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
            limiter,
            handlers: HashMap::new(),
            next_handler: 0,
            running: false,
            enqueued: 0,
            processed: 0,
            dropped: 0,
            backpressure_events: 0,
            backpressure_armed: true,
            on_backpressure: None,
        }
    }

    // ── Handlers ────────────────────────────────────────────────────

    /// Register a handler for an event type (or [`WILDCARD`]).
    pub fn on(&mut self, event_type: &str, handler: impl FnMut(&QueuedEvent) + 'static) -> HandlerId {
        self.next_handler += 1;
        let id = HandlerId(self.next_handler);
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Unregister a handler. Returns whether it was found.
    pub fn off(&mut self, id: HandlerId) -> bool {
        for handlers in self.handlers.values_mut() {
            if let Some(pos) = handlers.iter().position(|(hid, _)| *hid == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Callback fired once per backpressure crossing, with the queue
    /// size at that moment. Re-arms when the queue drains below the
    /// threshold.
    pub fn set_backpressure_callback(&mut self, cb: impl FnMut(usize) + 'static) {
        self.on_backpressure = Some(Box::new(cb));
    }

    // ── Enqueue ─────────────────────────────────────────────────────

    pub fn enqueue(&mut self, event_type: &str, payload: Value) -> bool {
        let priority = priority_for(event_type);
        self.enqueue_with_priority(event_type, payload, priority)
    }

    pub fn enqueue_with_priority(
        &mut self,
        event_type: &str,
        payload: Value,
        priority: EventPriority,
    ) -> bool {
        let size = self.len();

        if size >= self.soft_cap() {
            if priority > EventPriority::High {
                // Droppable traffic goes first under backpressure.
                self.dropped += 1;
                return false;
            }
            self.backpressure_events += 1;
            if self.backpressure_armed {
                self.backpressure_armed = false;
                warn!("event queue backpressured at {size} events");
                if let Some(cb) = &mut self.on_backpressure {
                    cb(size);
                }
            }
        }

        if size >= self.config.max_queue_size {
            self.dropped += 1;
            return false;
        }

        self.queues[priority as usize].push_back(QueuedEvent {
            event_type: event_type.to_string(),
            payload,
            priority,
            enqueued_at: Instant::now(),
        });
        self.enqueued += 1;
        self.running = true;
        true
    }

    // ── Processing ──────────────────────────────────────────────────

    /// Process one batch. Returns the number of events handled.
    pub fn tick(&mut self) -> usize {
        self.tick_at(Instant::now())
    }

    /// Process one batch against an explicit clock.
    pub fn tick_at(&mut self, now: Instant) -> usize {
        if !self.running {
            return 0;
        }
        if self.is_empty() {
            debug!("event queue drained");
            self.running = false;
            self.backpressure_armed = true;
            return 0;
        }

        let slots = self.limiter.available(now);
        let batch = self.config.batch_size.min(slots).min(self.len());
        if batch == 0 {
            return 0;
        }

        for _ in 0..batch {
            let Some(event) = self.dequeue() else {
                break;
            };
            self.dispatch(&event);
            self.limiter.record(now);
            self.processed += 1;
        }

        if self.is_empty() {
            self.running = false;
        }
        if self.len() < self.soft_cap() {
            self.backpressure_armed = true;
        }
        batch
    }

    /// Drain everything immediately, ignoring the rate limiter, and
    /// stop ticking.
    pub fn flush(&mut self) {
        while let Some(event) = self.dequeue() {
            self.dispatch(&event);
            self.processed += 1;
        }
        self.running = false;
        self.backpressure_armed = true;
    }

    /// Discard everything without processing.
    pub fn clear(&mut self) {
        for q in &mut self.queues {
            q.clear();
        }
        self.running = false;
        self.backpressure_armed = true;
    }

    fn dequeue(&mut self) -> Option<QueuedEvent> {
        for p in PRIORITIES {
            if let Some(event) = self.queues[p as usize].pop_front() {
                return Some(event);
            }
        }
        None
    }

    fn dispatch(&mut self, event: &QueuedEvent) {
        for key in [event.event_type.as_str(), WILDCARD] {
            let Some(handlers) = self.handlers.get_mut(key) else {
                continue;
            };
            for (id, handler) in handlers.iter_mut() {
                // One panicking handler must not take down the rest.
                let result = catch_unwind(AssertUnwindSafe(|| handler(event)));
                if result.is_err() {
                    error!(
                        "handler {id:?} panicked on '{}' event",
                        event.event_type
                    );
                }
            }
        }
    }

    // ── Introspection ───────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_backpressured(&self) -> bool {
        self.len() >= self.soft_cap()
    }

    fn soft_cap(&self) -> usize {
        (self.config.max_queue_size as f64 * self.config.backpressure_threshold) as usize
    }

    pub fn stats(&mut self) -> QueueStats {
        let now = Instant::now();
        QueueStats {
            enqueued: self.enqueued,
            processed: self.processed,
            dropped: self.dropped,
            backpressure_events: self.backpressure_events,
            queue_size: self.len(),
            running: self.running,
            backpressured: self.is_backpressured(),
            current_rate: self.limiter.current_rate(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn small_queue(max: usize) -> EventQueue {
        EventQueue::new(QueueConfig {
            max_queue_size: max,
            ..Default::default()
        })
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(priority_for("system"), EventPriority::Critical);
        assert_eq!(priority_for("board:clear"), EventPriority::Critical);
        assert_eq!(priority_for("board:stroke"), EventPriority::High);
        assert_eq!(priority_for("presence:update"), EventPriority::Normal);
        assert_eq!(priority_for("chat:read"), EventPriority::Low);
        assert_eq!(priority_for("made:up"), EventPriority::Normal);
    }

    #[test]
    fn test_flush_processes_in_priority_order() {
        let mut q = EventQueue::new(QueueConfig::default());
        let order = Rc::new(RefCell::new(Vec::new()));
        let seen = order.clone();
        q.on(WILDCARD, move |e| seen.borrow_mut().push(e.event_type.clone()));

        q.enqueue("chat:read", json!({}));
        q.enqueue("presence:update", json!({}));
        q.enqueue("system", json!({}));
        q.enqueue("board:stroke", json!({}));
        q.flush();

        assert_eq!(
            *order.borrow(),
            vec!["system", "board:stroke", "presence:update", "chat:read"]
        );
        assert!(!q.is_running());
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut q = EventQueue::new(QueueConfig::default());
        let order = Rc::new(RefCell::new(Vec::new()));
        let seen = order.clone();
        q.on(WILDCARD, move |e| {
            seen.borrow_mut().push(e.payload["n"].as_u64().unwrap())
        });

        for n in 0..5 {
            q.enqueue("board:stroke", json!({ "n": n }));
        }
        q.flush();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_hard_cap_drops_exactly_one_per_attempt() {
        let mut q = small_queue(10);
        for _ in 0..10 {
            assert!(q.enqueue("system", json!({})));
        }
        assert!(!q.enqueue("system", json!({})));
        assert_eq!(q.stats().dropped, 1);
        assert_eq!(q.len(), 10);
    }

    #[test]
    fn test_soft_cap_drops_low_priority_only() {
        let mut q = small_queue(10); // soft cap 8
        for _ in 0..8 {
            q.enqueue("board:stroke", json!({}));
        }
        // Normal-and-below are shed; high/critical still get in.
        assert!(!q.enqueue("presence:update", json!({})));
        assert!(!q.enqueue("chat:read", json!({})));
        assert!(q.enqueue("chat:message", json!({})));
        assert!(q.enqueue("system", json!({})));

        let stats = q.stats();
        assert_eq!(stats.dropped, 2);
        assert!(stats.backpressured);
    }

    #[test]
    fn test_backpressure_callback_fires_once_per_crossing() {
        init_logs();
        let fired = Rc::new(RefCell::new(0));
        let counter = fired.clone();
        let mut q = small_queue(10);
        q.set_backpressure_callback(move |_| *counter.borrow_mut() += 1);

        for _ in 0..10 {
            q.enqueue("system", json!({}));
        }
        assert_eq!(*fired.borrow(), 1);

        // Drain below the threshold, then cross again.
        q.flush();
        for _ in 0..10 {
            q.enqueue("system", json!({}));
        }
        assert_eq!(*fired.borrow(), 2);
    }

    #[test]
    fn test_tick_respects_batch_and_rate_budget() {
        let mut q = EventQueue::new(QueueConfig {
            max_queue_size: 1000,
            batch_size: 5,
            max_events_per_second: 7,
            ..Default::default()
        });
        let handled = Rc::new(RefCell::new(0));
        let counter = handled.clone();
        q.on(WILDCARD, move |_| *counter.borrow_mut() += 1);

        for _ in 0..20 {
            q.enqueue("board:stroke", json!({}));
        }
        let now = Instant::now();
        assert_eq!(q.tick_at(now), 5); // batch size caps first
        assert_eq!(q.tick_at(now), 2); // then the rate budget (7 total)
        assert_eq!(q.tick_at(now), 0); // budget exhausted this window
        assert_eq!(*handled.borrow(), 7);

        // A window later the budget is back.
        let later = now + Duration::from_secs(2);
        assert_eq!(q.tick_at(later), 5);
    }

    #[test]
    fn test_queue_self_stops_when_empty_and_restarts_on_enqueue() {
        let mut q = EventQueue::new(QueueConfig::default());
        q.enqueue("system", json!({}));
        assert!(q.is_running());
        q.tick_at(Instant::now());
        q.tick_at(Instant::now());
        assert!(!q.is_running());

        q.enqueue("system", json!({}));
        assert!(q.is_running());
    }

    #[test]
    fn test_clear_discards_without_processing() {
        let mut q = EventQueue::new(QueueConfig::default());
        let handled = Rc::new(RefCell::new(0));
        let counter = handled.clone();
        q.on(WILDCARD, move |_| *counter.borrow_mut() += 1);

        q.enqueue("system", json!({}));
        q.clear();
        assert_eq!(q.len(), 0);
        assert_eq!(*handled.borrow(), 0);
        assert!(!q.is_running());
    }

    #[test]
    fn test_panicking_handler_does_not_stop_others() {
        let mut q = EventQueue::new(QueueConfig::default());
        let handled = Rc::new(RefCell::new(0));
        let counter = handled.clone();
        q.on("system", |_| panic!("boom"));
        q.on("system", move |_| *counter.borrow_mut() += 1);

        q.enqueue("system", json!({}));
        q.flush();
        assert_eq!(*handled.borrow(), 1);
    }

    #[test]
    fn test_off_unregisters() {
        let mut q = EventQueue::new(QueueConfig::default());
        let handled = Rc::new(RefCell::new(0));
        let counter = handled.clone();
        let id = q.on("system", move |_| *counter.borrow_mut() += 1);

        assert!(q.off(id));
        assert!(!q.off(id));
        q.enqueue("system", json!({}));
        q.flush();
        assert_eq!(*handled.borrow(), 0);
    }

    #[test]
    fn test_stats_shape() {
        let mut q = small_queue(10);
        for _ in 0..3 {
            q.enqueue("system", json!({}));
        }
        q.tick();
        let stats = q.stats();
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.queue_size, 0);
        assert_eq!(stats.dropped, 0);
    }
}
