use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::policy::{BellCounters, BellType, PolicyMode};
use crate::scheduler::EntryId;

/// Every observable state change in the core produces an Event.
/// Collaborators (UI, session logging, storage) subscribe to them on the
/// [`EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        interval_ms: u64,
        start_time_ms: u64,
    },
    TimerTick {
        elapsed_ms: u64,
        remaining_ms: u64,
        drift_ms: i64,
    },
    TimerPaused {
        elapsed_ms: u64,
    },
    TimerResumed {
        pause_duration_ms: u64,
    },
    TimerStopped {
        elapsed_ms: u64,
        total_drift_ms: u64,
        tick_count: u64,
    },
    TimerCompleted {
        drift_ms: i64,
    },
    BellScheduled {
        id: EntryId,
        bell_type: BellType,
        /// Target on the audio-rendering clock, in seconds.
        target_time: f64,
        delay_ms: u64,
    },
    BellRing {
        bell_type: BellType,
        timestamp: NaiveDateTime,
        mode: PolicyMode,
        counters: BellCounters,
    },
    /// A policy ran out of eligible deadlines and stopped its timer.
    SessionComplete {
        mode: PolicyMode,
        counters: BellCounters,
    },
    AudioError {
        message: String,
        entry_id: Option<EntryId>,
    },
    AudioLoaded {
        bell_type: BellType,
        frames: usize,
    },
}

impl Event {
    /// Dotted event name as seen by subscribers filtering on topic.
    pub fn name(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer.start",
            Event::TimerTick { .. } => "timer.tick",
            Event::TimerPaused { .. } => "timer.pause",
            Event::TimerResumed { .. } => "timer.resume",
            Event::TimerStopped { .. } => "timer.stop",
            Event::TimerCompleted { .. } => "timer.complete",
            Event::BellScheduled { .. } => "bell.scheduled",
            Event::BellRing { .. } => "bell.ring",
            Event::SessionComplete { .. } => "session.complete",
            Event::AudioError { .. } => "audio.error",
            Event::AudioLoaded { .. } => "audio.loaded",
        }
    }
}

/// Opaque handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Handler = Box<dyn FnMut(&Event) -> HandlerResult>;

struct Subscriber {
    id: SubscriberId,
    topic: Option<&'static str>,
    handler: Handler,
}

/// Synchronous publish/subscribe bus.
///
/// Subscribers run inline, in registration order. A subscriber that returns
/// an error or panics is logged and skipped; it never affects the publisher
/// or the remaining subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriberId
    where
        F: FnMut(&Event) -> HandlerResult + 'static,
    {
        self.insert(None, Box::new(handler))
    }

    /// Receive only events whose [`Event::name`] equals `topic`.
    pub fn subscribe_to<F>(&mut self, topic: &'static str, handler: F) -> SubscriberId
    where
        F: FnMut(&Event) -> HandlerResult + 'static,
    {
        self.insert(Some(topic), Box::new(handler))
    }

    /// Returns false if the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish(&mut self, event: &Event) {
        let name = event.name();
        for sub in self.subscribers.iter_mut() {
            if sub.topic.is_some_and(|t| t != name) {
                continue;
            }
            let handler = &mut sub.handler;
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = name, subscriber = sub.id.0, error = %e, "subscriber failed");
                }
                Err(_) => {
                    tracing::warn!(event = name, subscriber = sub.id.0, "subscriber panicked");
                }
            }
        }
    }

    pub fn publish_all<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.publish(&event);
        }
    }

    fn insert(&mut self, topic: Option<&'static str>, handler: Handler) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber { id, topic, handler });
        id
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn subscribers_receive_in_order() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |_| {
                seen.borrow_mut().push(tag);
                Ok(())
            });
        }
        bus.publish(&Event::TimerCompleted { drift_ms: 3 });
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn failing_subscriber_is_isolated() {
        let mut bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        bus.subscribe(|_| Err("boom".into()));
        bus.subscribe(|_| panic!("subscriber bug"));
        let h = Rc::clone(&hits);
        bus.subscribe(move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });
        bus.publish(&Event::TimerPaused { elapsed_ms: 10 });
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn topic_filter_and_unsubscribe() {
        let mut bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let id = bus.subscribe_to("timer.complete", move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });
        bus.publish(&Event::TimerPaused { elapsed_ms: 1 });
        bus.publish(&Event::TimerCompleted { drift_ms: 0 });
        assert_eq!(*hits.borrow(), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&Event::TimerCompleted { drift_ms: 0 });
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::TimerTick {
            elapsed_ms: 100,
            remaining_ms: 900,
            drift_ms: -2,
        })
        .unwrap();
        assert_eq!(json["type"], "timer_tick");
        assert_eq!(json["remaining_ms"], 900);
    }
}
