//! Typed world-event bus.
//!
//! The host process translates whatever it hears from the game world into
//! [`WorldEvent`]s and publishes them here. Dispatch is synchronous and
//! priority-ordered: the whole decision pipeline runs on one logical
//! thread, so handlers run inline in registration-priority order instead
//! of racing over channels. Higher priority runs first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use skirmish_core::{EntityId, Position};

use crate::oracle::EntitySnapshot;

/// Topics for event routing. Closed set; one per [`WorldEvent`] variant
/// family.
#[derive(
    Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Topic {
    EntityAppeared,
    EntityMoved,
    EntityHealthChanged,
    EntityDisappeared,
    EntityAttacked,
    ActorMoved,
    CombatTargetChanged,
}

/// One observation from the game world. Serializable so hosts can keep
/// session logs of the raw event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A hostile entered observation range.
    EntityAppeared { entity: EntitySnapshot },
    /// A tracked entity moved. `facing_actor` is the host's read of its
    /// orientation after the move.
    EntityMoved {
        id: EntityId,
        position: Position,
        facing_actor: bool,
    },
    EntityHealthChanged { id: EntityId, health_pct: u8 },
    /// Left range, despawned, or died off-screen.
    EntityDisappeared { id: EntityId },
    /// The entity attacked the actor. `is_wave` marks area-burst attacks.
    EntityAttacked {
        id: EntityId,
        damage: f64,
        is_wave: bool,
    },
    ActorMoved { position: Position },
    /// The world confirmed (or cleared) the actor's combat target.
    CombatTargetChanged { target: Option<EntityId> },
}

impl WorldEvent {
    pub fn topic(&self) -> Topic {
        match self {
            WorldEvent::EntityAppeared { .. } => Topic::EntityAppeared,
            WorldEvent::EntityMoved { .. } => Topic::EntityMoved,
            WorldEvent::EntityHealthChanged { .. } => Topic::EntityHealthChanged,
            WorldEvent::EntityDisappeared { .. } => Topic::EntityDisappeared,
            WorldEvent::EntityAttacked { .. } => Topic::EntityAttacked,
            WorldEvent::ActorMoved { .. } => Topic::ActorMoved,
            WorldEvent::CombatTargetChanged { .. } => Topic::CombatTargetChanged,
        }
    }
}

/// Boxed event callback. Handlers must not publish back into the bus.
pub type EventHandler = Box<dyn FnMut(&WorldEvent) + Send>;

struct Subscription {
    priority: i32,
    /// Insertion index; ties on priority dispatch in subscription order.
    seq: u64,
    handler: EventHandler,
}

/// Topic-keyed synchronous event bus.
///
/// Handlers subscribe to explicit topics (or all of them) with a
/// priority; `publish` dispatches inline, highest priority first.
#[derive(Default)]
pub struct EventBus {
    by_topic: HashMap<Topic, Vec<Subscription>>,
    all_topics: Vec<Subscription>,
    next_seq: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to specific topics.
    pub fn subscribe(
        &mut self,
        topics: &[Topic],
        priority: i32,
        handler: EventHandler,
    ) {
        // One handler, many topics: the closure cannot be cloned, so a
        // multi-topic subscription goes through the catch-all list with a
        // topic filter instead.
        if topics.len() == 1 {
            self.push_subscription(Some(topics[0]), priority, handler);
        } else {
            let filter: Vec<Topic> = topics.to_vec();
            let mut inner = handler;
            self.push_subscription(
                None,
                priority,
                Box::new(move |event| {
                    if filter.contains(&event.topic()) {
                        inner(event);
                    }
                }),
            );
        }
    }

    /// Subscribes a handler to every topic.
    pub fn subscribe_all(&mut self, priority: i32, handler: EventHandler) {
        self.push_subscription(None, priority, handler);
    }

    /// Dispatches one event to all matching handlers, highest priority
    /// first.
    pub fn publish(&mut self, event: &WorldEvent) {
        let topic = event.topic();
        tracing::trace!("bus: publish {topic}");

        // Merge the per-topic and catch-all lists by priority. Both lists
        // are kept sorted at subscription time.
        let empty: &mut Vec<Subscription> = &mut Vec::new();
        let topical = self.by_topic.get_mut(&topic).unwrap_or(empty);
        let (mut i, mut j) = (0, 0);
        while i < topical.len() || j < self.all_topics.len() {
            let pick_topical = match (topical.get(i), self.all_topics.get(j)) {
                (Some(a), Some(b)) => (a.priority, std::cmp::Reverse(a.seq))
                    >= (b.priority, std::cmp::Reverse(b.seq)),
                (Some(_), None) => true,
                (None, _) => false,
            };
            if pick_topical {
                (topical[i].handler)(event);
                i += 1;
            } else {
                (self.all_topics[j].handler)(event);
                j += 1;
            }
        }
    }

    fn push_subscription(&mut self, topic: Option<Topic>, priority: i32, handler: EventHandler) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let subscription = Subscription {
            priority,
            seq,
            handler,
        };
        let list = match topic {
            Some(topic) => self.by_topic.entry(topic).or_default(),
            None => &mut self.all_topics,
        };
        // Highest priority first; stable on insertion order.
        let at = list
            .iter()
            .position(|s| s.priority < priority)
            .unwrap_or(list.len());
        list.insert(at, subscription);
    }
}
