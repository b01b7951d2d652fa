//! End-to-end pipeline tests: events in, attack/move requests out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use skirmish_core::{
    EngineConfig, EntityId, ManualClock, MovementPattern, PathOptions, Pathfinder, Position,
    RuleSet, SpeciesId, TargetingRule,
};
use skirmish_runtime::{
    AttackOracle, CombatEngine, EntitySnapshot, EventBus, MemoryProfileStore, MoveOracle,
    OracleManager, ProfileStore, SpatialOracle, TickWorker, WorkerConfig, WorldEvent,
    decode_profile, encode_profile, profile_key,
};

// ----------------------------------------------------------------------------
// World fakes
// ----------------------------------------------------------------------------

struct StubSpatial {
    actor: Position,
    hostiles: Vec<EntitySnapshot>,
}

#[async_trait]
impl SpatialOracle for StubSpatial {
    async fn hostiles_nearby(&self, _radius: i32) -> Vec<EntitySnapshot> {
        self.hostiles.clone()
    }

    async fn actor_position(&self) -> Position {
        self.actor
    }
}

/// A path exists whenever the straight-line distance fits the budget.
struct LinePathfinder;

impl Pathfinder for LinePathfinder {
    fn find_path(
        &self,
        from: Position,
        to: Position,
        max_length: i32,
        _options: PathOptions,
    ) -> Option<Vec<Position>> {
        let distance = from.chebyshev_distance(&to);
        if distance == i32::MAX || distance > max_length {
            return None;
        }
        Some((0..distance).map(|i| from.offset(i + 1, 0)).collect())
    }
}

#[derive(Default)]
struct RecordingMover {
    moves: Mutex<Vec<Position>>,
}

impl MoveOracle for RecordingMover {
    fn attempt_move(&self, target: Position, _tolerance: i32, _options: PathOptions) -> bool {
        self.moves.lock().unwrap().push(target);
        true
    }
}

#[derive(Default)]
struct RecordingAttacker {
    calls: Mutex<Vec<Option<EntityId>>>,
}

impl AttackOracle for RecordingAttacker {
    fn set_attack_target(&self, id: EntityId) -> bool {
        self.calls.lock().unwrap().push(Some(id));
        true
    }

    fn cancel_attack(&self) {
        self.calls.lock().unwrap().push(None);
    }
}

struct Harness {
    engine: CombatEngine,
    clock: ManualClock,
    mover: Arc<RecordingMover>,
    attacker: Arc<RecordingAttacker>,
    profiles: Arc<MemoryProfileStore>,
}

fn harness(rules: RuleSet) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let clock = ManualClock::new(10_000);
    let mover = Arc::new(RecordingMover::default());
    let attacker = Arc::new(RecordingAttacker::default());
    let profiles = Arc::new(MemoryProfileStore::new());
    let oracles = OracleManager::new(
        Arc::new(StubSpatial {
            actor: Position::new(0, 0, 0),
            hostiles: Vec::new(),
        }),
        Arc::new(LinePathfinder),
        Arc::clone(&mover) as Arc<dyn MoveOracle>,
        Arc::clone(&attacker) as Arc<dyn AttackOracle>,
        Arc::clone(&profiles) as Arc<dyn skirmish_runtime::ProfileStore>,
    );
    let engine = CombatEngine::new(
        EngineConfig::default(),
        Arc::new(clock.clone()),
        oracles,
        rules,
    );
    Harness {
        engine,
        clock,
        mover,
        attacker,
        profiles,
    }
}

fn spider_rules() -> RuleSet {
    RuleSet::new(vec![TargetingRule::new("Spider", 3, 8)]).unwrap()
}

fn spider(id: u64, x: i32, y: i32, health_pct: u8) -> EntitySnapshot {
    EntitySnapshot {
        id: EntityId(id),
        species: SpeciesId(1),
        species_name: "Spider".into(),
        position: Position::new(x, y, 0),
        health_pct,
        speed: 1.0,
    }
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[test]
fn locks_the_weakest_hostile_and_chases_it() {
    let mut h = harness(spider_rules());

    h.engine.apply_event(&WorldEvent::ActorMoved {
        position: Position::new(0, 0, 0),
    });
    for snapshot in [spider(1, 3, 0, 100), spider(2, 3, 1, 40), spider(3, -3, 0, 8)] {
        h.engine.apply_event(&WorldEvent::EntityAppeared { entity: snapshot });
    }

    let outcome = h.engine.tick();

    // The nearly-dead hostile wins the lock.
    assert_eq!(outcome.target, Some(EntityId(3)));
    assert_eq!(h.attacker.calls.lock().unwrap().as_slice(), &[Some(EntityId(3))]);

    // Chase was proposed, approved, and executed toward it.
    assert!(outcome.decision.should_move);
    let executed = outcome.executed.unwrap();
    assert!(executed.success, "move failed: {:?}", executed.reason);
    assert_eq!(h.mover.moves.lock().unwrap().as_slice(), &[Position::new(-3, 0, 0)]);
}

#[test]
fn vanished_target_is_released_and_attack_cancelled() {
    let mut h = harness(spider_rules());
    h.engine
        .apply_event(&WorldEvent::EntityAppeared { entity: spider(1, 3, 0, 50) });
    h.engine.tick();
    assert_eq!(h.engine.current_target(), Some(EntityId(1)));

    h.engine
        .apply_event(&WorldEvent::EntityDisappeared { id: EntityId(1) });

    assert_eq!(h.engine.current_target(), None);
    let calls = h.attacker.calls.lock().unwrap();
    assert_eq!(calls.last(), Some(&None), "expected a cancel call");
}

#[test]
fn stored_wave_profile_drives_a_dodge() {
    let mut h = harness(spider_rules());

    // A previous session learned this species fires waves.
    let mut profile = skirmish_core::BehaviorProfile::new(SpeciesId(1));
    profile.is_wave_attacker = true;
    profile.confidence = 0.8;
    h.profiles
        .set(&profile_key(SpeciesId(1)), encode_profile(&profile).unwrap());

    h.engine
        .apply_event(&WorldEvent::EntityAppeared { entity: spider(1, 3, 0, 90) });

    // Two waves four seconds apart establish the cadence.
    h.engine.apply_event(&WorldEvent::EntityAttacked {
        id: EntityId(1),
        damage: 40.0,
        is_wave: true,
    });
    h.clock.advance(4_000);
    h.engine.apply_event(&WorldEvent::EntityAttacked {
        id: EntityId(1),
        damage: 40.0,
        is_wave: true,
    });

    // 700ms before the predicted third wave.
    h.clock.advance(3_300);
    let outcome = h.engine.tick();

    assert!(outcome.decision.should_move);
    let intent = outcome.decision.intent.unwrap();
    assert_eq!(intent.kind, skirmish_core::IntentKind::WaveAvoidance);
    // Perpendicular dodge, not a retreat along the attack line.
    assert_eq!(intent.position.x, 0);
    assert_ne!(intent.position.y, 0);
}

#[test]
fn movement_samples_feed_the_classifier_and_persist() {
    let mut h = harness(spider_rules());
    h.engine
        .apply_event(&WorldEvent::EntityAppeared { entity: spider(1, 6, 0, 100) });
    h.engine.tick();

    // The spider closes in over and over; one reset per cycle keeps it in
    // range.
    let cycle = [5, 4, 3, 2, 6];
    for _ in 0..6 {
        for &x in &cycle {
            h.clock.advance(200);
            h.engine.apply_event(&WorldEvent::EntityMoved {
                id: EntityId(1),
                position: Position::new(x, 0, 0),
                facing_actor: true,
            });
            h.engine.tick();
        }
    }

    let profile = h
        .engine
        .behavior()
        .profile(SpeciesId(1))
        .expect("classifier pass should have produced a profile");
    assert_eq!(profile.movement_pattern, MovementPattern::Chase);
    assert!(profile.is_aggressive);
    assert!(profile.sample_count >= 10);

    // And it survived to the blob store.
    let blob = h
        .profiles
        .get(&profile_key(SpeciesId(1)))
        .expect("profile should be persisted");
    let stored = decode_profile(&blob).unwrap();
    assert_eq!(stored.movement_pattern, MovementPattern::Chase);
}

#[tokio::test]
async fn refresh_from_world_seeds_the_cache() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let clock = ManualClock::new(10_000);
    let oracles = OracleManager::new(
        Arc::new(StubSpatial {
            actor: Position::new(5, 5, 0),
            hostiles: vec![spider(1, 7, 5, 80), spider(2, 9, 9, 60)],
        }),
        Arc::new(LinePathfinder),
        Arc::new(RecordingMover::default()),
        Arc::new(RecordingAttacker::default()),
        Arc::new(MemoryProfileStore::new()),
    );
    let mut engine = CombatEngine::new(
        EngineConfig::default(),
        Arc::new(clock),
        oracles,
        spider_rules(),
    );

    engine.refresh_from_world().await;

    assert_eq!(engine.cache().len(), 2);
    assert_eq!(engine.cache().actor_position(), Position::new(5, 5, 0));
}

#[tokio::test(start_paused = true)]
async fn worker_ticks_and_reacts_to_event_bursts() {
    let h = harness(spider_rules());
    let attacker = Arc::clone(&h.attacker);
    let engine = Arc::new(Mutex::new(h.engine));

    let worker = TickWorker::new(
        Arc::clone(&engine),
        WorkerConfig {
            tick_interval_ms: 250,
            debounce_ms: 50,
        },
    );
    let mut bus = EventBus::new();
    worker.attach(&mut bus);
    let handle = worker.spawn();

    bus.publish(&WorldEvent::EntityAppeared { entity: spider(1, 3, 0, 50) });
    // Debounce plus slack; the paused clock fast-forwards through it.
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(
        engine.lock().unwrap().current_target(),
        Some(EntityId(1)),
        "worker never evaluated the appeared hostile"
    );
    assert!(!attacker.calls.lock().unwrap().is_empty());

    handle.stop().await;
}
