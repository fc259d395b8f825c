//! # Particle System
//!
//! Drives particle lifecycles on a [`SlotPool`].
//!
//! ## Update Order (per tick)
//!
//! ```text
//! 1. reconcile           ◄─ heal lists after in-place terminations
//! 2. locked scan         ◄─ count down, check owners, end or release
//! 3. drain deferred      ◄─ guard exit: activations, then releases
//! ```
//!
//! Ending a particle does not always free its slot. A lingering definition
//! turns it into a ghost: out of the game, still displayed until its frames
//! run out.

use cinder_core::{
    DefinitionId, OwnerRef, OwnerRegistry, PoolError, PoolResult, SlotPool, SlotRef, SlotSetup,
    SlotState, TickSource,
};

use crate::config::ParticleConfig;
use crate::definition::{DefinitionRegistry, ParticleDefinition, SharedRegistry};
use crate::error::{ParticleError, ParticleResult};

/// A request to place one particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Definition to spawn.
    pub definition: DefinitionId,
    /// Owning character, if any.
    pub owner: Option<OwnerRef>,
    /// Evict another particle if the pool is full.
    pub force: bool,
}

impl SpawnRequest {
    /// Unowned, unforced request.
    #[inline]
    #[must_use]
    pub const fn new(definition: DefinitionId) -> Self {
        Self {
            definition,
            owner: None,
            force: false,
        }
    }

    /// Attaches an owner.
    #[inline]
    #[must_use]
    pub const fn owned_by(mut self, owner: OwnerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Allows eviction.
    #[inline]
    #[must_use]
    pub const fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// What ending a particle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ending {
    /// Left the game; keeps displaying until its frames run out.
    Ghosted,
    /// Released immediately.
    Released,
    /// Release queued behind a scan.
    Deferred,
}

/// Counters from one [`ParticleSystem::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Ticks counted down this update. The first update after construction
    /// or a reset counts one tick unless the clock was synced.
    pub elapsed: u32,
    /// Slots moved by reconcile.
    pub reconciled: usize,
    /// Displayed particles visited.
    pub visited: usize,
    /// Particles whose lifetime ran out.
    pub expired: usize,
    /// Particles ended because their owner died.
    pub orphaned: usize,
    /// Particles that outlived their owner and dropped the reference.
    pub detached: usize,
    /// Particles turned into ghosts.
    pub ghosted: usize,
    /// Particles whose slot is freed at the end of the scan.
    pub released: usize,
    /// Releases that could not be queued; retried next tick.
    pub postponed: usize,
}

/// Spawns, updates and ends particles.
///
/// # Example
///
/// ```rust,ignore
/// let registry = SharedRegistry::default();
/// registry.write().load_globals_toml(&globals)?;
///
/// let mut particles = ParticleSystem::new(&ParticleConfig::default(), registry)?;
/// particles.spawn(SpawnRequest::new(GlobalDefinition::Splash.id()))?;
///
/// let stats = particles.update(&tick, &characters);
/// ```
pub struct ParticleSystem {
    pool: SlotPool,
    registry: SharedRegistry,
    ghost_linger_frames: u32,
    last_tick: Option<u64>,
}

impl ParticleSystem {
    /// Builds the pool and attaches the registry.
    ///
    /// # Errors
    ///
    /// [`ParticleError::Config`] if the pool config is invalid.
    pub fn new(config: &ParticleConfig, registry: SharedRegistry) -> ParticleResult<Self> {
        Ok(Self {
            pool: SlotPool::with_config(&config.pool)?,
            registry,
            ghost_linger_frames: config.ghost_linger_frames,
            last_tick: None,
        })
    }

    /// Starts counting from the tick reported by `clock`.
    ///
    /// Call when the system is created or reset mid-session so the next
    /// update only counts the ticks that pass from here on.
    pub fn sync_clock<T: TickSource + ?Sized>(&mut self, clock: &T) {
        self.last_tick = Some(clock.now());
    }

    /// The underlying pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Mutable access to the pool, for collaborators that update records
    /// directly.
    #[inline]
    pub fn pool_mut(&mut self) -> &mut SlotPool {
        &mut self.pool
    }

    /// The shared definition registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Tick of the last update or clock sync, `None` before either.
    #[inline]
    #[must_use]
    pub const fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// Places a particle.
    ///
    /// # Errors
    ///
    /// [`ParticleError::DefinitionUnresolved`] if the definition is not
    /// loaded, otherwise the pool's refusal.
    pub fn spawn(&mut self, request: SpawnRequest) -> ParticleResult<SlotRef> {
        let registry = self.registry.read();
        spawn_into(&mut self.pool, &registry, request)
    }

    /// Takes a particle out of the game.
    ///
    /// # Errors
    ///
    /// Reference errors from the pool.
    pub fn end_in_game(&mut self, slot: SlotRef) -> ParticleResult<Ending> {
        let registry = self.registry.read();
        let definition = self
            .pool
            .get(slot)
            .and_then(|record| record.definition())
            .and_then(|id| registry.get(id));
        Ok(end_particle(
            &mut self.pool,
            slot,
            definition,
            self.ghost_linger_frames,
        )?)
    }

    /// Advances every displayed particle to the tick reported by `clock`.
    ///
    /// Lifetimes count down by the ticks elapsed since the previous update
    /// (or [`Self::sync_clock`]); a first update with no reference point
    /// counts a single tick.
    /// Particles whose owner has died end if their definition says so and
    /// otherwise forget the owner. Expired particles end; ghosts with no
    /// frames left are released. Slots are freed when the scan finishes.
    pub fn update<T, R>(&mut self, clock: &T, owners: &R) -> UpdateStats
    where
        T: TickSource + ?Sized,
        R: OwnerRegistry + ?Sized,
    {
        let now = clock.now();
        let elapsed = match self.last_tick {
            Some(last) => u32::try_from(now.saturating_sub(last)).unwrap_or(u32::MAX),
            None => 1,
        };
        self.last_tick = Some(self.last_tick.map_or(now, |last| last.max(now)));

        let mut stats = UpdateStats {
            elapsed,
            reconciled: self.pool.reconcile(),
            ..UpdateStats::default()
        };

        let registry = self.registry.read();
        let linger_cap = self.ghost_linger_frames;

        let visited = self.pool.for_each_active(|pool, slot| {
            let Some(record) = pool.get_mut(slot) else {
                return;
            };
            let definition = record.definition().and_then(|id| registry.get(id));

            if let Some(owner) = record.owner() {
                if !owners.is_alive(owner) {
                    if definition.is_some_and(|definition| definition.end_with_owner) {
                        stats.orphaned += 1;
                        tally(&mut stats, end_particle(pool, slot, definition, linger_cap));
                        return;
                    }
                    record.detach_owner();
                    stats.detached += 1;
                }
            }

            if record.is_ghost() {
                if record.count_down_frames(elapsed) {
                    tally(&mut stats, pool.release(slot).map(|_| Ending::Deferred));
                }
                return;
            }

            if record.count_down_lifetime(elapsed) {
                stats.expired += 1;
                tally(&mut stats, end_particle(pool, slot, definition, linger_cap));
            }
        });
        drop(registry);
        stats.visited = visited;

        tracing::debug!(
            tick = now,
            elapsed = stats.elapsed,
            visited = stats.visited,
            expired = stats.expired,
            ghosted = stats.ghosted,
            released = stats.released,
            used = self.pool.used_count(),
            "particle update"
        );
        stats
    }

    /// Non-ghost particles currently displayed.
    pub fn in_game(&self) -> impl Iterator<Item = SlotRef> + '_ {
        self.pool.iter_in_game()
    }

    /// Every displayed particle, ghosts included.
    pub fn displayed(&self) -> impl Iterator<Item = SlotRef> + '_ {
        self.pool.iter_active()
    }

    /// Ends every particle at once, e.g. between levels.
    ///
    /// Returns `false` if the pool is locked. The clock reference is
    /// dropped with the particles.
    pub fn reset(&mut self) -> bool {
        let cleared = self.pool.clear();
        if cleared {
            self.last_tick = None;
            tracing::debug!(capacity = self.pool.capacity(), "particle pool reset");
        }
        cleared
    }
}

/// Places a particle directly on a pool.
///
/// Usable from inside a scan, e.g. to spawn trail particles while visiting;
/// the new particle then becomes visible once the scan ends.
///
/// # Errors
///
/// [`ParticleError::DefinitionUnresolved`] if the definition is not
/// loaded, otherwise the pool's refusal. A particle that cannot be
/// activated is released again; if the release cannot be queued either,
/// the record is terminated in place and the next reconcile frees it.
pub fn spawn_into(
    pool: &mut SlotPool,
    definitions: &DefinitionRegistry,
    request: SpawnRequest,
) -> ParticleResult<SlotRef> {
    let definition = definitions
        .get(request.definition)
        .ok_or(ParticleError::DefinitionUnresolved(request.definition))?;

    let slot = pool.allocate(request.force, definitions)?;
    let setup = SlotSetup {
        definition: Some(request.definition),
        owner: request.owner,
        lifetime: definition.lifetime_ticks,
        frames: definition.frames,
    };
    let configured = match pool.get_mut(slot) {
        Some(record) => record.configure(setup).map_err(|source| PoolError::InvalidTransition {
            index: slot.index(),
            source,
        }),
        None => Err(PoolError::InvalidIndex {
            index: slot.index(),
        }),
    };

    let activated = configured.and_then(|()| pool.activate(slot).map(|_| ()));
    if let Err(error) = activated {
        if let Err(rollback) = pool.release(slot) {
            if let Some(record) = pool.get_mut(slot) {
                record.terminate_in_place();
            }
            tracing::debug!(%slot, %rollback, "spawn rollback left to reconcile");
        }
        return Err(error.into());
    }

    tracing::trace!(%slot, definition = %request.definition, "particle spawned");
    Ok(slot)
}

/// Ends one particle: ghost if its definition lingers and frames remain,
/// release otherwise.
fn end_particle(
    pool: &mut SlotPool,
    slot: SlotRef,
    definition: Option<&ParticleDefinition>,
    linger_cap: u32,
) -> PoolResult<Ending> {
    let lingers = linger_cap > 0 && definition.is_some_and(|definition| definition.linger);
    if let Some(record) = pool.get_mut(slot) {
        let frames = record.frames_remaining();
        if lingers && frames > 0 && !record.is_ghost() && record.state() == SlotState::Active {
            record.make_ghost();
            if frames > linger_cap {
                record.count_down_frames(frames - linger_cap);
            }
            return Ok(Ending::Ghosted);
        }
    }

    match pool.release(slot)? {
        cinder_core::Outcome::Applied => Ok(Ending::Released),
        cinder_core::Outcome::Deferred => Ok(Ending::Deferred),
    }
}

fn tally(stats: &mut UpdateStats, ending: PoolResult<Ending>) {
    match ending {
        Ok(Ending::Ghosted) => stats.ghosted += 1,
        Ok(Ending::Released | Ending::Deferred) => stats.released += 1,
        Err(PoolError::QueueFull { .. }) => stats.postponed += 1,
        Err(error) => tracing::warn!(%error, "particle could not be ended"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn system(capacity: usize) -> (ParticleSystem, DefinitionId, DefinitionId) {
        let registry = SharedRegistry::default();
        let spark = registry.write().register(ParticleDefinition::new("spark", 3, 0));
        let splash = registry
            .write()
            .register(ParticleDefinition::new("splash", 2, 4).lingering());
        let config = ParticleConfig {
            pool: cinder_core::PoolConfig::new(capacity),
            ghost_linger_frames: 8,
        };
        (ParticleSystem::new(&config, registry).unwrap(), spark, splash)
    }

    #[test]
    fn test_spawn_configures_from_definition() {
        let (mut particles, spark, _) = system(4);
        let slot = particles
            .spawn(SpawnRequest::new(spark).owned_by(OwnerRef(7)))
            .unwrap();

        let record = particles.pool().get(slot).unwrap();
        assert_eq!(record.lifetime_remaining(), 3);
        assert_eq!(record.owner(), Some(OwnerRef(7)));
        assert!(record.is_in_game());
    }

    #[test]
    fn test_spawn_unknown_definition() {
        let (mut particles, _, _) = system(4);
        assert!(matches!(
            particles.spawn(SpawnRequest::new(DefinitionId(999))),
            Err(ParticleError::DefinitionUnresolved(DefinitionId(999)))
        ));
        assert_eq!(particles.pool().used_count(), 0);
    }

    #[test]
    fn test_end_in_game_ghosts_lingering_particles() {
        let (mut particles, spark, splash) = system(4);
        let plain = particles.spawn(SpawnRequest::new(spark)).unwrap();
        let lingering = particles.spawn(SpawnRequest::new(splash)).unwrap();

        assert_eq!(particles.end_in_game(plain).unwrap(), Ending::Released);
        assert_eq!(particles.end_in_game(lingering).unwrap(), Ending::Ghosted);

        assert_eq!(particles.in_game().count(), 0);
        assert_eq!(particles.displayed().collect::<Vec<_>>(), vec![lingering]);
        // Ending a ghost again releases it.
        assert_eq!(particles.end_in_game(lingering).unwrap(), Ending::Released);
        assert_eq!(particles.pool().used_count(), 0);
    }

    #[test]
    fn test_ghost_frames_capped() {
        let registry = SharedRegistry::default();
        let smoke = registry
            .write()
            .register(ParticleDefinition::new("smoke", 1, 50).lingering());
        let config = ParticleConfig {
            pool: cinder_core::PoolConfig::new(2),
            ghost_linger_frames: 5,
        };
        let mut particles = ParticleSystem::new(&config, registry).unwrap();
        let slot = particles.spawn(SpawnRequest::new(smoke)).unwrap();

        particles.end_in_game(slot).unwrap();
        assert_eq!(particles.pool().get(slot).unwrap().frames_remaining(), 5);
    }

    #[test]
    fn test_update_counts_elapsed_ticks() {
        let (mut particles, spark, _) = system(4);
        let slot = particles.spawn(SpawnRequest::new(spark)).unwrap();
        let owners: HashSet<OwnerRef> = HashSet::new();

        particles.sync_clock(&0u64);
        let stats = particles.update(&2u64, &owners);
        assert_eq!(stats.elapsed, 2);
        assert_eq!(stats.visited, 1);
        assert_eq!(particles.pool().get(slot).unwrap().lifetime_remaining(), 1);

        // Time never runs backwards.
        assert_eq!(particles.update(&1u64, &owners).elapsed, 0);
        assert_eq!(particles.last_tick(), Some(2));
    }

    #[test]
    fn test_first_update_mid_session_counts_one_tick() {
        let registry = SharedRegistry::default();
        let glow = registry.write().register(ParticleDefinition::new("glow", 60, 0));
        let mut particles = ParticleSystem::new(&ParticleConfig::default(), registry).unwrap();
        let slot = particles.spawn(SpawnRequest::new(glow)).unwrap();
        let owners: HashSet<OwnerRef> = HashSet::new();
        assert_eq!(particles.last_tick(), None);

        let stats = particles.update(&10_001u64, &owners);
        assert_eq!(stats.elapsed, 1);
        assert_eq!(stats.expired, 0);
        assert_eq!(particles.pool().get(slot).unwrap().lifetime_remaining(), 59);

        assert_eq!(particles.update(&10_004u64, &owners).elapsed, 3);
        assert_eq!(particles.pool().get(slot).unwrap().lifetime_remaining(), 56);
    }

    #[test]
    fn test_synced_clock_counts_from_sync_point() {
        let (mut particles, spark, _) = system(4);
        particles.sync_clock(&500u64);
        let slot = particles.spawn(SpawnRequest::new(spark)).unwrap();
        let owners: HashSet<OwnerRef> = HashSet::new();

        assert_eq!(particles.update(&502u64, &owners).elapsed, 2);
        assert_eq!(particles.pool().get(slot).unwrap().lifetime_remaining(), 1);
    }

    #[test]
    fn test_spawn_rollback_with_full_queues_is_freed_next_update() {
        let registry = SharedRegistry::default();
        let spark = registry.write().register(ParticleDefinition::new("spark", 5, 0));
        let config = ParticleConfig {
            pool: cinder_core::PoolConfig {
                activation_queue: Some(1),
                termination_queue: Some(1),
                ..cinder_core::PoolConfig::new(8)
            },
            ghost_linger_frames: 0,
        };
        let mut particles = ParticleSystem::new(&config, registry.clone()).unwrap();
        let anchor = particles.spawn(SpawnRequest::new(spark)).unwrap();

        let mut rejected = 0;
        {
            let definitions = registry.read();
            particles.pool_mut().for_each_active(|pool, slot| {
                assert_eq!(pool.release(slot), Ok(cinder_core::Outcome::Deferred));
                spawn_into(pool, &definitions, SpawnRequest::new(spark)).unwrap();
                let overflow = spawn_into(pool, &definitions, SpawnRequest::new(spark));
                assert!(matches!(
                    overflow,
                    Err(ParticleError::Pool(PoolError::QueueFull { .. }))
                ));
                rejected += 1;
            });
        }
        assert_eq!(rejected, 1);
        assert!(particles.pool().get(anchor).is_none());
        assert_eq!(particles.pool().used_count(), 2);

        let owners: HashSet<OwnerRef> = HashSet::new();
        let stats = particles.update(&1u64, &owners);
        assert_eq!(stats.reconciled, 1);
        assert_eq!(particles.pool().used_count(), 1);
        assert!(particles
            .pool()
            .records()
            .iter()
            .all(|record| record.state() != SlotState::Constructing));
        assert!(particles.pool().is_consistent());
    }

    #[test]
    fn test_reset_frees_everything() {
        let (mut particles, spark, splash) = system(4);
        particles.spawn(SpawnRequest::new(spark)).unwrap();
        particles.spawn(SpawnRequest::new(splash)).unwrap();

        particles.update(&7u64, &HashSet::<OwnerRef>::new());

        assert!(particles.reset());
        assert_eq!(particles.pool().free_count(), 4);
        assert_eq!(particles.last_tick(), None);
    }
}
