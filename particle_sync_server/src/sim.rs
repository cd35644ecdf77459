// In-memory simulation used by the stand-alone server binary and the tests.
//
// `Simulation` is plain data with no locking. `SharedSimulation` wraps it in a
// single `parking_lot::Mutex` and implements `SimulationStateSource`, so the
// tick thread's `step()` and session threads' explorer upserts serialize on
// the same lock. Every read hands out copies; no reference into the locked
// state escapes a method.
//
// Particle motion: headings are in degrees, velocity is distance per unit of
// time. A particle whose next position would leave the world reflects its
// heading first (`180 - a` off a vertical wall, `-a` off a horizontal one)
// and then moves along the new heading.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use particle_sync_protocol::{ClientId, ExplorerSnapshot, ParticleSnapshot};

use crate::config::{ParticleSeed, WorldConfig};
use crate::state::SimulationStateSource;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub velocity: f64,
    pub angle: f64,
}

impl Particle {
    pub fn velocity_x(&self) -> f64 {
        self.velocity * self.angle.to_radians().cos()
    }

    pub fn velocity_y(&self) -> f64 {
        self.velocity * self.angle.to_radians().sin()
    }

    fn advance(&mut self, dt: f64, world: &WorldConfig) {
        let next_x = self.x + self.velocity_x() * dt;
        let next_y = self.y + self.velocity_y() * dt;
        if next_x <= 0.0 || next_x >= world.width {
            self.angle = 180.0 - self.angle;
        }
        if next_y <= 0.0 || next_y >= world.height {
            self.angle = -self.angle;
        }
        self.x += self.velocity_x() * dt;
        self.y += self.velocity_y() * dt;
    }

    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            x: self.x,
            y: self.y,
            velocity: self.velocity,
            angle: self.angle,
        }
    }
}

impl From<ParticleSeed> for Particle {
    fn from(seed: ParticleSeed) -> Self {
        Self {
            x: seed.x,
            y: seed.y,
            velocity: seed.velocity,
            angle: seed.angle,
        }
    }
}

#[derive(Debug)]
pub struct Simulation {
    world: WorldConfig,
    particles: Vec<Particle>,
    explorers: BTreeMap<ClientId, (f64, f64)>,
    tick: u64,
}

impl Simulation {
    pub fn new(world: WorldConfig) -> Self {
        Self {
            world,
            particles: Vec::new(),
            explorers: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Advance every particle by `dt` time units.
    pub fn step(&mut self, dt: f64) {
        for particle in &mut self.particles {
            particle.advance(dt, &self.world);
        }
        self.tick += 1;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }
}

/// Mutex-guarded `Simulation` shared between the tick thread and sessions.
#[derive(Debug)]
pub struct SharedSimulation {
    inner: Mutex<Simulation>,
}

impl SharedSimulation {
    pub fn new(world: WorldConfig) -> Self {
        Self {
            inner: Mutex::new(Simulation::new(world)),
        }
    }

    pub fn with_particles(world: WorldConfig, seeds: &[ParticleSeed]) -> Self {
        let mut sim = Simulation::new(world);
        for seed in seeds {
            sim.add_particle(Particle::from(*seed));
        }
        Self {
            inner: Mutex::new(sim),
        }
    }

    /// Add a particle and return its snapshot, ready to broadcast.
    pub fn add_particle(&self, particle: Particle) -> ParticleSnapshot {
        self.inner.lock().add_particle(particle);
        particle.snapshot()
    }

    /// Advance the simulation. Returns the new tick count.
    pub fn step(&self, dt: f64) -> u64 {
        let mut sim = self.inner.lock();
        sim.step(dt);
        sim.tick()
    }

    pub fn tick(&self) -> u64 {
        self.inner.lock().tick()
    }
}

impl SimulationStateSource for SharedSimulation {
    fn list_particles(&self) -> Vec<ParticleSnapshot> {
        self.inner
            .lock()
            .particles()
            .iter()
            .map(Particle::snapshot)
            .collect()
    }

    fn list_explorers(&self) -> Vec<ExplorerSnapshot> {
        self.inner
            .lock()
            .explorers
            .iter()
            .map(|(&client_id, &(x, y))| ExplorerSnapshot { client_id, x, y })
            .collect()
    }

    fn explorer_exists(&self, client_id: ClientId) -> bool {
        self.inner.lock().explorers.contains_key(&client_id)
    }

    fn upsert_explorer(&self, client_id: ClientId, x: f64, y: f64) {
        self.inner.lock().explorers.insert(client_id, (x, y));
    }

    fn remove_explorer(&self, client_id: ClientId) -> bool {
        self.inner.lock().explorers.remove(&client_id).is_some()
    }
}
