// Toroid Blaster: the shooter that drives the entity pool.
//
// Everything game-specific sits here: group ids, collision shapes, the
// per-entity behaviors, enemy waves and how a shot hitting a toroid resolves.

pub mod assets;
pub mod behaviors;

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;
use rand::rngs::StdRng;

use crate::engine::{Aabb, EntityBuffer, EntityHandle, GamePad, GroupId};

pub use assets::GameAssets;
use behaviors::{Blast, PlayerControl, PlayerShot, Toroid};

/// Collision groups. The numeric value is the pool group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Player = 0,
    PlayerShot = 1,
    Enemy = 2,
    EnemyShot = 3,
    Others = 4,
}

impl Group {
    pub const fn id(self) -> GroupId {
        self as GroupId
    }

    /// Local collision box of entities in this group.
    pub fn collision(self) -> Aabb {
        match self {
            Group::Player | Group::Enemy | Group::Others => Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
            Group::PlayerShot => Aabb::new(Vec3::new(-0.5, -0.5, -1.0), Vec3::new(0.5, 0.5, 1.0)),
            Group::EnemyShot => Aabb::new(Vec3::new(-0.25, -0.25, -1.0), Vec3::new(0.25, 0.25, 0.25)),
        }
    }
}

/// Sound cues. There is no audio output; cues are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    PlayerShot,
    Bomb,
}

pub const PLAYER_START: Vec3 = Vec3::new(0.0, 0.0, 2.0);
/// Seconds between enemy waves.
pub const WAVE_INTERVAL: f64 = 1.0;
pub const SCORE_PER_KILL: u32 = 100;

/// Game context handed to every behavior and collision handler.
pub struct Shooter {
    /// Controller state for the current frame.
    pub pad: GamePad,
    pub score: u32,
    pub assets: GameAssets,
    pub rng: StdRng,
    player: Option<EntityHandle>,
    wave_timer: f64,
}

impl Shooter {
    pub fn new(assets: GameAssets, rng: StdRng) -> Self {
        Self {
            pad: GamePad::empty(),
            score: 0,
            assets,
            rng,
            player: None,
            wave_timer: 0.0,
        }
    }

    pub fn player(&self) -> Option<EntityHandle> {
        self.player
    }

    pub fn play(&self, cue: Cue) {
        log::debug!("Audio cue {cue:?}");
    }

    /// Register the collision handlers the game needs.
    pub fn install(pool: &mut EntityBuffer<Shooter>) {
        pool.set_collision_handler(Group::PlayerShot.id(), Group::Enemy.id(), player_shot_hits_enemy);
    }

    /// Per-frame game logic, run before the pool update.
    ///
    /// Spawns the player if it is gone and launches a wave of toroids every
    /// `WAVE_INTERVAL` seconds.
    pub fn frame(&mut self, pool: &mut EntityBuffer<Shooter>, delta: f64) {
        if !self.player.is_some_and(|h| pool.is_alive(h)) {
            self.player = spawn_player(pool, &self.assets, PLAYER_START);
            if self.player.is_some() {
                log::debug!("Player spawned");
            }
        }

        self.wave_timer -= delta;
        if self.wave_timer <= 0.0 {
            let count = self.rng.gen_range(1..=5);
            for _ in 0..count {
                let x = self.rng.gen_range(-12..=12) as f32;
                let z = self.rng.gen_range(40..=44) as f32;
                spawn_toroid(pool, &self.assets, Vec3::new(x, 0.0, z));
            }
            log::debug!("Wave of {count} toroids");
            self.wave_timer = WAVE_INTERVAL;
        }
    }
}

/// A player shot overlapping an enemy: blast at the enemy, score, both gone.
pub fn player_shot_hits_enemy(
    shot: EntityHandle,
    enemy: EntityHandle,
    pool: &mut EntityBuffer<Shooter>,
    game: &mut Shooter,
) {
    if let Some(at) = pool.get(enemy).map(|e| e.position()) {
        let yaw = game.rng.gen_range(0.0..TAU);
        if spawn_blast(pool, &game.assets, at, yaw).is_some() {
            game.score = game.score.saturating_add(SCORE_PER_KILL);
        }
    }
    game.play(Cue::Bomb);
    pool.remove(shot);
    pool.remove(enemy);
}

// ============================================================================
// SPAWNING
// ============================================================================

pub fn spawn_player(pool: &mut EntityBuffer<Shooter>, assets: &GameAssets, at: Vec3) -> Option<EntityHandle> {
    let h = pool.add(
        Group::Player.id(),
        at,
        assets.aircraft,
        assets.player_texture,
        assets.lit,
        PlayerControl::default(),
    )?;
    pool.get_mut(h)?.set_collision(Group::Player.collision());
    Some(h)
}

pub fn spawn_player_shot(pool: &mut EntityBuffer<Shooter>, assets: &GameAssets, at: Vec3) -> Option<EntityHandle> {
    let h = pool.add(
        Group::PlayerShot.id(),
        at,
        assets.shot,
        assets.white_texture,
        assets.emissive,
        PlayerShot,
    )?;
    let shot = pool.get_mut(h)?;
    shot.set_velocity(behaviors::SHOT_VELOCITY);
    shot.set_color(behaviors::SHOT_COLOR);
    shot.set_collision(Group::PlayerShot.collision());
    Some(h)
}

pub fn spawn_toroid(pool: &mut EntityBuffer<Shooter>, assets: &GameAssets, at: Vec3) -> Option<EntityHandle> {
    let h = pool.add(
        Group::Enemy.id(),
        at,
        assets.toroid,
        assets.toroid_texture,
        assets.lit,
        Toroid::default(),
    )?;
    let toroid = pool.get_mut(h)?;
    // Toroids on the left drift right; the rest drift slightly left.
    let drift = if at.x < 0.0 { 1.0 } else { -0.1 };
    toroid.set_velocity(Vec3::new(drift, 0.0, -10.0));
    toroid.set_collision(Group::Enemy.collision());
    Some(h)
}

pub fn spawn_blast(pool: &mut EntityBuffer<Shooter>, assets: &GameAssets, at: Vec3, yaw: f32) -> Option<EntityHandle> {
    let blast = Blast::new(yaw);
    let rotation = blast.rotation();
    let h = pool.add(
        Group::Others.id(),
        at,
        assets.blast,
        assets.glow_texture,
        assets.emissive,
        blast,
    )?;
    let e = pool.get_mut(h)?;
    e.set_rotation(rotation);
    e.set_color(behaviors::BLAST_COLORS[0]);
    Some(h)
}

#[cfg(test)]
pub(crate) mod tests {
    use glam::Mat4;
    use rand::SeedableRng;

    use super::*;
    use crate::engine::{EntityUniforms, HostUniformBuffer, MeshId, ProgramId, TextureId};

    pub(crate) fn test_assets() -> GameAssets {
        GameAssets {
            aircraft: MeshId(0),
            shot: MeshId(1),
            toroid: MeshId(2),
            blast: MeshId(3),
            player_texture: TextureId(0),
            toroid_texture: TextureId(1),
            glow_texture: TextureId(2),
            white_texture: TextureId(3),
            lit: ProgramId(0),
            emissive: ProgramId(1),
        }
    }

    pub(crate) fn setup(capacity: usize) -> (EntityBuffer<Shooter>, Shooter) {
        let store = HostUniformBuffer::new(capacity, EntityUniforms::SIZE, 256);
        let mut pool = EntityBuffer::new(capacity, Box::new(store)).unwrap();
        Shooter::install(&mut pool);
        (pool, Shooter::new(test_assets(), StdRng::seed_from_u64(42)))
    }

    pub(crate) fn update(pool: &mut EntityBuffer<Shooter>, game: &mut Shooter, delta: f64) {
        pool.update(game, delta, Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
    }

    #[test]
    fn group_ids_match_pool_groups() {
        assert_eq!(Group::Player.id(), 0);
        assert_eq!(Group::PlayerShot.id(), 1);
        assert_eq!(Group::Enemy.id(), 2);
        assert_eq!(Group::Others.id(), 4);
    }

    #[test]
    fn first_frame_spawns_player_and_a_wave() {
        let (mut pool, mut game) = setup(64);
        game.frame(&mut pool, 0.0);

        let player = game.player().unwrap();
        assert_eq!(pool.get(player).unwrap().position(), PLAYER_START);
        let enemies = pool.group_len(Group::Enemy.id());
        assert!((1..=5).contains(&enemies), "{enemies} toroids");

        for h in pool.group_iter(Group::Enemy.id()).collect::<Vec<_>>() {
            let e = pool.get(h).unwrap();
            let p = e.position();
            assert!((-12.0..=12.0).contains(&p.x) && (40.0..=44.0).contains(&p.z));
            let expected_drift = if p.x < 0.0 { 1.0 } else { -0.1 };
            assert_eq!(e.velocity(), Vec3::new(expected_drift, 0.0, -10.0));
            assert_eq!(e.collision(), Group::Enemy.collision());
        }
    }

    #[test]
    fn waves_come_once_per_interval() {
        let (mut pool, mut game) = setup(256);
        game.frame(&mut pool, 0.0);
        let first = pool.group_len(Group::Enemy.id());
        game.frame(&mut pool, 0.5);
        assert_eq!(pool.group_len(Group::Enemy.id()), first);
        game.frame(&mut pool, 0.5);
        assert!(pool.group_len(Group::Enemy.id()) > first);
    }

    #[test]
    fn player_respawns_when_gone() {
        let (mut pool, mut game) = setup(64);
        game.frame(&mut pool, 0.0);
        let first = game.player().unwrap();
        pool.remove(first);
        game.frame(&mut pool, 0.1);
        let second = game.player().unwrap();
        assert_ne!(first, second);
        assert!(pool.is_alive(second));
        assert_eq!(pool.group_len(Group::Player.id()), 1);
    }

    #[test]
    fn shot_hitting_toroid_scores_and_leaves_a_blast() {
        let (mut pool, mut game) = setup(16);
        let assets = test_assets();
        let toroid = spawn_toroid(&mut pool, &assets, Vec3::new(5.0, 0.0, 10.0)).unwrap();
        let shot = spawn_player_shot(&mut pool, &assets, Vec3::new(5.0, 0.0, 9.5)).unwrap();
        // Hold them still so the sweep sees them exactly where placed.
        pool.get_mut(toroid).unwrap().set_velocity(Vec3::ZERO);
        pool.get_mut(shot).unwrap().set_velocity(Vec3::ZERO);

        update(&mut pool, &mut game, 1.0 / 60.0);

        assert!(!pool.is_alive(toroid));
        assert!(!pool.is_alive(shot));
        assert_eq!(game.score, SCORE_PER_KILL);
        let blasts: Vec<_> = pool.group_iter(Group::Others.id()).collect();
        assert_eq!(blasts.len(), 1);
        let blast = pool.get(blasts[0]).unwrap();
        assert!(blast.position().abs_diff_eq(Vec3::new(5.0, 0.0, 10.0), 1e-5));
        // Spawned inside the sweep: not uploaded until the next update.
        assert!(blast.world_collision().is_none());
    }

    #[test]
    fn no_blast_no_points_when_pool_is_full() {
        let (mut pool, mut game) = setup(2);
        let assets = test_assets();
        let toroid = spawn_toroid(&mut pool, &assets, Vec3::ZERO).unwrap();
        let shot = spawn_player_shot(&mut pool, &assets, Vec3::ZERO).unwrap();
        pool.get_mut(toroid).unwrap().set_velocity(Vec3::ZERO);
        pool.get_mut(shot).unwrap().set_velocity(Vec3::ZERO);

        update(&mut pool, &mut game, 1.0 / 60.0);
        assert_eq!(game.score, 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn missed_shots_do_nothing() {
        let (mut pool, mut game) = setup(16);
        let assets = test_assets();
        spawn_toroid(&mut pool, &assets, Vec3::new(-5.0, 0.0, 30.0)).unwrap();
        spawn_player_shot(&mut pool, &assets, Vec3::new(5.0, 0.0, 2.0)).unwrap();
        update(&mut pool, &mut game, 1.0 / 60.0);
        assert_eq!(game.score, 0);
        assert_eq!(pool.len(), 2);
    }
}
