// Per-entity behaviors of the shooter.

use glam::{Quat, Vec3, Vec4};

use super::{Cue, Shooter, spawn_player_shot};
use crate::engine::{Behavior, EntityBuffer, EntityHandle, GamePad};

// ============================================================================
// PLAYER
// ============================================================================

/// Meters per second.
pub const PLAYER_SPEED: f32 = 10.0;
pub const PLAYER_BANK_DEGREES: f32 = 30.0;
/// Player position is kept inside this box.
pub const PLAYER_MIN: Vec3 = Vec3::new(-11.0, -100.0, 1.0);
pub const PLAYER_MAX: Vec3 = Vec3::new(11.0, 100.0, 20.0);
/// Seconds between volleys while A is held.
pub const SHOT_INTERVAL: f64 = 0.25;
/// Volley muzzle offsets along X.
pub const SHOT_OFFSETS: [f32; 2] = [-0.3, 0.3];

/// D-pad flight and twin-shot fire.
///
/// Left moves toward +X: the camera looks down the +Z axis from behind the
/// player, which mirrors X on screen.
#[derive(Debug, Default)]
pub struct PlayerControl {
    shot_interval: f64,
}

impl Behavior<Shooter> for PlayerControl {
    fn update(&mut self, this: EntityHandle, pool: &mut EntityBuffer<Shooter>, game: &mut Shooter, delta: f64) {
        let pad = game.pad;
        let mut dir = Vec3::ZERO;
        let mut bank = 0.0;
        if pad.contains(GamePad::LEFT) {
            dir.x = 1.0;
            bank = -PLAYER_BANK_DEGREES.to_radians();
        } else if pad.contains(GamePad::RIGHT) {
            dir.x = -1.0;
            bank = PLAYER_BANK_DEGREES.to_radians();
        }
        if pad.contains(GamePad::UP) {
            dir.z = 1.0;
        } else if pad.contains(GamePad::DOWN) {
            dir.z = -1.0;
        }

        let Some(player) = pool.get_mut(this) else { return };
        player.set_velocity(dir.normalize_or_zero() * PLAYER_SPEED);
        player.set_rotation(Quat::from_rotation_z(bank));
        let pos = player.position().clamp(PLAYER_MIN, PLAYER_MAX);
        player.set_position(pos);

        if !pad.contains(GamePad::A) {
            self.shot_interval = 0.0;
            return;
        }
        self.shot_interval -= delta;
        if self.shot_interval <= 0.0 {
            for dx in SHOT_OFFSETS {
                spawn_player_shot(pool, &game.assets, pos + Vec3::new(dx, 0.0, 0.0));
            }
            self.shot_interval = SHOT_INTERVAL;
            game.play(Cue::PlayerShot);
        }
    }
}

// ============================================================================
// PLAYER SHOT
// ============================================================================

pub const SHOT_VELOCITY: Vec3 = Vec3::new(0.0, 0.0, 80.0);
pub const SHOT_COLOR: Vec4 = Vec4::new(1.0, 0.9, 0.4, 1.0);

/// Flies straight; gone once it leaves the playfield.
#[derive(Debug, Default)]
pub struct PlayerShot;

impl Behavior<Shooter> for PlayerShot {
    fn update(&mut self, this: EntityHandle, pool: &mut EntityBuffer<Shooter>, _: &mut Shooter, _: f64) {
        let Some(pos) = pool.get(this).map(|e| e.position()) else { return };
        if pos.x.abs() > 40.0 || pos.z < -4.0 || pos.z > 40.0 {
            pool.remove(this);
        }
    }
}

// ============================================================================
// TOROID
// ============================================================================

pub const TOROID_SPIN_DEGREES: f32 = 15.0;

/// Enemy saucer: spins about Y, gone once it leaves the playfield.
#[derive(Debug, Default)]
pub struct Toroid {
    angle: f32,
}

impl Behavior<Shooter> for Toroid {
    fn update(&mut self, this: EntityHandle, pool: &mut EntityBuffer<Shooter>, _: &mut Shooter, delta: f64) {
        let Some(toroid) = pool.get_mut(this) else { return };
        let pos = toroid.position();
        if pos.x.abs() > 40.0 || pos.z.abs() > 40.0 {
            pool.remove(this);
            return;
        }
        self.angle = (self.angle + TOROID_SPIN_DEGREES.to_radians() * delta as f32)
            .rem_euclid(std::f32::consts::TAU);
        toroid.set_rotation(Quat::from_rotation_y(self.angle));
    }
}

// ============================================================================
// BLAST
// ============================================================================

/// Seconds a blast lasts.
pub const BLAST_LIFETIME: f64 = 0.5;
pub const BLAST_SPIN_DEGREES: f32 = 60.0;
/// Color keys at 0, 0.25 and 0.5 seconds.
pub const BLAST_COLORS: [Vec4; 3] = [
    Vec4::new(1.0, 1.0, 0.75, 1.0),
    Vec4::new(1.0, 0.5, 0.1, 1.0),
    Vec4::new(0.25, 0.1, 0.1, 0.0),
];

/// Explosion effect: grows, fades through `BLAST_COLORS` and spins.
#[derive(Debug)]
pub struct Blast {
    timer: f64,
    yaw: f32,
}

impl Blast {
    pub fn new(yaw: f32) -> Self {
        Self { timer: 0.0, yaw }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    /// Scale and color `t` seconds into the blast.
    pub fn look(t: f64) -> (f32, Vec4) {
        let variation = (t * 4.0) as f32;
        let key = (variation as usize).min(BLAST_COLORS.len() - 2);
        let color = BLAST_COLORS[key].lerp(BLAST_COLORS[key + 1], variation - key as f32);
        (1.0 + variation, color)
    }
}

impl Behavior<Shooter> for Blast {
    fn update(&mut self, this: EntityHandle, pool: &mut EntityBuffer<Shooter>, _: &mut Shooter, delta: f64) {
        self.timer += delta;
        if self.timer >= BLAST_LIFETIME {
            pool.remove(this);
            return;
        }
        let Some(blast) = pool.get_mut(this) else { return };
        let (scale, color) = Self::look(self.timer);
        blast.set_scale(Vec3::splat(scale));
        blast.set_color(color);
        self.yaw += BLAST_SPIN_DEGREES.to_radians() * delta as f32;
        blast.set_rotation(Quat::from_rotation_y(self.yaw));
    }
}
