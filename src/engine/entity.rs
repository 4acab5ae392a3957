// Entity record, handle and behavior contract.

use std::fmt;

use glam::{Mat4, Quat, Vec3, Vec4};

use super::buffer::EntityBuffer;
use super::collision::Aabb;
use super::resource::{MeshId, ProgramId, TextureId};

/// Collision/behavior category of an entity.
pub type GroupId = usize;

/// Highest valid group id. Groups are `0..=MAX_GROUP_ID`.
pub const MAX_GROUP_ID: GroupId = 31;

/// Number of group ids (and active lists) a pool keeps.
pub const GROUP_COUNT: usize = MAX_GROUP_ID + 1;

/// Reference to one live entity in an [`EntityBuffer`].
///
/// The generation is bumped every time the slot is released, so a handle kept
/// past removal is detected as stale instead of aliasing the next occupant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl EntityHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

/// Per-frame logic attached to an entity.
///
/// `game` is whatever context the frame driver passes to `EntityBuffer::update`.
/// The callback may add or remove any entity, itself included; `this` must not
/// be kept after the call returns.
pub trait Behavior<C> {
    fn update(&mut self, this: EntityHandle, entities: &mut EntityBuffer<C>, game: &mut C, delta: f64);
}

impl<C, F> Behavior<C> for F
where
    F: FnMut(EntityHandle, &mut EntityBuffer<C>, &mut C, f64),
{
    fn update(&mut self, this: EntityHandle, entities: &mut EntityBuffer<C>, game: &mut C, delta: f64) {
        self(this, entities, game, delta)
    }
}

/// One slot of the pool: transform, motion, render bindings and collision state.
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) group: Option<GroupId>,
    pub(crate) generation: u32,
    position: Vec3,
    scale: Vec3,
    rotation: Quat,
    /// Meters per second.
    velocity: Vec3,
    pub(crate) mesh: MeshId,
    pub(crate) texture: TextureId,
    pub(crate) program: ProgramId,
    /// Byte offset of this slot's block in the entity uniform buffer. Fixed for the pool's lifetime.
    pub(crate) uniform_offset: u64,
    collision_local: Aabb,
    pub(crate) collision_world: Aabb,
    color: Vec4,
    /// Set once the current occupant has been through an upload pass.
    pub(crate) uploaded: bool,
    pub(crate) active: bool,
}

impl Entity {
    pub(crate) fn vacant(uniform_offset: u64) -> Self {
        Self {
            group: None,
            generation: 0,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            mesh: MeshId(0),
            texture: TextureId(0),
            program: ProgramId(0),
            uniform_offset,
            collision_local: Aabb::default(),
            collision_world: Aabb::default(),
            color: Vec4::ONE,
            uploaded: false,
            active: false,
        }
    }

    /// Reset every per-occupant field, keeping generation and uniform offset.
    pub(crate) fn occupy(
        &mut self,
        group: GroupId,
        position: Vec3,
        mesh: MeshId,
        texture: TextureId,
        program: ProgramId,
    ) {
        *self = Self {
            group: Some(group),
            generation: self.generation,
            position,
            mesh,
            texture,
            program,
            active: true,
            ..Self::vacant(self.uniform_offset)
        };
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn color(&self) -> Vec4 {
        self.color
    }

    pub fn set_color(&mut self, color: Vec4) {
        self.color = color;
    }

    pub fn collision(&self) -> Aabb {
        self.collision_local
    }

    pub fn set_collision(&mut self, local: Aabb) {
        self.collision_local = local;
    }

    /// World-space collision box from the last upload pass.
    /// `None` until the entity has been through one.
    pub fn world_collision(&self) -> Option<Aabb> {
        self.uploaded.then_some(self.collision_world)
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn uniform_offset(&self) -> u64 {
        self.uniform_offset
    }

    /// Model matrix: translation * rotation * scale.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Advance position by `velocity * delta`.
    pub(crate) fn integrate(&mut self, delta: f64) {
        self.position += self.velocity * delta as f32;
    }

    /// Recompute the world collision box from the local one and the current transform.
    pub(crate) fn refresh_world_collision(&mut self) {
        self.collision_world = self
            .collision_local
            .transformed(self.scale, self.rotation, self.position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupy_resets_transform_but_keeps_slot_identity() {
        let mut e = Entity::vacant(512);
        e.generation = 7;
        e.occupy(3, Vec3::X, MeshId(1), TextureId(2), ProgramId(0));
        e.set_scale(Vec3::splat(4.0));
        e.set_color(Vec4::ZERO);
        e.uploaded = true;

        e.occupy(5, Vec3::Y, MeshId(1), TextureId(2), ProgramId(0));
        assert_eq!(e.group(), Some(5));
        assert_eq!(e.position(), Vec3::Y);
        assert_eq!(e.scale(), Vec3::ONE);
        assert_eq!(e.color(), Vec4::ONE);
        assert_eq!(e.rotation(), Quat::IDENTITY);
        assert_eq!(e.generation, 7);
        assert_eq!(e.uniform_offset(), 512);
        assert!(e.world_collision().is_none());
        assert!(e.is_active());
    }

    #[test]
    fn integrate_uses_seconds() {
        let mut e = Entity::vacant(0);
        e.set_velocity(Vec3::new(0.0, 0.0, 80.0));
        e.integrate(0.25);
        assert!(e.position().abs_diff_eq(Vec3::new(0.0, 0.0, 20.0), 1e-6));
    }

    #[test]
    fn model_matrix_is_trs() {
        let mut e = Entity::vacant(0);
        e.set_position(Vec3::new(1.0, 2.0, 3.0));
        e.set_scale(Vec3::splat(2.0));
        let p = e.model_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(3.0, 2.0, 3.0), 1e-6));
    }
}
