// Collision shapes and the group-pair handler table.

use std::rc::Rc;

use glam::{Mat3, Quat, Vec3};

use super::buffer::EntityBuffer;
use super::entity::{EntityHandle, GroupId};

/// Axis-aligned box, used both in entity-local and world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Bounding box of this box after scale, then rotation, then translation.
    pub fn transformed(&self, scale: Vec3, rotation: Quat, translation: Vec3) -> Aabb {
        let rot = Mat3::from_quat(rotation);
        let center = rot * (self.center() * scale) + translation;
        let half = self.half_extents() * scale.abs();
        // Extent of a rotated box along each world axis.
        let extent = rot.x_axis.abs() * half.x + rot.y_axis.abs() * half.y + rot.z_axis.abs() * half.z;
        Aabb {
            min: center - extent,
            max: center + extent,
        }
    }

    /// Touching faces count as overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || self.min.x > other.max.x
            || self.max.y < other.min.y
            || self.min.y > other.max.y
            || self.max.z < other.min.z
            || self.min.z > other.max.z)
    }
}

/// Resolution callback for a pair of overlapping entities.
///
/// Arguments are always ordered (entity of the smaller group id, entity of the
/// larger group id), whatever order the pair was registered in.
pub type CollisionHandler<C> =
    Rc<dyn Fn(EntityHandle, EntityHandle, &mut EntityBuffer<C>, &mut C)>;

struct HandlerEntry<C> {
    groups: (GroupId, GroupId),
    handler: CollisionHandler<C>,
}

/// Handlers keyed by unordered group pair, kept sorted by `(smaller, larger)`.
pub struct CollisionHandlers<C> {
    entries: Vec<HandlerEntry<C>>,
}

impl<C> Default for CollisionHandlers<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<C> std::fmt::Debug for CollisionHandlers<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.groups))
            .finish()
    }
}

/// Order a group pair as `(smaller, larger)`.
#[inline]
pub fn canonical_pair(g0: GroupId, g1: GroupId) -> (GroupId, GroupId) {
    if g0 <= g1 { (g0, g1) } else { (g1, g0) }
}

impl<C> CollisionHandlers<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `{g0, g1}`, replacing any earlier one for that pair.
    pub fn set(&mut self, g0: GroupId, g1: GroupId, handler: CollisionHandler<C>) {
        let groups = canonical_pair(g0, g1);
        match self.entries.binary_search_by_key(&groups, |e| e.groups) {
            Ok(i) => self.entries[i].handler = handler,
            Err(i) => self.entries.insert(i, HandlerEntry { groups, handler }),
        }
    }

    /// Handler for `{g0, g1}`; `None` when the pair has none.
    pub fn get(&self, g0: GroupId, g1: GroupId) -> Option<&CollisionHandler<C>> {
        let groups = canonical_pair(g0, g1);
        self.entries
            .binary_search_by_key(&groups, |e| e.groups)
            .ok()
            .map(|i| &self.entries[i].handler)
    }

    /// The `i`-th registration in sweep order, cloned so the table stays free
    /// to change while the handler runs.
    pub fn entry(&self, i: usize) -> Option<((GroupId, GroupId), CollisionHandler<C>)> {
        self.entries
            .get(i)
            .map(|e| (e.groups, Rc::clone(&e.handler)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> CollisionHandler<()> {
        Rc::new(|_, _, _, _| {})
    }

    #[test]
    fn scaled_and_translated_box() {
        let local = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let world = local.transformed(Vec3::splat(2.0), Quat::IDENTITY, Vec3::new(5.0, 0.0, 0.0));
        assert!(world.min.abs_diff_eq(Vec3::new(3.0, -2.0, -2.0), 1e-6));
        assert!(world.max.abs_diff_eq(Vec3::new(7.0, 2.0, 2.0), 1e-6));
    }

    #[test]
    fn rotated_box_grows_to_bound_corners() {
        let local = Aabb::new(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let quarter = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let world = local.transformed(Vec3::ONE, quarter, Vec3::ZERO);
        assert!(world.min.abs_diff_eq(Vec3::new(-1.0, -1.0, -2.0), 1e-5));
        assert!(world.max.abs_diff_eq(Vec3::new(1.0, 1.0, 2.0), 1e-5));

        let eighth = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let unit = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let world = unit.transformed(Vec3::ONE, eighth, Vec3::ZERO);
        let r = std::f32::consts::SQRT_2;
        assert!(world.max.abs_diff_eq(Vec3::new(r, r, 1.0), 1e-5));
    }

    #[test]
    fn off_center_box_follows_rotation() {
        let local = Aabb::new(Vec3::new(1.0, -0.5, -0.5), Vec3::new(3.0, 0.5, 0.5));
        let half_turn = Quat::from_rotation_y(std::f32::consts::PI);
        let world = local.transformed(Vec3::ONE, half_turn, Vec3::ZERO);
        assert!(world.min.abs_diff_eq(Vec3::new(-3.0, -0.5, -0.5), 1e-5));
        assert!(world.max.abs_diff_eq(Vec3::new(-1.0, 0.5, 0.5), 1e-5));
    }

    #[test]
    fn overlap_is_inclusive_and_per_axis() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let touching = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let apart_y = Aabb::new(Vec3::new(0.0, 1.5, 0.0), Vec3::new(1.0, 2.0, 1.0));
        assert!(a.overlaps(&touching));
        assert!(touching.overlaps(&a));
        assert!(!a.overlaps(&apart_y));
    }

    #[test]
    fn pair_lookup_ignores_order() {
        let mut table = CollisionHandlers::new();
        table.set(10, 1, noop());
        assert!(table.get(1, 10).is_some());
        assert!(table.get(10, 1).is_some());
        assert!(table.get(1, 1).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn re_registering_replaces() {
        let mut table = CollisionHandlers::new();
        let first = noop();
        let second = noop();
        table.set(2, 5, first);
        table.set(5, 2, Rc::clone(&second));
        assert_eq!(table.len(), 1);
        assert!(Rc::ptr_eq(table.get(2, 5).unwrap(), &second));
    }

    #[test]
    fn entries_sorted_by_canonical_pair() {
        let mut table = CollisionHandlers::new();
        table.set(4, 3, noop());
        table.set(0, 9, noop());
        table.set(2, 2, noop());
        let pairs: Vec<_> = (0..table.len())
            .map(|i| table.entry(i).unwrap().0)
            .collect();
        assert_eq!(pairs, vec![(0, 9), (2, 2), (3, 4)]);
        table.clear();
        assert!(table.is_empty());
        assert!(table.entry(0).is_none());
    }
}
