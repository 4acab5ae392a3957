// Fixed-capacity entity pool.
//
// All slots are allocated once. Each slot is a node of one index arena and
// is always on exactly one list: the free list, or the active list of its
// group. Update walks the active lists with a cursor that `remove` keeps
// pointing at a live successor, so callbacks may remove any entity (itself
// included) while a pass is running.

use std::rc::Rc;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};

use super::collision::{CollisionHandler, CollisionHandlers};
use super::entity::{Behavior, Entity, EntityHandle, GROUP_COUNT, GroupId, MAX_GROUP_ID};
use super::error::{EngineError, PoolError, UploadError};
use super::link::{LinkIndex, Links};
use super::resource::{MeshId, MeshSource, ProgramId, RenderSink, TextureId};
use super::uniform::{EntityBlockBinding, EntityUniforms, UniformStore, WgpuUniformBuffer};

/// Counters from one `EntityBuffer::update`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Behavior callbacks run.
    pub visited: usize,
    /// Entity blocks written to the uniform store.
    pub uploaded: usize,
    /// Box-vs-box tests performed by the collision sweep.
    pub overlap_tests: usize,
    /// Handler invocations.
    pub collisions: usize,
}

pub struct EntityBuffer<C> {
    entities: Box<[Entity]>,
    behaviors: Box<[Option<Box<dyn Behavior<C>>>]>,
    links: Links,
    capacity: usize,
    active_count: usize,
    store: Box<dyn UniformStore>,
    handlers: CollisionHandlers<C>,
    // Next node of the pass in flight. `release` moves these off a node
    // before unlinking it.
    cursor: Option<LinkIndex>,
    cursor_rhs: Option<LinkIndex>,
}

#[inline]
fn free_sentinel(capacity: usize) -> LinkIndex {
    capacity as LinkIndex
}

#[inline]
fn group_sentinel(capacity: usize, group: GroupId) -> LinkIndex {
    (capacity + 1 + group) as LinkIndex
}

impl<C> EntityBuffer<C> {
    /// Build a pool of `max_entity_count` slots whose blocks live in `store`.
    ///
    /// Slot `i` owns the block at byte offset `i * store.stride()` for the
    /// whole life of the pool.
    pub fn new(max_entity_count: usize, store: Box<dyn UniformStore>) -> Result<Self, PoolError> {
        if max_entity_count == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        if max_entity_count + 1 + GROUP_COUNT > LinkIndex::MAX as usize {
            return Err(PoolError::TooLarge(max_entity_count));
        }
        if store.block_size() < EntityUniforms::SIZE {
            return Err(PoolError::BlockTooSmall {
                block_size: store.block_size(),
                required: EntityUniforms::SIZE,
            });
        }
        if store.capacity() < max_entity_count {
            return Err(PoolError::StoreTooSmall {
                capacity: store.capacity(),
                required: max_entity_count,
            });
        }

        let stride = store.stride();
        let entities = (0..max_entity_count)
            .map(|i| Entity::vacant(i as u64 * stride))
            .collect();
        let behaviors = (0..max_entity_count).map(|_| None).collect();

        let mut links = Links::new(max_entity_count + 1 + GROUP_COUNT);
        let free = free_sentinel(max_entity_count);
        for i in 0..max_entity_count {
            links.insert_before(free, i as LinkIndex);
        }

        Ok(Self {
            entities,
            behaviors,
            links,
            capacity: max_entity_count,
            active_count: 0,
            store,
            handlers: CollisionHandlers::new(),
            cursor: None,
            cursor_rhs: None,
        })
    }

    /// Build a pool backed by a device uniform buffer named `block_name` at `binding`.
    ///
    /// Returns the pool together with the bind group draws use to reach the
    /// blocks. Buffer creation failure fails the whole pool.
    pub fn create(
        device: &wgpu::Device,
        queue: Arc<wgpu::Queue>,
        max_entity_count: usize,
        block_size: u64,
        binding: u32,
        block_name: &str,
    ) -> Result<(Self, EntityBlockBinding), EngineError> {
        let (store, binding) =
            WgpuUniformBuffer::create(device, queue, max_entity_count, block_size, binding, block_name)?;
        let pool = Self::new(max_entity_count, Box::new(store))?;
        log::info!("Entity pool ready: {max_entity_count} slots, {GROUP_COUNT} groups");
        Ok((pool, binding))
    }

    // ------------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------------

    /// Take a free slot for a new entity of `group`.
    ///
    /// Returns `None` when every slot is in use. The entity joins the tail of
    /// its group's active list right away, so an update already in progress
    /// may still visit it.
    pub fn add(
        &mut self,
        group: GroupId,
        position: Vec3,
        mesh: MeshId,
        texture: TextureId,
        program: ProgramId,
        behavior: impl Behavior<C> + 'static,
    ) -> Option<EntityHandle> {
        if group > MAX_GROUP_ID {
            debug_assert!(false, "group id {group} out of range 0..={MAX_GROUP_ID}");
            log::error!("Refusing entity with group id {group} (max {MAX_GROUP_ID})");
            return None;
        }
        let Some(node) = self.links.pop_front(free_sentinel(self.capacity)) else {
            log::debug!("Entity pool full ({} slots), dropping spawn in group {group}", self.capacity);
            return None;
        };

        let entity = &mut self.entities[node as usize];
        entity.occupy(group, position, mesh, texture, program);
        let handle = EntityHandle {
            index: node,
            generation: entity.generation,
        };
        self.behaviors[node as usize] = Some(Box::new(behavior));
        self.links.insert_before(group_sentinel(self.capacity, group), node);
        self.active_count += 1;
        Some(handle)
    }

    /// Release the entity behind `handle` back to the free list.
    ///
    /// Safe to call from behaviors and collision handlers, on any entity.
    /// Returns `false` (and asserts in debug builds) if the handle is stale.
    pub fn remove(&mut self, handle: EntityHandle) -> bool {
        let Some(node) = self.resolve(handle) else {
            debug_assert!(false, "remove of stale entity handle {handle:?}");
            log::warn!("Ignoring remove of stale entity handle {handle:?}");
            return false;
        };
        self.release(node);
        true
    }

    fn release(&mut self, node: LinkIndex) {
        let next = self.links.next(node);
        if self.cursor == Some(node) {
            self.cursor = Some(next);
        }
        if self.cursor_rhs == Some(node) {
            self.cursor_rhs = Some(next);
        }

        self.links.remove(node);
        let entity = &mut self.entities[node as usize];
        entity.group = None;
        entity.active = false;
        entity.uploaded = false;
        entity.generation = entity.generation.wrapping_add(1);
        self.behaviors[node as usize] = None;
        self.links.insert_before(free_sentinel(self.capacity), node);
        self.active_count -= 1;
    }

    fn resolve(&self, handle: EntityHandle) -> Option<LinkIndex> {
        let entity = self.entities.get(handle.index as usize)?;
        (entity.active && entity.generation == handle.generation).then_some(handle.index)
    }

    #[inline]
    fn handle_of(&self, node: LinkIndex) -> EntityHandle {
        EntityHandle {
            index: node,
            generation: self.entities[node as usize].generation,
        }
    }

    // ------------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------------

    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.resolve(handle).is_some()
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.resolve(handle).map(|i| &self.entities[i as usize])
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.resolve(handle).map(|i| &mut self.entities[i as usize])
    }

    /// Replace the behavior of a live entity.
    pub fn set_behavior(&mut self, handle: EntityHandle, behavior: impl Behavior<C> + 'static) -> bool {
        match self.resolve(handle) {
            Some(i) => {
                self.behaviors[i as usize] = Some(Box::new(behavior));
                true
            }
            None => false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active entities.
    pub fn len(&self) -> usize {
        self.active_count
    }

    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    /// Slots currently on the free list.
    pub fn free_len(&self) -> usize {
        self.links.iter(free_sentinel(self.capacity)).count()
    }

    /// Active entities in `group`.
    pub fn group_len(&self, group: GroupId) -> usize {
        self.group_iter(group).count()
    }

    /// Handles of the active entities in `group`, in iteration order.
    pub fn group_iter(&self, group: GroupId) -> impl Iterator<Item = EntityHandle> + '_ {
        debug_assert!(group <= MAX_GROUP_ID, "group id {group} out of range");
        self.links
            .iter(group_sentinel(self.capacity, group.min(MAX_GROUP_ID)))
            .map(move |node| self.handle_of(node))
    }

    // ------------------------------------------------------------------------
    // Collision handlers
    // ------------------------------------------------------------------------

    /// Register `handler` for overlaps between groups `g0` and `g1`.
    ///
    /// The handler always receives (entity of the smaller group id, entity of
    /// the larger group id): `set_collision_handler(10, 1, f)` calls
    /// `f(group_1_entity, group_10_entity)`.
    pub fn set_collision_handler(
        &mut self,
        g0: GroupId,
        g1: GroupId,
        handler: impl Fn(EntityHandle, EntityHandle, &mut EntityBuffer<C>, &mut C) + 'static,
    ) {
        if g0 > MAX_GROUP_ID || g1 > MAX_GROUP_ID {
            debug_assert!(false, "collision handler groups ({g0}, {g1}) out of range");
            log::error!("Refusing collision handler for groups ({g0}, {g1}) (max {MAX_GROUP_ID})");
            return;
        }
        self.handlers.set(g0, g1, Rc::new(handler));
    }

    /// Handler registered for `{g0, g1}`, if any.
    pub fn collision_handler(&self, g0: GroupId, g1: GroupId) -> Option<&CollisionHandler<C>> {
        self.handlers.get(g0, g1)
    }

    /// Drop every handler. Active entities are untouched.
    pub fn clear_collision_handlers(&mut self) {
        self.handlers.clear();
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Run one simulation step.
    ///
    /// 1. Every active entity's behavior runs, then `position += velocity * delta`.
    /// 2. One mapped write uploads each entity's matrices and color and
    ///    refreshes its world collision box.
    /// 3. Every group pair with a handler is swept for overlaps.
    ///
    /// `delta` is in seconds and is expected to be clamped by the caller.
    pub fn update(&mut self, game: &mut C, delta: f64, view: Mat4, proj: Mat4) -> Result<FrameStats, UploadError> {
        let visited = self.run_behaviors(game, delta);
        let uploaded = self.upload(view, proj)?;
        let (overlap_tests, collisions) = self.sweep_collisions(game);

        let stats = FrameStats {
            visited,
            uploaded,
            overlap_tests,
            collisions,
        };
        log::trace!("{stats:?}");
        Ok(stats)
    }

    fn run_behaviors(&mut self, game: &mut C, delta: f64) -> usize {
        let mut visited = 0;
        for group in 0..GROUP_COUNT {
            let sentinel = group_sentinel(self.capacity, group);
            let mut node = self.links.next(sentinel);
            while node != sentinel {
                self.cursor = Some(self.links.next(node));
                self.run_behavior(node, game, delta);
                visited += 1;
                let Some(next) = self.cursor else { break };
                node = next;
            }
        }
        self.cursor = None;
        visited
    }

    fn run_behavior(&mut self, node: LinkIndex, game: &mut C, delta: f64) {
        let this = self.handle_of(node);
        // Taken out for the call so the callback can borrow the whole pool.
        if let Some(mut behavior) = self.behaviors[node as usize].take() {
            behavior.update(this, self, game, delta);
            if !self.is_alive(this) {
                return;
            }
            let slot = &mut self.behaviors[node as usize];
            if slot.is_none() {
                *slot = Some(behavior);
            }
        }
        self.entities[node as usize].integrate(delta);
    }

    fn upload(&mut self, view: Mat4, proj: Mat4) -> Result<usize, UploadError> {
        let Self {
            entities,
            links,
            store,
            capacity,
            ..
        } = self;
        let capacity = *capacity;
        let mut uploaded = 0;

        store.write_blocks(&mut |bytes: &mut [u8]| {
            for group in 0..GROUP_COUNT {
                for node in links.iter(group_sentinel(capacity, group)) {
                    let entity = &mut entities[node as usize];
                    entity.refresh_world_collision();
                    let block = EntityUniforms::new(
                        entity.model_matrix(),
                        view,
                        proj,
                        Mat3::from_quat(entity.rotation()),
                        entity.color(),
                    );
                    let start = entity.uniform_offset as usize;
                    bytes[start..start + EntityUniforms::SIZE as usize]
                        .copy_from_slice(bytemuck::bytes_of(&block));
                    entity.uploaded = true;
                    uploaded += 1;
                }
            }
        })?;

        Ok(uploaded)
    }

    fn sweep_collisions(&mut self, game: &mut C) -> (usize, usize) {
        let mut tests = 0;
        let mut hits = 0;

        let mut pair = 0;
        while let Some(((g0, g1), handler)) = self.handlers.entry(pair) {
            pair += 1;
            let lhs_sentinel = group_sentinel(self.capacity, g0);
            let rhs_sentinel = group_sentinel(self.capacity, g1);

            let mut lhs = self.links.next(lhs_sentinel);
            while lhs != lhs_sentinel {
                self.cursor = Some(self.links.next(lhs));

                if self.entities[lhs as usize].uploaded {
                    let lhs_handle = self.handle_of(lhs);
                    // Within one group only test pairs after `lhs`, never `lhs` itself.
                    let mut rhs = if g0 == g1 {
                        self.links.next(lhs)
                    } else {
                        self.links.next(rhs_sentinel)
                    };
                    while rhs != rhs_sentinel {
                        self.cursor_rhs = Some(self.links.next(rhs));

                        let a = &self.entities[lhs as usize];
                        let b = &self.entities[rhs as usize];
                        if b.uploaded {
                            tests += 1;
                            if a.collision_world.overlaps(&b.collision_world) {
                                hits += 1;
                                let rhs_handle = self.handle_of(rhs);
                                handler(lhs_handle, rhs_handle, self, game);
                                if !self.is_alive(lhs_handle) {
                                    break;
                                }
                            }
                        }

                        let Some(next) = self.cursor_rhs else { break };
                        rhs = next;
                    }
                    self.cursor_rhs = None;
                }

                let Some(next) = self.cursor else { break };
                lhs = next;
            }
            self.cursor = None;
        }

        (tests, hits)
    }

    /// Issue one draw per active entity, group by group.
    ///
    /// An entity added since the last update is left out on purpose: its slot
    /// holds no block for it yet, so drawing it would show the previous
    /// occupant's transform. It appears once the next update uploads it.
    /// Entities whose mesh `meshes` does not know are skipped too. Returns the
    /// number of draws issued.
    pub fn draw(&self, meshes: &impl MeshSource, sink: &mut impl RenderSink) -> usize {
        let block_size = self.store.block_size();
        let mut drawn = 0;
        for group in 0..GROUP_COUNT {
            for node in self.links.iter(group_sentinel(self.capacity, group)) {
                let entity = &self.entities[node as usize];
                if !entity.uploaded {
                    continue;
                }
                let Some(range) = meshes.index_range(entity.mesh) else {
                    log::trace!("No mesh {:?} for entity {node}", entity.mesh);
                    continue;
                };
                sink.bind_program(entity.program);
                sink.bind_texture(entity.texture);
                sink.bind_entity_block(entity.uniform_offset, block_size);
                sink.draw_indexed(range);
                drawn += 1;
            }
        }
        drawn
    }

    #[cfg(test)]
    fn free_slots(&self) -> Vec<LinkIndex> {
        self.links.iter(free_sentinel(self.capacity)).collect()
    }
}
