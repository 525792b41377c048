//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in a [`SlotMap`] arena owned by [`SceneGraph`] and refer to
//! each other by [`NodeId`]. Parent, children and world links are plain ids,
//! so there are no ownership cycles; every structural change goes through the
//! graph, which keeps both sides of each link in sync.

use log::warn;
use slotmap::{SlotMap, new_key_type};

use crate::{
    data_structures::{
        dirty::{Dirty, DirtyState},
        geometry::{Rectangle, Vec2},
        sprite::SpriteData,
        texture::{Frame, TextureId},
        transform::Transform,
        world::WorldData,
    },
    pipelines::ShaderId,
    resources::texture::TextureManager,
};

new_key_type! {
    pub struct NodeId;
}

/// Per-node update callback: `(graph, node, delta, time)`.
pub type UpdateHook = fn(&mut SceneGraph, NodeId, f64, f64);

#[derive(Clone, Copy, Debug, Default)]
pub struct Hooks {
    pub update: Option<UpdateHook>,
    pub post_update: Option<UpdateHook>,
}

/// Structural changes, queued until the owner drains them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    AddedToWorld { node: NodeId, world: NodeId },
    RemovedFromWorld { node: NodeId, world: NodeId },
    Destroyed { node: NodeId },
}

/// Listener key for a [`GraphEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphEventKind {
    AddedToWorld,
    RemovedFromWorld,
    Destroyed,
}

impl GraphEvent {
    pub fn kind(&self) -> GraphEventKind {
        match self {
            Self::AddedToWorld { .. } => GraphEventKind::AddedToWorld,
            Self::RemovedFromWorld { .. } => GraphEventKind::RemovedFromWorld,
            Self::Destroyed { .. } => GraphEventKind::Destroyed,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Bounds {
    pub area: Rectangle,
    /// Never recompute `area`.
    pub fixed: bool,
    pub include_children: bool,
    pub visible_only: bool,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            area: Rectangle::default(),
            fixed: false,
            include_children: true,
            visible_only: true,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Container,
    Sprite(SpriteData),
    /// Grouping node that does not transform or draw itself.
    Layer,
    /// Bakes its children into a texture and redraws them only when dirty.
    RenderLayer,
    /// A render layer whose texture is drawn through a chain of shaders.
    EffectLayer(Vec<ShaderId>),
    World(WorldData),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub visible: bool,
    pub will_update: bool,
    pub will_update_children: bool,
    pub will_render: bool,
    pub will_render_children: bool,
    pub will_cache_children: bool,
    pub alpha: f32,
    pub dirty: DirtyState,
    pub transform: Transform,
    pub bounds: Bounds,
    pub hooks: Hooks,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    world: Option<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, transform: Transform, frame: u64) -> Self {
        let mut dirty = DirtyState::new(Dirty::DEFAULT);
        dirty.stamp(frame);
        Self {
            name: String::new(),
            kind,
            visible: true,
            will_update: true,
            will_update_children: true,
            will_render: true,
            will_render_children: true,
            will_cache_children: false,
            alpha: 1.0,
            dirty,
            transform,
            bounds: Bounds::default(),
            hooks: Hooks::default(),
            children: Vec::new(),
            parent: None,
            world: None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn world(&self) -> Option<NodeId> {
        self.world
    }

    /// Sprites additionally need a texture and a non-zero alpha.
    pub fn is_renderable(&self) -> bool {
        if !self.visible || !self.will_render {
            return false;
        }
        match &self.kind {
            NodeKind::Sprite(sprite) => sprite.has_texture && self.alpha > 0.0,
            _ => true,
        }
    }

    pub fn sprite(&self) -> Option<&SpriteData> {
        match &self.kind {
            NodeKind::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    /// Brings render data up to date right before drawing.
    ///
    /// Sprites repack colors and recompute their vertices. Every other node
    /// only consumes its transform flag so cached layers above it can settle.
    pub fn pre_render(&mut self) {
        let Node {
            kind,
            dirty,
            transform,
            ..
        } = self;
        match kind {
            NodeKind::Sprite(sprite) => {
                if dirty.is_dirty(Dirty::COLORS) {
                    sprite.pack_colors();
                    dirty.clear(Dirty::COLORS);
                }
                if dirty.is_dirty(Dirty::TRANSFORM) {
                    sprite.update_vertices(transform);
                    dirty.clear(Dirty::TRANSFORM);
                }
            }
            _ => dirty.clear(Dirty::TRANSFORM),
        }
    }
}

pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    frame: u64,
    default_origin: Vec2,
    events: Vec<GraphEvent>,
    released: Vec<NodeId>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::with_default_origin(Vec2::new(0.5, 0.5))
    }

    pub fn with_default_origin(default_origin: Vec2) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            frame: 0,
            default_origin,
            events: Vec::new(),
            released: Vec::new(),
        }
    }

    /// Frame stamped onto nodes that become dirty.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn set_game_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn world_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.world)
    }

    pub fn world_data(&self, id: NodeId) -> Option<&WorldData> {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::World(data)) => Some(data),
            _ => None,
        }
    }

    pub fn world_data_mut(&mut self, id: NodeId) -> Option<&mut WorldData> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::World(data)) => Some(data),
            _ => None,
        }
    }

    pub fn sprite(&self, id: NodeId) -> Option<&SpriteData> {
        self.nodes.get(id).and_then(Node::sprite)
    }

    pub fn get_child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Queued structural events, oldest first.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    /// Ids of destroyed nodes whose external resources should be freed.
    pub fn take_released(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.released)
    }

    fn insert(&mut self, x: f32, y: f32, kind: NodeKind) -> NodeId {
        let transform = Transform::new(x, y, self.default_origin);
        self.nodes.insert(Node::new(kind, transform, self.frame))
    }

    pub fn create_container(&mut self, x: f32, y: f32) -> NodeId {
        self.insert(x, y, NodeKind::Container)
    }

    /// Creates a sprite showing `frame` of the texture stored under `key`.
    pub fn create_sprite(
        &mut self,
        x: f32,
        y: f32,
        textures: &TextureManager,
        key: &str,
        frame: Option<&str>,
    ) -> NodeId {
        let id = self.insert(x, y, NodeKind::Sprite(SpriteData::default()));
        self.set_texture(id, textures, key, frame);
        id
    }

    /// A grouping node that never renders itself. The render-list walk
    /// splices its visible children into the parent's list instead of
    /// skipping the subtree.
    pub fn create_layer(&mut self) -> NodeId {
        let id = self.insert(0.0, 0.0, NodeKind::Layer);
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform.passthru = true;
            node.will_render = false;
        }
        id
    }

    pub fn create_render_layer(&mut self) -> NodeId {
        self.insert_render_layer(NodeKind::RenderLayer)
    }

    pub fn create_effect_layer(&mut self, shaders: Vec<ShaderId>) -> NodeId {
        self.insert_render_layer(NodeKind::EffectLayer(shaders))
    }

    fn insert_render_layer(&mut self, kind: NodeKind) -> NodeId {
        let frame = self.frame;
        let id = self.insert(0.0, 0.0, kind);
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform.passthru = true;
            node.will_cache_children = true;
            node.dirty.set(Dirty::CHILD_CACHE, frame);
        }
        id
    }

    /// Creates a world root whose camera covers `width`×`height`.
    pub fn create_world(&mut self, width: f32, height: f32) -> NodeId {
        let id = self.insert(0.0, 0.0, NodeKind::World(WorldData::new(width, height)));
        if let Some(node) = self.nodes.get_mut(id) {
            node.world = Some(id);
        }
        id
    }

    /// Appends `child` to `parent`, detaching it from its previous parent.
    ///
    /// The child joins the parent's world (if any) and its world transform is
    /// recomputed for the whole subtree.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        if !self.contains(parent) || !self.contains(child) {
            warn!("add_child: unknown node");
            return child;
        }
        if parent == child || self.is_ancestor(child, parent) {
            warn!("add_child: a node cannot be added below itself");
            return child;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
            node.dirty.mark(Dirty::BOUNDS);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        let mut subtree = vec![child];
        subtree.extend(self.depth_first_search(child));
        match self.world_of(parent) {
            Some(world) => self.set_world(world, &subtree),
            None => self.clear_world(&subtree),
        }
        self.update_world(child);
        child
    }

    pub fn add_children(&mut self, parent: NodeId, children: &[NodeId]) {
        for &child in children {
            self.add_child(parent, child);
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let index = self.get_child_index(parent, child)?;
        self.remove_child_at(parent, index)
    }

    pub fn remove_children(&mut self, parent: NodeId, children: &[NodeId]) -> Vec<NodeId> {
        children
            .iter()
            .filter_map(|&child| self.remove_child(parent, child))
            .collect()
    }

    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let node = self.nodes.get_mut(parent)?;
        if index >= node.children.len() {
            return None;
        }
        let child = node.children.remove(index);
        node.dirty.mark(Dirty::BOUNDS);
        self.orphan(child);
        Some(child)
    }

    /// Removes the children in `begin..end` (`end` defaults to the child
    /// count). An out of range request removes nothing.
    pub fn remove_children_between(
        &mut self,
        parent: NodeId,
        begin: usize,
        end: Option<usize>,
    ) -> Vec<NodeId> {
        let Some(node) = self.nodes.get_mut(parent) else {
            return Vec::new();
        };
        let len = node.children.len();
        let end = end.unwrap_or(len);
        if begin > end || end > len {
            warn!("remove_children_between: range {begin}..{end} out of bounds for {len} children");
            return Vec::new();
        }
        let removed: Vec<NodeId> = node.children.drain(begin..end).collect();
        if !removed.is_empty() {
            node.dirty.mark(Dirty::BOUNDS);
        }
        for &child in &removed {
            self.orphan(child);
        }
        removed
    }

    /// Moves the children in `begin..end` of `parent` to the end of
    /// `new_parent`, keeping their order.
    pub fn reparent_children(
        &mut self,
        parent: NodeId,
        new_parent: NodeId,
        begin: usize,
        end: Option<usize>,
    ) -> Vec<NodeId> {
        if !self.contains(new_parent) {
            warn!("reparent_children: unknown target");
            return Vec::new();
        }
        let moved = self.remove_children_between(parent, begin, end);
        self.add_children(new_parent, &moved);
        moved
    }

    pub fn destroy_children(&mut self, parent: NodeId, begin: usize, end: Option<usize>) {
        for child in self.remove_children_between(parent, begin, end) {
            self.destroy(child, None);
        }
    }

    /// Destroys `id`. Its children are moved to `reparent_to` when given,
    /// and destroyed with it otherwise.
    pub fn destroy(&mut self, id: NodeId, reparent_to: Option<NodeId>) {
        if !self.contains(id) {
            return;
        }
        match reparent_to {
            Some(target) if target != id => {
                self.reparent_children(id, target, 0, None);
            }
            _ => self.destroy_children(id, 0, None),
        }
        self.detach(id);
        self.events.push(GraphEvent::Destroyed { node: id });
        if let Some(node) = self.nodes.remove(id)
            && let Some(world) = node.world
            && world != id
        {
            self.events.push(GraphEvent::RemovedFromWorld { node: id, world });
        }
        self.released.push(id);
    }

    /// Detaches every child of a world and resets its render state.
    pub fn shutdown_world(&mut self, world: NodeId) {
        self.remove_children_between(world, 0, None);
        if let Some(data) = self.world_data_mut(world) {
            data.stats = Default::default();
            data.force_refresh = false;
            data.camera.dirty_render = true;
        }
    }

    /// All descendants of `id` in depth-first pre-order, `id` excluded.
    pub fn depth_first_search(&self, id: NodeId) -> Vec<NodeId> {
        let mut output = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            output.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        output
    }

    fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        while let Some(parent) = self.parent(id) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    /// Unlinks `child` from its parent's child list.
    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get_mut(child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.retain(|&c| c != child);
            node.dirty.mark(Dirty::BOUNDS);
        }
    }

    /// Clears the parent link of an already unlinked child and takes its
    /// subtree out of its world.
    fn orphan(&mut self, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
        let mut subtree = vec![child];
        subtree.extend(self.depth_first_search(child));
        self.clear_world(&subtree);
        self.update_world(child);
    }

    fn set_world(&mut self, world: NodeId, nodes: &[NodeId]) {
        for &id in nodes {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if node.world == Some(world) || matches!(node.kind, NodeKind::World(_)) {
                continue;
            }
            if let Some(old) = node.world.replace(world) {
                self.events.push(GraphEvent::RemovedFromWorld { node: id, world: old });
            }
            self.events.push(GraphEvent::AddedToWorld { node: id, world });
        }
    }

    fn clear_world(&mut self, nodes: &[NodeId]) {
        for &id in nodes {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if matches!(node.kind, NodeKind::World(_)) {
                continue;
            }
            if let Some(world) = node.world.take() {
                self.events.push(GraphEvent::RemovedFromWorld { node: id, world });
            }
        }
    }

    pub fn is_dirty(&self, id: NodeId, flag: Dirty) -> bool {
        self.nodes.get(id).is_some_and(|n| n.dirty.is_dirty(flag))
    }

    pub fn set_dirty(&mut self, id: NodeId, flag: Dirty) {
        let frame = self.frame;
        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty.set(flag, frame);
        }
    }

    /// Sets `flag` (stamping the frame on its rising edge) and `also`
    /// (without touching the frame).
    pub fn set_dirty_with(&mut self, id: NodeId, flag: Dirty, also: Dirty) {
        let frame = self.frame;
        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty.set(flag, frame);
            node.dirty.mark(also);
        }
    }

    pub fn clear_dirty(&mut self, id: NodeId, flag: Dirty) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty.clear(flag);
        }
    }

    /// Recomputes the world matrix of `id` and all of its descendants,
    /// marking each of them dirty.
    pub fn update_world(&mut self, id: NodeId) {
        let frame = self.frame;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let parent_world = self
                .parent(current)
                .and_then(|p| self.nodes.get(p))
                .map(|p| p.transform.world);
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            node.dirty.set(Dirty::TRANSFORM, frame);
            node.dirty.mark(Dirty::BOUNDS);
            node.transform.update_world(parent_world.as_ref());
            stack.extend(node.children.iter().rev().copied());
        }
    }

    /// Rebuilds the local matrix of `id` and propagates it downwards.
    pub fn update_transform(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.transform.update_local();
        }
        self.update_world(id);
    }

    fn with_transform(&mut self, id: NodeId, f: impl FnOnce(&mut Transform) -> bool) {
        let changed = self
            .nodes
            .get_mut(id)
            .is_some_and(|node| f(&mut node.transform));
        if changed {
            self.update_transform(id);
        }
    }

    pub fn set_position(&mut self, id: NodeId, x: f32, y: f32) {
        self.with_transform(id, |t| {
            t.position.set(x, y);
            true
        });
    }

    pub fn set_x(&mut self, id: NodeId, x: f32) {
        self.with_transform(id, |t| {
            t.position.x = x;
            true
        });
    }

    pub fn set_y(&mut self, id: NodeId, y: f32) {
        self.with_transform(id, |t| {
            t.position.y = y;
            true
        });
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: f32) {
        self.with_transform(id, |t| {
            let changed = t.rotation != rotation;
            t.rotation = rotation;
            changed
        });
    }

    pub fn set_scale(&mut self, id: NodeId, x: f32, y: f32) {
        self.with_transform(id, |t| {
            let changed = t.scale != Vec2::new(x, y);
            t.scale.set(x, y);
            changed
        });
    }

    pub fn set_skew(&mut self, id: NodeId, x: f32, y: f32) {
        self.with_transform(id, |t| {
            let changed = t.skew != Vec2::new(x, y);
            t.skew.set(x, y);
            changed
        });
    }

    fn with_extent(&mut self, id: NodeId, f: impl FnOnce(&mut Transform)) {
        let frame = self.frame;
        if let Some(node) = self.nodes.get_mut(id) {
            f(&mut node.transform);
            node.dirty.set(Dirty::TRANSFORM, frame);
            node.dirty.mark(Dirty::BOUNDS);
        }
    }

    pub fn set_origin(&mut self, id: NodeId, x: f32, y: f32) {
        self.with_extent(id, |t| {
            t.origin.set(x, y);
            t.update_extent(None, None);
        });
    }

    pub fn set_size(&mut self, id: NodeId, width: f32, height: f32) {
        self.with_extent(id, |t| t.update_extent(Some(width), Some(height)));
    }

    pub fn set_width(&mut self, id: NodeId, width: f32) {
        self.with_extent(id, |t| t.update_extent(Some(width), None));
    }

    pub fn set_height(&mut self, id: NodeId, height: f32) {
        self.with_extent(id, |t| t.update_extent(None, Some(height)));
    }

    /// Sprites store alpha per vertex and repack their colors; every other
    /// node only records it and counts as transformed.
    pub fn set_alpha(&mut self, id: NodeId, alpha: f32) {
        let frame = self.frame;
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.alpha == alpha {
            return;
        }
        node.alpha = alpha;
        match &mut node.kind {
            NodeKind::Sprite(sprite) => {
                sprite.vertex_alpha = [alpha; 4];
                node.dirty.set(Dirty::ALPHA, frame);
                node.dirty.mark(Dirty::COLORS);
            }
            _ => node.dirty.set(Dirty::TRANSFORM, frame),
        }
    }

    pub fn set_tint(&mut self, id: NodeId, tint: u32) {
        let frame = self.frame;
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if let NodeKind::Sprite(sprite) = &mut node.kind {
            sprite.tint = tint;
            sprite.vertex_tint = [tint; 4];
            node.dirty.set(Dirty::COLORS, frame);
        }
    }

    /// Hiding or showing a node forces its world to redraw once and the
    /// nearest caching ancestor to re-bake.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.visible == visible {
            return;
        }
        node.visible = visible;
        if let Some(world) = node.world
            && let Some(data) = self.world_data_mut(world)
        {
            data.force_refresh = true;
        }
        if let Some(layer) = self.caching_ancestor(id) {
            self.set_dirty(layer, Dirty::CHILD_CACHE);
        }
    }

    fn caching_ancestor(&self, mut id: NodeId) -> Option<NodeId> {
        while let Some(parent) = self.parent(id) {
            if self.nodes.get(parent).is_some_and(|n| n.will_cache_children) {
                return Some(parent);
            }
            id = parent;
        }
        None
    }

    pub fn set_update_hook(&mut self, id: NodeId, hook: UpdateHook) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.hooks.update = Some(hook);
        }
    }

    pub fn set_post_update_hook(&mut self, id: NodeId, hook: UpdateHook) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.hooks.post_update = Some(hook);
        }
    }

    /// Points a sprite at the texture stored under `key`. Unknown keys
    /// resolve to the missing texture.
    pub fn set_texture(
        &mut self,
        id: NodeId,
        textures: &TextureManager,
        key: &str,
        frame: Option<&str>,
    ) {
        let texture = textures.get(key);
        self.set_texture_id(id, textures, texture, frame);
    }

    pub fn set_texture_id(
        &mut self,
        id: NodeId,
        textures: &TextureManager,
        texture: TextureId,
        frame: Option<&str>,
    ) {
        let Some(tex) = textures.texture(texture) else {
            warn!("set_texture: texture is no longer loaded");
            return;
        };
        let frame = tex.get_frame(frame);
        self.apply_frame(id, texture, frame);
    }

    /// Switches a sprite to another frame of its current texture.
    pub fn set_frame(&mut self, id: NodeId, textures: &TextureManager, key: &str) {
        let Some(texture) = self.sprite(id).and_then(|s| s.texture) else {
            warn!("set_frame: node has no texture");
            return;
        };
        self.set_texture_id(id, textures, texture, Some(key));
    }

    fn apply_frame(&mut self, id: NodeId, texture: TextureId, frame: &Frame) {
        let frame_no = self.frame;
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let Node {
            kind,
            transform,
            dirty,
            ..
        } = node;
        let NodeKind::Sprite(sprite) = kind else {
            warn!("set_texture: node is not a sprite");
            return;
        };
        if sprite.texture == Some(texture) && sprite.frame.as_deref() == Some(frame.key.as_str()) {
            return;
        }
        sprite.texture = Some(texture);
        sprite.frame = Some(frame.key.clone());
        sprite.has_texture = true;
        sprite.set_uvs(frame);
        if let Some(pivot) = frame.pivot {
            transform.origin = pivot;
        }
        let (x, y, width, height) = frame.extent_rect(transform.origin);
        transform.set_extent(x, y, width, height);
        dirty.set(Dirty::TRANSFORM, frame_no);
        dirty.mark(Dirty::BOUNDS);
    }

    /// Axis-aligned world bounds of `id`, optionally including its children.
    pub fn bounds(&mut self, id: NodeId) -> Rectangle {
        let Some(node) = self.nodes.get(id) else {
            return Rectangle::default();
        };
        let stale = node.dirty.is_dirty(Dirty::BOUNDS)
            || (node.bounds.include_children && !node.children.is_empty());
        if node.bounds.fixed || !stale {
            return node.bounds.area;
        }
        let corners = node.transform.vertices();
        let mut min = corners[0];
        let mut max = corners[0];
        for (x, y) in corners {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        if node.bounds.include_children {
            let visible_only = node.bounds.visible_only;
            let children = node.children.clone();
            for child in children {
                if visible_only && !self.nodes.get(child).is_some_and(|c| c.visible) {
                    continue;
                }
                let area = self.bounds(child);
                min = (min.0.min(area.x), min.1.min(area.y));
                max = (max.0.max(area.right()), max.1.max(area.bottom()));
            }
        }
        let area = Rectangle::new(min.0, min.1, max.0 - min.0, max.1 - min.1);
        if let Some(node) = self.nodes.get_mut(id) {
            node.bounds.area = area;
            node.dirty.clear(Dirty::BOUNDS);
        }
        area
    }

    /// Runs the update hook of `id`, then its children (those with
    /// `will_update`), then its post-update hook.
    pub fn update(&mut self, id: NodeId, delta: f64, time: f64) {
        let Some(hook) = self.nodes.get(id).map(|n| n.hooks.update) else {
            return;
        };
        if let Some(hook) = hook {
            hook(self, id, delta, time);
        }
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.will_update_children {
            let children = node.children.clone();
            for child in children {
                if self.nodes.get(child).is_some_and(|c| c.will_update) {
                    self.update(child, delta, time);
                }
            }
        }
        if let Some(hook) = self.nodes.get(id).and_then(|n| n.hooks.post_update) {
            hook(self, id, delta, time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_world() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let world = graph.create_world(800.0, 600.0);
        (graph, world)
    }

    #[test]
    fn depth_first_search_is_pre_order() {
        let (mut graph, world) = graph_with_world();
        let a = graph.create_container(0.0, 0.0);
        let b = graph.create_container(0.0, 0.0);
        let c = graph.create_container(0.0, 0.0);
        let d = graph.create_container(0.0, 0.0);
        graph.add_child(world, a);
        graph.add_child(a, b);
        graph.add_child(a, c);
        graph.add_child(world, d);
        assert_eq!(graph.depth_first_search(world), vec![a, b, c, d]);
    }

    #[test]
    fn adding_to_new_parent_detaches_from_old() {
        let (mut graph, world) = graph_with_world();
        let a = graph.create_container(0.0, 0.0);
        let b = graph.create_container(0.0, 0.0);
        let child = graph.create_container(0.0, 0.0);
        graph.add_children(world, &[a, b]);
        graph.add_child(a, child);
        graph.add_child(b, child);
        assert!(graph.children(a).is_empty());
        assert_eq!(graph.children(b), &[child]);
        assert_eq!(graph.parent(child), Some(b));
    }

    #[test]
    fn world_membership_follows_parent() {
        let (mut graph, world) = graph_with_world();
        let loose = graph.create_container(0.0, 0.0);
        let child = graph.create_container(0.0, 0.0);
        graph.add_child(loose, child);
        assert_eq!(graph.world_of(child), None);
        graph.add_child(world, loose);
        assert_eq!(graph.world_of(child), Some(world));
        let events = graph.drain_events();
        assert!(events.contains(&GraphEvent::AddedToWorld { node: child, world }));
        graph.remove_child(world, loose);
        assert_eq!(graph.world_of(child), None);
    }

    #[test]
    fn cannot_add_ancestor_below_descendant() {
        let (mut graph, world) = graph_with_world();
        let a = graph.create_container(0.0, 0.0);
        let b = graph.create_container(0.0, 0.0);
        graph.add_child(world, a);
        graph.add_child(a, b);
        graph.add_child(b, a);
        assert_eq!(graph.parent(a), Some(world));
    }

    #[test]
    fn remove_children_between_rejects_bad_ranges() {
        let (mut graph, world) = graph_with_world();
        let kids: Vec<_> = (0..3).map(|_| graph.create_container(0.0, 0.0)).collect();
        graph.add_children(world, &kids);
        assert!(graph.remove_children_between(world, 2, Some(5)).is_empty());
        assert_eq!(graph.remove_children_between(world, 1, None), kids[1..].to_vec());
        assert_eq!(graph.children(world), &kids[..1]);
        assert!(graph.parent(kids[2]).is_none());
    }

    #[test]
    fn destroy_with_reparent_keeps_children() {
        let (mut graph, world) = graph_with_world();
        let a = graph.create_container(0.0, 0.0);
        let kids: Vec<_> = (0..2).map(|_| graph.create_container(0.0, 0.0)).collect();
        graph.add_child(world, a);
        graph.add_children(a, &kids);
        graph.destroy(a, Some(world));
        assert!(!graph.contains(a));
        assert_eq!(graph.children(world), kids.as_slice());
        assert_eq!(graph.take_released(), vec![a]);
    }

    #[test]
    fn destroy_without_reparent_destroys_subtree() {
        let (mut graph, world) = graph_with_world();
        let a = graph.create_container(0.0, 0.0);
        let b = graph.create_container(0.0, 0.0);
        graph.add_child(world, a);
        graph.add_child(a, b);
        graph.destroy(a, None);
        assert!(!graph.contains(b));
        assert!(graph.children(world).is_empty());
        let events = graph.drain_events();
        assert!(events.contains(&GraphEvent::Destroyed { node: b }));
        assert!(events.contains(&GraphEvent::Destroyed { node: a }));
    }

    #[test]
    fn setters_skip_unchanged_values() {
        let (mut graph, world) = graph_with_world();
        let a = graph.create_container(0.0, 0.0);
        graph.add_child(world, a);
        graph.clear_dirty(a, Dirty::TRANSFORM);
        graph.set_scale(a, 1.0, 1.0);
        assert!(!graph.is_dirty(a, Dirty::TRANSFORM));
        graph.set_scale(a, 2.0, 1.0);
        assert!(graph.is_dirty(a, Dirty::TRANSFORM));
    }

    #[test]
    fn update_runs_hooks_in_order() {
        fn mark(graph: &mut SceneGraph, id: NodeId, _: f64, _: f64) {
            let order = graph.get(id).map(|n| n.name.len()).unwrap_or(0);
            if let Some(node) = graph.get_mut(id) {
                node.name.push_str(&order.to_string());
            }
        }
        let (mut graph, world) = graph_with_world();
        let a = graph.create_container(0.0, 0.0);
        graph.add_child(world, a);
        graph.set_update_hook(a, mark);
        graph.set_post_update_hook(a, mark);
        graph.update(world, 16.0, 16.0);
        assert_eq!(graph.get(a).map(|n| n.name.as_str()), Some("01"));
    }
}
