//! Per-frame render lists.
//!
//! Each frame every world walks its subtree and produces a tree of
//! [`RenderEntry`] values that mirrors the visible part of the scene graph.
//! Renderers consume those lists; they never walk the graph themselves.
//!
//! # Cached layers
//!
//! A node with `will_cache_children` bakes its children into a texture.
//! After the walk, each cached entry is checked: when the camera moved or
//! anything below it still has a pending transform, the layer is flagged
//! [`Dirty::CHILD_CACHE`] and its children are drawn again. Otherwise its
//! child entries are dropped and the renderer reuses the texture.

use crate::data_structures::{
    dirty::Dirty,
    scene_graph::{NodeId, NodeKind, SceneGraph},
    world::{RenderStats, StaticCamera},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderEntry {
    pub node: NodeId,
    pub children: Vec<RenderEntry>,
}

impl RenderEntry {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Entries below this one, depth-first.
    pub fn count(&self) -> usize {
        self.children.iter().map(|child| 1 + child.count()).sum()
    }
}

/// What one world contributes to a frame.
#[derive(Clone, Debug)]
pub struct WorldRenderData {
    pub world: NodeId,
    pub camera: StaticCamera,
    pub stats: RenderStats,
    pub render_list: Vec<RenderEntry>,
}

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug, Default)]
pub struct SceneRenderData {
    pub game_frame: u64,
    pub num_total_frames: u32,
    pub num_dirty_frames: u32,
    pub num_dirty_cameras: u32,
    pub world_data: Vec<WorldRenderData>,
}

impl SceneRenderData {
    pub fn new(game_frame: u64) -> Self {
        Self {
            game_frame,
            ..Default::default()
        }
    }

    /// Nothing changed since the last frame, so it may be skipped.
    pub fn is_clean(&self) -> bool {
        self.num_dirty_frames == 0 && self.num_dirty_cameras == 0
    }

    pub fn merge(&mut self, world: WorldRenderData) {
        self.num_dirty_frames += world.stats.dirty_frame;
        self.num_total_frames += world.stats.num_rendered;
        if world.camera.dirty_render {
            self.num_dirty_cameras += 1;
        }
        self.world_data.push(world);
    }
}

/// Builds the render list of `world` and merges it into `scene`.
///
/// Hidden or non-rendering worlds only get their stats reset. The camera's
/// `dirty_render` is cleared once the world has been merged.
pub fn render_world(graph: &mut SceneGraph, world: NodeId, scene: &mut SceneRenderData) {
    let game_frame = scene.game_frame;
    let Some(node) = graph.get(world) else {
        return;
    };
    let active = node.will_render && node.visible;
    let Some(data) = graph.world_data_mut(world) else {
        return;
    };
    data.stats = RenderStats {
        game_frame,
        ..Default::default()
    };
    if !active {
        return;
    }
    let camera_dirty = data.camera.dirty_render;

    let mut render_list = Vec::new();
    walk(graph, world, camera_dirty, &mut render_list);

    let mut stats = RenderStats {
        game_frame,
        ..Default::default()
    };
    count_renderable(graph, &render_list, &mut stats);

    let Some(data) = graph.world_data_mut(world) else {
        return;
    };
    if data.force_refresh {
        stats.dirty_frame += 1;
        data.force_refresh = false;
    }
    data.stats = stats;
    scene.merge(WorldRenderData {
        world,
        camera: data.camera.clone(),
        stats,
        render_list,
    });
    data.camera.dirty_render = false;
}

/// Depth-first walk over the renderable children of `parent`.
///
/// Plain layers do not render themselves; their children are spliced into
/// the parent's list instead.
fn walk(graph: &mut SceneGraph, parent: NodeId, camera_dirty: bool, output: &mut Vec<RenderEntry>) {
    let children = graph.children(parent).to_vec();
    for id in children {
        let Some(node) = graph.get(id) else {
            continue;
        };
        let descend = node.will_render_children && node.num_children() > 0;
        if !node.is_renderable() {
            if node.visible && descend && matches!(node.kind, NodeKind::Layer) {
                walk(graph, id, camera_dirty, output);
            }
            continue;
        }
        let cached = node.will_cache_children;
        let mut entry = RenderEntry::new(id);
        if descend {
            walk(graph, id, camera_dirty, &mut entry.children);
            if cached {
                update_cached_layer(graph, &mut entry, camera_dirty);
            }
        }
        output.push(entry);
    }
}

fn update_cached_layer(graph: &mut SceneGraph, layer: &mut RenderEntry, camera_dirty: bool) {
    if camera_dirty || has_dirty_children(graph, layer) {
        graph.set_dirty(layer.node, Dirty::CHILD_CACHE);
    } else {
        layer.children.clear();
    }
}

/// True if the layer itself needs a re-bake or any entry below it has a
/// pending transform.
fn has_dirty_children(graph: &SceneGraph, layer: &RenderEntry) -> bool {
    if graph.is_dirty(layer.node, Dirty::CHILD_CACHE) {
        return true;
    }
    let mut stack = vec![layer];
    while let Some(entry) = stack.pop() {
        if graph.is_dirty(entry.node, Dirty::TRANSFORM) {
            return true;
        }
        stack.extend(entry.children.iter());
    }
    false
}

fn count_renderable(graph: &SceneGraph, entries: &[RenderEntry], stats: &mut RenderStats) {
    for entry in entries {
        stats.num_rendered += 1;
        stats.num_renderable += 1;
        if graph
            .get(entry.node)
            .is_some_and(|node| node.dirty.frame() >= stats.game_frame)
        {
            stats.dirty_frame += 1;
        }
        count_renderable(graph, &entry.children, stats);
    }
}
