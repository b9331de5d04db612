//! Containment resolution.
//!
//! Answers "which group(s) contain this box" over a [`GroupIndex`], a flat view
//! of group rectangles and parent links. Tasks use a center-inside rule so drops
//! follow the pointer; groups use an overlap rule so an overhanging edge does not
//! eject them from their parent.
//!
//! Resolution is a linear scan over groups, which is fine for boards of a few
//! hundred groups.

use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use taskcanvas_core::NodeId;
use taskcanvas_settings::ContainmentSettings;

use crate::geometry::{overlap_fraction, Bounds, Spatial};
use crate::model::Group;
use crate::store::BoardReader;

/// Ancestor chains are short in practice.
pub type AncestorChain = SmallVec<[NodeId; 8]>;

/// A group's rectangle and parent link.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRect {
    pub id: NodeId,
    pub bounds: Bounds,
    pub parent_id: Option<NodeId>,
}

impl Spatial for GroupRect {
    fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// Flat, queryable view of all groups.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    rects: Vec<GroupRect>,
    by_id: HashMap<NodeId, usize>,
}

impl GroupIndex {
    pub fn from_groups<'a>(groups: impl IntoIterator<Item = &'a Group>) -> Self {
        let mut index = Self::default();
        for group in groups {
            index.insert(GroupRect {
                id: group.id.clone(),
                bounds: group.bounds(),
                parent_id: group.parent_group_id.clone(),
            });
        }
        index
    }

    pub fn from_reader(board: &dyn BoardReader) -> Self {
        Self::from_groups(board.groups())
    }

    pub fn insert(&mut self, rect: GroupRect) {
        match self.by_id.get(&rect.id) {
            Some(&i) => self.rects[i] = rect,
            None => {
                self.by_id.insert(rect.id.clone(), self.rects.len());
                self.rects.push(rect);
            }
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&GroupRect> {
        self.by_id.get(id).map(|&i| &self.rects[i])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupRect> {
        self.rects.iter()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Overrides a group's rectangle, e.g. with its in-flight drag bounds.
    pub fn set_bounds(&mut self, id: &NodeId, bounds: Bounds) {
        if let Some(&i) = self.by_id.get(id) {
            self.rects[i].bounds = bounds;
        }
    }

    pub fn set_parent(&mut self, id: &NodeId, parent_id: Option<NodeId>) {
        if let Some(&i) = self.by_id.get(id) {
            self.rects[i].parent_id = parent_id;
        }
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.get(id).and_then(|rect| rect.parent_id.as_ref())
    }

    /// Direct child groups of `id`.
    pub fn children_of<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a GroupRect> + 'a {
        self.rects
            .iter()
            .filter(move |rect| rect.parent_id.as_ref() == Some(id))
    }

    /// All descendant groups of `id`, breadth first. Cycles are cut.
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen: HashSet<&NodeId> = HashSet::new();
        seen.insert(id);
        let mut frontier = vec![id];
        while let Some(current) = frontier.pop() {
            for child in self.children_of(current) {
                if seen.insert(&child.id) {
                    out.push(child.id.clone());
                    frontier.push(&child.id);
                }
            }
        }
        out
    }

    /// Ancestors of `id` from immediate parent up to the root, bounded by
    /// `max_depth` and cut at the first revisit.
    pub fn ancestors(&self, id: &NodeId, max_depth: usize) -> AncestorChain {
        let mut chain = AncestorChain::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if chain.len() >= max_depth || parent == id || chain.contains(parent) {
                tracing::warn!("Ancestor walk for {} cut at {}", id, parent);
                break;
            }
            chain.push(parent.clone());
            current = self.parent_of(parent);
        }
        chain
    }

    /// Number of ancestors; a root group has depth 0.
    pub fn depth(&self, id: &NodeId, max_depth: usize) -> usize {
        self.ancestors(id, max_depth).len()
    }
}

/// True when making `proposed_parent` the parent of `node_id` would close a cycle.
///
/// Walks the proposed parent's ancestor chain looking for `node_id`. Revisiting
/// an ancestor (an existing upstream cycle) or exceeding `max_depth` also counts
/// as a cycle.
pub fn would_create_cycle(
    node_id: &NodeId,
    proposed_parent: &NodeId,
    index: &GroupIndex,
    max_depth: usize,
) -> bool {
    let mut visited: HashSet<&NodeId> = HashSet::new();
    let mut current = Some(proposed_parent);
    let mut hops = 0;
    while let Some(id) = current {
        if id == node_id {
            return true;
        }
        if !visited.insert(id) {
            tracing::warn!("Existing parent cycle detected above {}", proposed_parent);
            return true;
        }
        hops += 1;
        if hops > max_depth {
            tracing::warn!(
                "Ancestor chain of {} exceeds {} hops; treating as cycle",
                proposed_parent,
                max_depth
            );
            return true;
        }
        current = index.parent_of(id);
    }
    false
}

/// Predicate deciding whether a box counts as inside a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContainmentRule {
    /// The box's center lies inside the group (tasks).
    Center,
    /// At least this fraction of the box's area overlaps the group (groups).
    Overlap(f64),
}

impl ContainmentRule {
    pub fn matches(&self, item: &Bounds, group: &Bounds) -> bool {
        match self {
            ContainmentRule::Center => group.contains_point(item.center()),
            ContainmentRule::Overlap(threshold) => overlap_fraction(item, group) >= *threshold,
        }
    }
}

/// Containment queries with configured tolerances.
#[derive(Debug, Clone)]
pub struct ContainmentResolver {
    settings: ContainmentSettings,
}

impl ContainmentResolver {
    pub fn new(settings: ContainmentSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ContainmentSettings {
        &self.settings
    }

    /// Rule used when reparenting groups.
    pub fn group_rule(&self) -> ContainmentRule {
        ContainmentRule::Overlap(self.settings.overlap_threshold)
    }

    /// Smallest group whose rectangle satisfies `rule` for `item`.
    pub fn find_smallest_containing<'a>(
        &self,
        item: &Bounds,
        index: &'a GroupIndex,
        rule: ContainmentRule,
    ) -> Option<&'a GroupRect> {
        let matching: Vec<&GroupRect> = index
            .iter()
            .filter(|group| rule.matches(item, &group.bounds))
            .collect();
        smallest(&matching)
    }

    /// Every matching group, largest first (root to leaf).
    pub fn find_all_containing<'a>(
        &self,
        item: &Bounds,
        index: &'a GroupIndex,
        rule: ContainmentRule,
    ) -> Vec<&'a GroupRect> {
        let mut matching: Vec<&GroupRect> = index
            .iter()
            .filter(|group| rule.matches(item, &group.bounds))
            .collect();
        matching.sort_by(|a, b| b.bounds.area().total_cmp(&a.bounds.area()));
        matching
    }

    /// Parent for a task whose box is `item`.
    pub fn task_parent(&self, item: &Bounds, index: &GroupIndex) -> Option<NodeId> {
        self.find_smallest_containing(item, index, ContainmentRule::Center)
            .map(|group| group.id.clone())
    }

    /// Parent for group `group_id` occupying `bounds`.
    ///
    /// A candidate must not be the group or one of its descendants, must exceed
    /// its area by the configured ratio, and must satisfy the overlap rule. The
    /// smallest candidate wins. If the winner would close a cycle (possible only
    /// with already-corrupt links) the group is left at root level.
    pub fn select_group_parent(
        &self,
        group_id: &NodeId,
        bounds: &Bounds,
        index: &GroupIndex,
    ) -> Option<NodeId> {
        let excluded: HashSet<NodeId> = index.descendants(group_id).into_iter().collect();
        let min_area = bounds.area() * self.settings.group_area_ratio;
        let rule = self.group_rule();

        let candidates: Vec<&GroupRect> = index
            .iter()
            .filter(|candidate| {
                &candidate.id != group_id
                    && !excluded.contains(&candidate.id)
                    && candidate.bounds.area() > min_area
                    && rule.matches(bounds, &candidate.bounds)
            })
            .collect();
        let winner = smallest(&candidates)?;

        if self.would_create_cycle(group_id, &winner.id, index) {
            tracing::warn!(
                "Parent {} for {} would create a cycle; keeping it at root level",
                winner.id,
                group_id
            );
            return None;
        }
        Some(winner.id.clone())
    }

    pub fn would_create_cycle(
        &self,
        node_id: &NodeId,
        proposed_parent: &NodeId,
        index: &GroupIndex,
    ) -> bool {
        would_create_cycle(
            node_id,
            proposed_parent,
            index,
            self.settings.max_ancestor_depth,
        )
    }

    /// True when `group_id` claims a parent that no longer contains it.
    ///
    /// A claimed parent that is missing from the index is stale as well.
    pub fn has_stale_parent(&self, group_id: &NodeId, index: &GroupIndex) -> bool {
        let Some(rect) = index.get(group_id) else {
            return false;
        };
        match &rect.parent_id {
            None => false,
            Some(parent) => match index.get(parent) {
                None => true,
                Some(parent) => !self.group_rule().matches(&rect.bounds, &parent.bounds),
            },
        }
    }

    /// Every group whose parent link is stale.
    pub fn find_stale_groups(&self, index: &GroupIndex) -> Vec<NodeId> {
        index
            .iter()
            .filter(|rect| self.has_stale_parent(&rect.id, index))
            .map(|rect| rect.id.clone())
            .collect()
    }
}

fn smallest<'a>(candidates: &[&'a GroupRect]) -> Option<&'a GroupRect> {
    crate::geometry::smallest_containing(candidates).copied()
}
