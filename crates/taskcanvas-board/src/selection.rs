use taskcanvas_core::NodeId;

/// Saved selection state, restored after a drag gesture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    selected: Vec<NodeId>,
    primary: Option<NodeId>,
}

impl SelectionSnapshot {
    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn primary(&self) -> Option<&NodeId> {
        self.primary.as_ref()
    }
}

/// Manages node selection state.
///
/// `SelectionManager` is responsible for:
/// - Tracking which node is the "primary" selection
/// - Keeping the ordered set of selected nodes (multi-select)
/// - Saving and restoring selection around drag gestures
///
/// # Selection Model
///
/// - **Primary Selection**: One node is designated as the "primary" selection, the
///   node the gesture started on
/// - **Multiple Selection**: Any number of nodes, in selection order
/// - **Multi-select**: `multi` toggles membership without clearing other nodes
///
/// # Design
///
/// Render layers tend to clear selection when a drag ends. The drag orchestrator
/// takes a [`SelectionSnapshot`] at drag start and restores it after commit.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    selected: Vec<NodeId>,
    primary: Option<NodeId>,
}

impl SelectionManager {
    /// Creates a new `SelectionManager` with no selection.
    ///
    /// # Examples
    ///
    /// ```
    /// use taskcanvas_board::selection::SelectionManager;
    ///
    /// let manager = SelectionManager::new();
    /// assert_eq!(manager.primary(), None);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the primary selected node.
    pub fn primary(&self) -> Option<&NodeId> {
        self.primary.as_ref()
    }

    /// Returns the selected nodes in selection order.
    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn is_selected(&self, id: &NodeId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selects a node.
    ///
    /// # Arguments
    ///
    /// * `id` - The node to select
    /// * `multi` - If `true`, toggles `id` without affecting other nodes
    ///
    /// # Multi-select Behavior
    ///
    /// - If `multi` is `false`: Replaces the selection with `id`
    /// - If `multi` is `true`: Adds `id`, or removes it when already selected
    pub fn select(&mut self, id: NodeId, multi: bool) {
        if !multi {
            self.selected.clear();
            self.selected.push(id.clone());
            self.primary = Some(id);
            return;
        }

        if let Some(pos) = self.selected.iter().position(|s| s == &id) {
            self.selected.remove(pos);
            if self.primary.as_ref() == Some(&id) {
                self.primary = self.selected.last().cloned();
            }
        } else {
            self.selected.push(id.clone());
            self.primary = Some(id);
        }
    }

    /// Replaces the selection with `ids`; the last id becomes primary.
    pub fn select_many(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selected.clear();
        for id in ids {
            if !self.selected.contains(&id) {
                self.selected.push(id);
            }
        }
        self.primary = self.selected.last().cloned();
    }

    /// Deselects all nodes and clears the primary selection.
    pub fn deselect_all(&mut self) {
        self.selected.clear();
        self.primary = None;
    }

    /// Drops a node from the selection, e.g. after deletion.
    pub fn remove(&mut self, id: &NodeId) {
        self.selected.retain(|s| s != id);
        if self.primary.as_ref() == Some(id) {
            self.primary = self.selected.last().cloned();
        }
    }

    /// Captures the current selection.
    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            selected: self.selected.clone(),
            primary: self.primary.clone(),
        }
    }

    /// Restores a previously captured selection.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - State returned by [`snapshot`](Self::snapshot)
    pub fn restore(&mut self, snapshot: SelectionSnapshot) {
        self.selected = snapshot.selected;
        self.primary = snapshot.primary;
    }
}
