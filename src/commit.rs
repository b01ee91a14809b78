//! Commit phase: apply a finished work-in-progress tree to the host.
//!
//! Three passes. Mutation applies deletions, placements and updates against
//! the still-committed old tree, then the buffers swap. Layout runs after
//! the swap and attaches refs. Passive effects are not run here at all;
//! they are queued and flushed by a deferred scheduler task (or right
//! before the next render of the same root, whichever comes first).

use std::rc::Rc;

use crate::engine::{Engine, EngineTask};
use crate::error::{EngineError, Result};
use crate::fiber::{FiberId, FiberProps, Flags, RootId, StateNode, WorkTag};
use crate::host::{ChildOf, HostBackend, HostParent, ParentOf};
use crate::hooks::{EffectTag, Hook};
use crate::lane::Lane;
use crate::scheduler::Priority;

impl<H: HostBackend> Engine<H> {
    /// Apply the root's finished tree. No-op when nothing is finished.
    pub(crate) fn commit_root(&mut self, root: RootId) -> Result<()> {
        let Some(finished) = self.roots[root].finished_work.take() else {
            return Ok(());
        };
        let lane = self.roots[root].finished_lane;
        self.roots[root].finished_lane = Lane::NONE;
        self.roots[root].mark_finished(lane);
        // The pass is committing; its folded updates are permanent now.
        self.consumed.clear();

        let root_flags = self.fibers[finished].flags | self.fibers[finished].subtree_flags;

        if root_flags.intersects(Flags::PASSIVE_MASK) && !self.roots[root].passive_scheduled {
            self.roots[root].passive_scheduled = true;
            self.scheduler
                .schedule(Priority::Normal, EngineTask::FlushPassive(root), None);
        }

        self.collect_passive_effects(root, finished);
        if root_flags.intersects(Flags::MUTATION_MASK) {
            self.commit_mutation_effects(root, finished)?;
        }
        self.roots[root].current = finished;
        if root_flags.intersects(Flags::LAYOUT_MASK) {
            self.commit_layout_effects(finished);
        }
        Ok(())
    }

    /// Gather function components whose effects must fire, top-down, so the
    /// passive flush visits parents before children.
    fn collect_passive_effects(&mut self, root: RootId, fiber: FiberId) {
        if self.fibers[fiber].tag == WorkTag::FunctionComponent
            && self.fibers[fiber].flags.contains(Flags::PASSIVE_EFFECT)
        {
            self.roots[root].pending_passive.update.push(fiber);
        }
        if self.fibers[fiber].subtree_flags.intersects(Flags::PASSIVE_EFFECT) {
            let mut cursor = self.fibers[fiber].child;
            while let Some(child) = cursor {
                cursor = self.fibers[child].sibling;
                self.collect_passive_effects(root, child);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutation pass
    // -----------------------------------------------------------------------

    fn commit_mutation_effects(&mut self, root: RootId, fiber: FiberId) -> Result<()> {
        let deletions: Vec<FiberId> =
            std::mem::take(&mut self.fibers[fiber].deletions).into_vec();
        if !deletions.is_empty() {
            let host_parent = self.host_parent_at(fiber)?;
            for deleted in deletions {
                self.commit_deletion(root, deleted, &host_parent)?;
            }
        }

        if self.fibers[fiber].subtree_flags.intersects(Flags::MUTATION_MASK) {
            let mut cursor = self.fibers[fiber].child;
            while let Some(child) = cursor {
                cursor = self.fibers[child].sibling;
                self.commit_mutation_effects(root, child)?;
            }
        }

        let flags = self.fibers[fiber].flags;
        if flags.contains(Flags::PLACEMENT) {
            self.commit_placement(fiber)?;
            self.fibers[fiber].flags.clear(Flags::PLACEMENT);
        }
        if flags.contains(Flags::UPDATE) {
            self.commit_update(fiber)?;
            self.fibers[fiber].flags.clear(Flags::UPDATE);
        }
        Ok(())
    }

    /// The nearest host surface at or above `fiber`.
    fn host_parent_at(&self, fiber: FiberId) -> Result<ParentOf<H>> {
        let mut cursor = Some(fiber);
        while let Some(node) = cursor {
            match &self.fibers[node].state_node {
                StateNode::Instance(instance) => {
                    return Ok(HostParent::Element(instance.clone()));
                }
                StateNode::Root(root) => {
                    return Ok(HostParent::Container(self.roots[*root].container.clone()));
                }
                _ => {}
            }
            cursor = self.fibers[node].parent;
        }
        Err(EngineError::HostParentNotFound)
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Unmount a committed subtree: collect effect cleanups, detach refs,
    /// remove each topmost host node once, then free the fibers.
    fn commit_deletion(
        &mut self,
        root: RootId,
        deleted: FiberId,
        host_parent: &ParentOf<H>,
    ) -> Result<()> {
        let mut host_roots: Vec<ChildOf<H>> = Vec::new();
        self.unmount_subtree(root, deleted, &mut host_roots, true)?;
        for child in &host_roots {
            self.host.remove_child(host_parent, child);
        }
        self.free_subtree(deleted);
        Ok(())
    }

    /// Walk the deleted subtree. `collecting` is true until the first host
    /// node on each path; only those topmost host nodes are removed from
    /// the parent, their descendants go with them.
    fn unmount_subtree(
        &mut self,
        root: RootId,
        fiber: FiberId,
        host_roots: &mut Vec<ChildOf<H>>,
        collecting: bool,
    ) -> Result<()> {
        let descend_collecting = match self.fibers[fiber].tag {
            WorkTag::HostElement | WorkTag::HostText => {
                if collecting {
                    host_roots.push(self.host_handle(fiber)?);
                }
                if let Some(node_ref) = &self.fibers[fiber].node_ref {
                    node_ref.detach();
                }
                false
            }
            WorkTag::FunctionComponent => {
                let effects: Vec<_> = self.fibers[fiber]
                    .hooks
                    .iter()
                    .filter_map(|hook| match hook {
                        Hook::Effect(eff) => Some(eff.clone()),
                        Hook::State(_) => None,
                    })
                    .collect();
                self.roots[root].pending_passive.unmount.extend(effects);
                collecting
            }
            _ => collecting,
        };

        let mut cursor = self.fibers[fiber].child;
        while let Some(child) = cursor {
            cursor = self.fibers[child].sibling;
            self.unmount_subtree(root, child, host_roots, descend_collecting)?;
        }
        Ok(())
    }

    /// Free a subtree (and each node's alternate) from the arena.
    fn free_subtree(&mut self, fiber: FiberId) {
        let mut stack = vec![fiber];
        while let Some(node) = stack.pop() {
            let Some(record) = self.fibers.get(node) else {
                continue;
            };
            let alternate = record.alternate;
            let mut cursor = record.child;
            while let Some(child) = cursor {
                stack.push(child);
                cursor = self.fibers[child].sibling;
            }
            if let Some(alt) = alternate {
                self.fibers.remove(alt);
            }
            self.fibers.remove(node);
        }
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Insert a placed node's host material into the nearest host parent,
    /// before the next stable host sibling (or at the end).
    fn commit_placement(&mut self, fiber: FiberId) -> Result<()> {
        let parent_fiber = self.fibers[fiber].parent.ok_or(EngineError::HostParentNotFound)?;
        let parent = self.host_parent_at(parent_fiber)?;
        let before = self.host_sibling(fiber);
        self.insert_or_append(fiber, before.as_ref(), &parent)
    }

    /// The next host node after `fiber` that is itself stable (not also
    /// being placed), if any. Searches forward through siblings and down
    /// through non-host wrappers, without crossing the host parent.
    fn host_sibling(&self, fiber: FiberId) -> Option<ChildOf<H>> {
        let mut node = fiber;
        'siblings: loop {
            loop {
                if let Some(sibling) = self.fibers[node].sibling {
                    node = sibling;
                    break;
                }
                match self.fibers[node].parent {
                    None => return None,
                    Some(parent)
                        if matches!(
                            self.fibers[parent].tag,
                            WorkTag::HostElement | WorkTag::Root
                        ) =>
                    {
                        return None;
                    }
                    Some(parent) => node = parent,
                }
            }
            while !matches!(
                self.fibers[node].tag,
                WorkTag::HostElement | WorkTag::HostText
            ) {
                // A subtree that is itself moving cannot anchor an insert.
                if self.fibers[node].flags.contains(Flags::PLACEMENT) {
                    continue 'siblings;
                }
                match self.fibers[node].child {
                    None => continue 'siblings,
                    Some(child) => node = child,
                }
            }
            if !self.fibers[node].flags.contains(Flags::PLACEMENT) {
                return self.host_handle(node).ok();
            }
        }
    }

    /// Recurse through non-host wrappers placing every host node of the
    /// subtree at the same insertion point.
    fn insert_or_append(
        &mut self,
        fiber: FiberId,
        before: Option<&ChildOf<H>>,
        parent: &ParentOf<H>,
    ) -> Result<()> {
        match self.fibers[fiber].tag {
            WorkTag::HostElement | WorkTag::HostText => {
                let child = self.host_handle(fiber)?;
                match (before, parent) {
                    (Some(anchor), _) => self.host.insert_child_before(parent, &child, anchor),
                    (None, HostParent::Container(container)) => {
                        let container = container.clone();
                        self.host.append_child_to_container(&container, &child);
                    }
                    (None, HostParent::Element(_)) => self.host.append_child(parent, &child),
                }
                Ok(())
            }
            _ => {
                let mut cursor = self.fibers[fiber].child;
                while let Some(child) = cursor {
                    cursor = self.fibers[child].sibling;
                    self.insert_or_append(child, before, parent)?;
                }
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    fn commit_update(&mut self, fiber: FiberId) -> Result<()> {
        match self.fibers[fiber].tag {
            WorkTag::HostText => {
                let StateNode::Text(instance) = self.fibers[fiber].state_node.clone() else {
                    return Err(EngineError::MalformedFiber);
                };
                let FiberProps::Text(content) = &self.fibers[fiber].memoized_props else {
                    return Err(EngineError::MalformedFiber);
                };
                let content = content.clone();
                self.host.commit_text_update(&instance, &content);
                Ok(())
            }
            WorkTag::HostElement => {
                let StateNode::Instance(instance) = self.fibers[fiber].state_node.clone() else {
                    return Err(EngineError::MalformedFiber);
                };
                let FiberProps::Host { props, .. } = &self.fibers[fiber].memoized_props else {
                    return Err(EngineError::MalformedFiber);
                };
                let props = props.clone();
                self.host.commit_instance_update(&instance, &props);
                Ok(())
            }
            _ => Err(EngineError::MalformedFiber),
        }
    }

    // -----------------------------------------------------------------------
    // Layout pass
    // -----------------------------------------------------------------------

    /// Runs after the tree swap: refs attach against what is now current.
    fn commit_layout_effects(&mut self, fiber: FiberId) {
        if self.fibers[fiber].subtree_flags.intersects(Flags::LAYOUT_MASK) {
            let mut cursor = self.fibers[fiber].child;
            while let Some(child) = cursor {
                cursor = self.fibers[child].sibling;
                self.commit_layout_effects(child);
            }
        }
        if self.fibers[fiber].flags.contains(Flags::REF_ATTACH) {
            self.attach_ref(fiber);
            self.fibers[fiber].flags.clear(Flags::REF_ATTACH);
        }
    }

    fn attach_ref(&mut self, fiber: FiberId) {
        let Some(node_ref) = self.fibers[fiber].node_ref.clone() else {
            return;
        };
        // A replaced ref slot loses its handle.
        if let Some(current) = self.fibers[fiber].alternate {
            if let Some(old) = &self.fibers[current].node_ref {
                if *old != node_ref {
                    old.detach();
                }
            }
        }
        match &self.fibers[fiber].state_node {
            StateNode::Instance(instance) => node_ref.attach(Rc::new(instance.clone())),
            StateNode::Text(text) => node_ref.attach(Rc::new(text.clone())),
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Passive flush
    // -----------------------------------------------------------------------

    /// Run queued passive effects: every pending cleanup across the batch
    /// first (unmounts, then updated effects), then every create. New
    /// cleanups are captured for the next round.
    pub(crate) fn flush_passive_effects(&mut self, root: RootId) -> Result<()> {
        if self.is_flushing_passive {
            return Ok(());
        }
        self.is_flushing_passive = true;

        let pending = std::mem::take(&mut self.roots[root].pending_passive);
        self.roots[root].passive_scheduled = false;

        for effect in &pending.unmount {
            let cleanup = effect.destroy.borrow_mut().take();
            if let Some(mut destroy) = cleanup {
                destroy();
            }
        }
        for &fiber in &pending.update {
            if !self.fibers.contains_key(fiber) {
                continue;
            }
            let hooks = self.fibers[fiber].hooks.clone();
            for hook in &hooks {
                if let Hook::Effect(effect) = hook {
                    if effect.tag.contains(EffectTag::HAS_EFFECT) {
                        let cleanup = effect.destroy.borrow_mut().take();
                        if let Some(mut destroy) = cleanup {
                            destroy();
                        }
                    }
                }
            }
        }
        for &fiber in &pending.update {
            if !self.fibers.contains_key(fiber) {
                continue;
            }
            let count = self.fibers[fiber].hooks.len();
            for index in 0..count {
                let firing = match &self.fibers[fiber].hooks[index] {
                    Hook::Effect(effect) if effect.tag.contains(EffectTag::HAS_EFFECT) => {
                        Some((effect.create.clone(), effect.destroy.clone()))
                    }
                    _ => None,
                };
                if let Some((create, destroy)) = firing {
                    let cleanup = create();
                    *destroy.borrow_mut() = cleanup;
                    if let Some(Hook::Effect(effect)) = self.fibers[fiber].hooks.get_mut(index) {
                        effect.tag = effect.tag.clear(EffectTag::HAS_EFFECT);
                    }
                }
            }
        }

        self.is_flushing_passive = false;
        // Effects may have dispatched state updates.
        self.drain_dispatches();
        self.flush_sync_callbacks()
    }
}
