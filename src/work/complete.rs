//! Complete phase: materialize host state bottom-up and bubble flags.

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::fiber::{ElementType, FiberId, FiberProps, Flags, StateNode, WorkTag};
use crate::host::{ChildOf, HostBackend};

impl<H: HostBackend> Engine<H> {
    /// Complete `unit`, then walk up completing ancestors until a sibling
    /// offers new begin work. `None` ends the pass.
    pub(crate) fn complete_unit_of_work(&mut self, unit: FiberId) -> Result<Option<FiberId>> {
        let mut node = unit;
        loop {
            self.complete_work(node)?;
            if let Some(sibling) = self.fibers[node].sibling {
                return Ok(Some(sibling));
            }
            match self.fibers[node].parent {
                Some(parent) => node = parent,
                None => return Ok(None),
            }
        }
    }

    fn complete_work(&mut self, wip: FiberId) -> Result<()> {
        match self.fibers[wip].tag {
            WorkTag::HostElement => self.complete_host_element(wip)?,
            WorkTag::HostText => self.complete_host_text(wip)?,
            WorkTag::Root | WorkTag::FunctionComponent | WorkTag::Fragment => {}
        }
        self.mark_ref(wip);
        self.bubble_properties(wip);
        Ok(())
    }

    /// Mount: create the instance off-tree and hang the already-completed
    /// host children under it. Update: diff committed props against the new
    /// ones and flag when they differ.
    fn complete_host_element(&mut self, wip: FiberId) -> Result<()> {
        let alternate = self.fibers[wip].alternate;
        let mounted = matches!(self.fibers[wip].state_node, StateNode::Instance(_));

        if let (Some(current), true) = (alternate, mounted) {
            let FiberProps::Host { props: new_props, .. } = &self.fibers[wip].memoized_props else {
                return Err(EngineError::MalformedFiber);
            };
            let old_props = match &self.fibers[current].memoized_props {
                FiberProps::Host { props, .. } => props,
                _ => return Err(EngineError::MalformedFiber),
            };
            if old_props != new_props {
                self.fibers[wip].flags |= Flags::UPDATE;
            }
            return Ok(());
        }

        let (kind, props) = match (&self.fibers[wip].element_type, &self.fibers[wip].memoized_props)
        {
            (ElementType::Host(kind), FiberProps::Host { props, .. }) => {
                (kind.clone(), props.clone())
            }
            _ => return Err(EngineError::MalformedFiber),
        };
        let instance = self.host.create_instance(&kind, &props);
        self.append_all_children(&instance, wip)?;
        self.fibers[wip].state_node = StateNode::Instance(instance);
        Ok(())
    }

    fn complete_host_text(&mut self, wip: FiberId) -> Result<()> {
        let alternate = self.fibers[wip].alternate;
        let mounted = matches!(self.fibers[wip].state_node, StateNode::Text(_));

        let FiberProps::Text(new_text) = &self.fibers[wip].memoized_props else {
            return Err(EngineError::MalformedFiber);
        };

        if let (Some(current), true) = (alternate, mounted) {
            let old_text = match &self.fibers[current].memoized_props {
                FiberProps::Text(text) => text,
                _ => return Err(EngineError::MalformedFiber),
            };
            if old_text != new_text {
                self.fibers[wip].flags |= Flags::UPDATE;
            }
            return Ok(());
        }

        let instance = self.host.create_text_instance(new_text);
        self.fibers[wip].state_node = StateNode::Text(instance);
        Ok(())
    }

    /// Attach the nearest host descendants of `wip` to a freshly created,
    /// still-detached instance. Does not descend past host nodes.
    fn append_all_children(&mut self, parent: &H::Instance, wip: FiberId) -> Result<()> {
        let Some(first) = self.fibers[wip].child else {
            return Ok(());
        };
        let mut node = first;
        loop {
            match self.fibers[node].tag {
                WorkTag::HostElement | WorkTag::HostText => {
                    let handle = self.host_handle(node)?;
                    self.host.append_initial_child(parent, &handle);
                }
                _ => {
                    if let Some(child) = self.fibers[node].child {
                        node = child;
                        continue;
                    }
                }
            }
            // Next sibling, or climb back toward `wip`.
            loop {
                if node == wip {
                    return Ok(());
                }
                if let Some(sibling) = self.fibers[node].sibling {
                    node = sibling;
                    break;
                }
                match self.fibers[node].parent {
                    Some(parent) if parent != wip => node = parent,
                    _ => return Ok(()),
                }
            }
        }
    }

    /// The host handle a completed host fiber carries.
    pub(crate) fn host_handle(&self, fiber: FiberId) -> Result<ChildOf<H>> {
        match &self.fibers[fiber].state_node {
            StateNode::Instance(i) => Ok(ChildOf::<H>::Element(i.clone())),
            StateNode::Text(t) => Ok(ChildOf::<H>::Text(t.clone())),
            _ => Err(EngineError::MalformedFiber),
        }
    }

    /// Flag ref work when a host node gains a ref or its ref identity
    /// changed.
    fn mark_ref(&mut self, wip: FiberId) {
        let Some(node_ref) = self.fibers[wip].node_ref.clone() else {
            return;
        };
        let changed = match self.fibers[wip].alternate {
            None => true,
            Some(current) => self.fibers[current].node_ref.as_ref() != Some(&node_ref),
        };
        if changed {
            self.fibers[wip].flags |= Flags::REF_ATTACH;
        }
    }

    /// Merge child flags into this node's subtree flags and repair return
    /// links.
    fn bubble_properties(&mut self, wip: FiberId) {
        let mut subtree = Flags::NONE;
        let mut cursor = self.fibers[wip].child;
        while let Some(child) = cursor {
            subtree |= self.fibers[child].flags | self.fibers[child].subtree_flags;
            self.fibers[child].parent = Some(wip);
            cursor = self.fibers[child].sibling;
        }
        self.fibers[wip].subtree_flags |= subtree;
    }
}
