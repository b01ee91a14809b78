//! Begin phase: render one fiber and reconcile its children.

use crate::element::Props;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::fiber::{FiberId, FiberProps, WorkTag};
use crate::hooks::Hooks;
use crate::host::HostBackend;
use crate::reconcile::{reconcile_children, Children};
use crate::update::ConsumedUpdates;

impl<H: HostBackend> Engine<H> {
    /// Run one fiber: begin it, and if it produced no child to descend
    /// into, complete upward. Returns the next unit, or `None` when the
    /// pass is done.
    pub(crate) fn perform_unit_of_work(&mut self, unit: FiberId) -> Result<Option<FiberId>> {
        let next = self.begin_work(unit)?;
        self.fibers[unit].memoized_props = self.fibers[unit].pending_props.clone();
        match next {
            Some(child) => Ok(Some(child)),
            None => self.complete_unit_of_work(unit),
        }
    }

    /// Compute the fiber's proposed children and diff them against the
    /// committed ones. Returns the first work-in-progress child.
    fn begin_work(&mut self, wip: FiberId) -> Result<Option<FiberId>> {
        let tag = self.fibers[wip].tag;
        // The child pointer still refers to the committed children here;
        // reconciliation replaces it.
        let current_first_child = self.fibers[wip].child;
        let track = self.fibers[wip].alternate.is_some();

        let children = match tag {
            WorkTag::Root => {
                let queue = self.fibers[wip]
                    .update_queue
                    .clone()
                    .ok_or(EngineError::MissingUpdateQueue)?;
                let base = self.fibers[wip].memoized_element.clone();
                let (next, consumed) = queue.borrow_mut().process(&base, self.wip_lane);
                if !consumed.is_empty() {
                    self.consumed.push(ConsumedUpdates::Root { queue, consumed });
                }
                self.fibers[wip].memoized_element = next.clone();
                match next {
                    Some(element) => Children::Single(element),
                    None => Children::None,
                }
            }
            WorkTag::HostElement => {
                let FiberProps::Host { children, .. } = &self.fibers[wip].pending_props else {
                    return Err(EngineError::MalformedFiber);
                };
                Children::Many(children.clone())
            }
            WorkTag::HostText => return Ok(None),
            WorkTag::FunctionComponent => Children::Single(self.render_component(wip)?),
            WorkTag::Fragment => {
                let FiberProps::Fragment(children) = &self.fibers[wip].pending_props else {
                    return Err(EngineError::MalformedFiber);
                };
                Children::Many(children.clone())
            }
        };

        Ok(reconcile_children(
            &mut self.fibers,
            wip,
            current_first_child,
            children,
            track,
        ))
    }

    /// Call the component body with a hook cursor over the fiber's cells.
    fn render_component(&mut self, wip: FiberId) -> Result<crate::element::Element> {
        let mounting = self.fibers[wip].alternate.is_none();
        let component = match &self.fibers[wip].element_type {
            crate::fiber::ElementType::Component(f) => f.clone(),
            _ => return Err(EngineError::MalformedFiber),
        };
        let props = match &self.fibers[wip].pending_props {
            FiberProps::Component(p) => p.clone(),
            _ => Props::new(),
        };

        let mut hooks = std::mem::take(&mut self.fibers[wip].hooks);
        let mut ctx = Hooks::new(
            &mut hooks,
            mounting,
            wip,
            self.wip_lane,
            self.inbox.clone(),
            &mut self.consumed,
        );
        let element = component.render(&mut ctx, &props);
        let flags = ctx.collected_flags();
        drop(ctx);
        self.fibers[wip].hooks = hooks;
        self.fibers[wip].flags |= flags;
        Ok(element)
    }
}
