//! A headless harness wiring an engine to a memory host and manual clock.

use std::time::Duration;

use crate::element::Element;
use crate::engine::Engine;
use crate::error::Result;
use crate::fiber::RootId;
use crate::scheduler::{ManualClock, Priority, SchedulerConfig};
use crate::testing::memory::{HostOp, MemoryHost};

/// Drives one root deterministically: time moves only through
/// [`Harness::advance`], and every host mutation lands in an inspectable
/// log.
pub struct Harness {
    engine: Engine<MemoryHost>,
    clock: ManualClock,
    root: RootId,
    container: usize,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let clock = ManualClock::new();
        let mut host = MemoryHost::new();
        let container = host.new_container();
        let mut engine = Engine::with_clock(host, Box::new(clock.clone()), config);
        let root = engine.create_root(container);
        Self {
            engine,
            clock,
            root,
            container,
        }
    }

    /// A harness whose concurrent driver yields after every unit of work.
    pub fn with_zero_budget() -> Self {
        Self::with_config(SchedulerConfig::default().with_frame_budget(Duration::ZERO))
    }

    pub fn engine(&mut self) -> &mut Engine<MemoryHost> {
        &mut self.engine
    }

    pub fn root(&self) -> RootId {
        self.root
    }

    /// Render an element into the root at the ambient (sync) priority.
    pub fn render(&mut self, element: Element) -> Result<()> {
        self.engine.update_root(self.root, Some(element))
    }

    /// Render at a specific priority without flushing synchronously.
    pub fn render_at(&mut self, priority: Priority, element: Element) -> Result<()> {
        let root = self.root;
        let mut outcome = Ok(());
        self.engine.run_with_priority(priority, |engine| {
            outcome = engine.update_root(root, Some(element));
        })?;
        outcome
    }

    pub fn unmount(&mut self) -> Result<()> {
        self.engine.update_root(self.root, None)
    }

    /// Move the manual clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Run one driver slice. Returns whether runnable work remains.
    pub fn flush(&mut self) -> Result<bool> {
        self.engine.flush_scheduled()
    }

    /// Drive until nothing runnable remains.
    pub fn run_until_idle(&mut self) -> Result<()> {
        self.engine.flush_until_idle()
    }

    pub fn ops(&self) -> &[HostOp] {
        self.engine.host().ops()
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        self.engine.host_mut().take_ops()
    }

    /// The mounted tree as indented text.
    pub fn tree(&self) -> String {
        self.engine.host().render_to_string(self.container)
    }

    /// Render synchronously and return the resulting tree text. Consumes
    /// the harness; handy for computing an expected result.
    pub fn sync_render(mut self, element: Element) -> String {
        self.render(element).expect("sync render failed");
        self.tree()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
