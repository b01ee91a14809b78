//! Integration tests for weft.
//!
//! These drive the engine through the public API over the in-memory host,
//! verifying mount/update/unmount behavior, hook state, effect ordering,
//! and the concurrent drivers.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use weft::deps;
use weft::hooks::{EffectCleanup, Hooks, Setter};
use weft::testing::{Harness, HostOp};
use weft::{Element, Priority, Props};

fn count_ops(ops: &[HostOp], pred: impl Fn(&HostOp) -> bool) -> usize {
    ops.iter().filter(|op| pred(op)).count()
}

// ---------------------------------------------------------------------------
// Mount and update
// ---------------------------------------------------------------------------

#[test]
fn mount_assembles_off_tree_and_attaches_once() {
    let mut h = Harness::new();
    h.render(
        Element::host("panel")
            .attr("title", "Files")
            .child(Element::text("hello")),
    )
    .unwrap();

    let ops = h.ops();
    assert_eq!(
        count_ops(ops, |op| matches!(op, HostOp::CreateInstance { .. })),
        1
    );
    assert_eq!(
        count_ops(ops, |op| matches!(op, HostOp::CreateTextInstance { .. })),
        1
    );
    assert_eq!(count_ops(ops, |op| *op == HostOp::AppendInitialChild), 1);
    assert_eq!(count_ops(ops, |op| *op == HostOp::AppendChildToContainer), 1);
    assert_eq!(count_ops(ops, |op| *op == HostOp::InsertChildBefore), 0);

    assert_eq!(h.tree(), "<panel title=\"Files\">\n  \"hello\"\n");
}

#[test]
fn text_update_commits_one_mutation() {
    let mut h = Harness::new();
    let view = |text: &str| Element::host("panel").child(Element::text(text));
    h.render(view("a")).unwrap();
    h.take_ops();

    h.render(view("b")).unwrap();
    let ops = h.take_ops();
    assert_eq!(ops, vec![HostOp::CommitTextUpdate { text: "b".into() }]);
    assert_eq!(h.tree(), "<panel>\n  \"b\"\n");
}

#[test]
fn unchanged_props_commit_nothing() {
    let mut h = Harness::new();
    let view = || Element::host("panel").attr("x", "1").child(Element::text("t"));
    h.render(view()).unwrap();
    h.take_ops();

    h.render(view()).unwrap();
    assert_eq!(h.take_ops(), vec![]);
}

#[test]
fn changed_props_commit_instance_update() {
    let mut h = Harness::new();
    h.render(Element::host("panel").attr("title", "a")).unwrap();
    h.take_ops();

    h.render(Element::host("panel").attr("title", "b")).unwrap();
    let ops = h.take_ops();
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CommitInstanceUpdate { .. })),
        1
    );
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. })),
        0
    );
}

#[test]
fn type_change_replaces_node() {
    let mut h = Harness::new();
    h.render(Element::host("panel")).unwrap();
    h.take_ops();

    h.render(Element::host("list")).unwrap();
    let ops = h.take_ops();
    assert_eq!(count_ops(&ops, |op| *op == HostOp::RemoveChild), 1);
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { kind } if kind == "list")),
        1
    );
    assert_eq!(h.tree(), "<list>\n");
}

#[test]
fn unmount_clears_container() {
    let mut h = Harness::new();
    h.render(Element::host("panel").child(Element::text("x"))).unwrap();
    h.take_ops();

    h.unmount().unwrap();
    let ops = h.take_ops();
    assert_eq!(count_ops(&ops, |op| *op == HostOp::RemoveChild), 1);
    assert_eq!(h.tree(), "");
}

#[test]
fn update_against_unknown_root_errors() {
    let mut engine = weft::Engine::new(weft::testing::MemoryHost::new());
    let err = engine
        .update_root(weft::RootId::default(), Some(Element::text("x")))
        .unwrap_err();
    assert!(matches!(err, weft::EngineError::RootNotFound));
}

// ---------------------------------------------------------------------------
// Keyed reordering
// ---------------------------------------------------------------------------

#[test]
fn keyed_reorder_moves_one_node() {
    let mut h = Harness::new();
    let row = |key: &str| Element::host("row").key(key).child(Element::text(key));
    h.render(Element::host("list").children([row("a"), row("b"), row("c")]))
        .unwrap();
    h.take_ops();

    // a b c -> b c a: reuse everything, move only `a`.
    h.render(Element::host("list").children([row("b"), row("c"), row("a")]))
        .unwrap();
    let ops = h.take_ops();
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. })),
        0
    );
    assert_eq!(count_ops(&ops, |op| *op == HostOp::RemoveChild), 0);
    // `a` has no stable host sibling after it, so the move is an append.
    assert_eq!(
        count_ops(&ops, |op| *op == HostOp::AppendChild || *op == HostOp::InsertChildBefore),
        1
    );
    assert_eq!(h.tree(), "<list>\n  <row>\n    \"b\"\n  <row>\n    \"c\"\n  <row>\n    \"a\"\n");
}

#[test]
fn keyed_removal_removes_exactly_one() {
    let mut h = Harness::new();
    let row = |key: &str| Element::host("row").key(key);
    h.render(Element::host("list").children([row("a"), row("b"), row("c")]))
        .unwrap();
    h.take_ops();

    h.render(Element::host("list").children([row("a"), row("c")]))
        .unwrap();
    let ops = h.take_ops();
    assert_eq!(count_ops(&ops, |op| *op == HostOp::RemoveChild), 1);
    assert_eq!(
        count_ops(&ops, |op| matches!(op, HostOp::CreateInstance { .. })),
        0
    );
}

#[test]
fn insert_in_middle_uses_anchor() {
    let mut h = Harness::new();
    let row = |key: &str| Element::host("row").key(key);
    h.render(Element::host("list").children([row("a"), row("c")]))
        .unwrap();
    h.take_ops();

    h.render(Element::host("list").children([row("a"), row("b"), row("c")]))
        .unwrap();
    let ops = h.take_ops();
    assert_eq!(count_ops(&ops, |op| *op == HostOp::InsertChildBefore), 1);
    assert_eq!(h.tree(), "<list>\n  <row>\n  <row>\n  <row>\n");
}

// ---------------------------------------------------------------------------
// Hook state
// ---------------------------------------------------------------------------

thread_local! {
    static COUNTER_SETTER: RefCell<Option<Setter<i32>>> = const { RefCell::new(None) };
    static RENDER_COUNT: RefCell<usize> = const { RefCell::new(0) };
}

fn counter(hooks: &mut Hooks<'_>, _props: &Props) -> Element {
    RENDER_COUNT.with(|c| *c.borrow_mut() += 1);
    let (count, set) = hooks.use_state(|| 0i32);
    COUNTER_SETTER.with(|slot| *slot.borrow_mut() = Some(set));
    Element::host("label").child(Element::text(count.to_string()))
}

fn take_setter() -> Setter<i32> {
    COUNTER_SETTER.with(|slot| slot.borrow().clone().expect("component rendered"))
}

#[test]
fn state_persists_and_transitions_fold_in_order() {
    RENDER_COUNT.with(|c| *c.borrow_mut() = 0);
    let mut h = Harness::new();
    h.render(Element::component(counter)).unwrap();
    assert_eq!(h.tree(), "<label>\n  \"0\"\n");

    let set = take_setter();
    set.set(100);
    set.update(|n| n + 1);
    set.update(|n| n + 1);
    set.update(|n| n + 1);
    h.engine().flush_updates().unwrap();

    assert_eq!(h.tree(), "<label>\n  \"103\"\n");
}

#[test]
fn dispatches_in_one_batch_render_once() {
    RENDER_COUNT.with(|c| *c.borrow_mut() = 0);
    let mut h = Harness::new();
    h.render(Element::component(counter)).unwrap();
    let renders_after_mount = RENDER_COUNT.with(|c| *c.borrow());

    let set = take_setter();
    h.engine()
        .run_with_priority(Priority::Normal, |_| {
            set.update(|n| n + 1);
            set.update(|n| n + 1);
        })
        .unwrap();
    h.run_until_idle().unwrap();

    let renders = RENDER_COUNT.with(|c| *c.borrow());
    assert_eq!(renders, renders_after_mount + 1);
    assert_eq!(h.tree(), "<label>\n  \"2\"\n");
}

#[test]
fn stale_setter_after_unmount_is_dropped() {
    let mut h = Harness::new();
    h.render(Element::component(counter)).unwrap();
    let set = take_setter();

    h.unmount().unwrap();
    set.set(42);
    h.engine().flush_updates().unwrap();
    assert_eq!(h.tree(), "");
}

#[test]
fn state_survives_parent_rerenders() {
    let mut h = Harness::new();
    let view = |title: &str| {
        Element::host("panel")
            .attr("title", title)
            .child(Element::component(counter))
    };
    h.render(view("one")).unwrap();
    take_setter().set(7);
    h.engine().flush_updates().unwrap();

    h.render(view("two")).unwrap();
    assert_eq!(
        h.tree(),
        "<panel title=\"two\">\n  <label>\n    \"7\"\n"
    );
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

type EffectLog = Rc<RefCell<Vec<String>>>;

/// A component whose effect re-fires when its `tag` prop changes and logs
/// create/destroy with the tag value.
fn logging_component(log: EffectLog) -> Rc<dyn Fn(&mut Hooks<'_>, &Props) -> Element> {
    Rc::new(move |hooks, props| {
        let tag = props.get("tag").unwrap_or("").to_owned();
        let log = log.clone();
        hooks.use_effect(deps![tag.clone()], move || {
            log.borrow_mut().push(format!("create {tag}"));
            let log = log.clone();
            let tag = tag.clone();
            Some(Box::new(move || log.borrow_mut().push(format!("destroy {tag}"))) as EffectCleanup)
        });
        Element::text("x")
    })
}

#[test]
fn mount_effect_fires_after_commit_not_during() {
    let log: EffectLog = Rc::new(RefCell::new(Vec::new()));
    let comp = logging_component(log.clone());

    let mut h = Harness::new();
    h.render(Element::component_shared(comp).attr("tag", "a")).unwrap();
    // Commit happened synchronously; the passive flush is deferred.
    assert_eq!(h.tree(), "\"x\"\n");
    assert!(log.borrow().is_empty());

    h.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["create a".to_string()]);
}

#[test]
fn effect_destroy_runs_before_next_create() {
    let log: EffectLog = Rc::new(RefCell::new(Vec::new()));
    let comp = logging_component(log.clone());

    let mut h = Harness::new();
    h.render(Element::component_shared(comp.clone()).attr("tag", "a")).unwrap();
    h.run_until_idle().unwrap();
    log.borrow_mut().clear();

    h.render(Element::component_shared(comp).attr("tag", "b")).unwrap();
    h.run_until_idle().unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["destroy a".to_string(), "create b".to_string()]
    );
}

#[test]
fn unchanged_deps_do_not_refire() {
    let log: EffectLog = Rc::new(RefCell::new(Vec::new()));
    let comp = logging_component(log.clone());

    let mut h = Harness::new();
    h.render(Element::component_shared(comp.clone()).attr("tag", "a")).unwrap();
    h.run_until_idle().unwrap();

    h.render(Element::component_shared(comp).attr("tag", "a")).unwrap();
    h.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["create a".to_string()]);
}

#[test]
fn destroys_across_batch_precede_creates() {
    let log: EffectLog = Rc::new(RefCell::new(Vec::new()));
    let first = logging_component(log.clone());
    let second = logging_component(log.clone());

    let view = |first: &Rc<dyn Fn(&mut Hooks<'_>, &Props) -> Element>,
                second: &Rc<dyn Fn(&mut Hooks<'_>, &Props) -> Element>,
                tag: &str| {
        Element::host("panel").children([
            Element::component_shared(first.clone())
                .key("one")
                .attr("tag", format!("one-{tag}")),
            Element::component_shared(second.clone())
                .key("two")
                .attr("tag", format!("two-{tag}")),
        ])
    };

    let mut h = Harness::new();
    h.render(view(&first, &second, "x")).unwrap();
    h.run_until_idle().unwrap();
    log.borrow_mut().clear();

    h.render(view(&first, &second, "y")).unwrap();
    h.run_until_idle().unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "destroy one-x".to_string(),
            "destroy two-x".to_string(),
            "create one-y".to_string(),
            "create two-y".to_string(),
        ]
    );
}

#[test]
fn unmount_runs_cleanup_exactly_once() {
    let log: EffectLog = Rc::new(RefCell::new(Vec::new()));
    let comp = logging_component(log.clone());

    let mut h = Harness::new();
    // Nested non-host wrappers above the effect owner.
    h.render(Element::host("panel").child(Element::fragment([
        Element::component_shared(comp).attr("tag", "a"),
    ])))
    .unwrap();
    h.run_until_idle().unwrap();
    log.borrow_mut().clear();
    h.take_ops();

    h.render(Element::host("panel")).unwrap();
    h.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["destroy a".to_string()]);
    assert_eq!(
        count_ops(&h.take_ops(), |op| *op == HostOp::RemoveChild),
        1,
        "one host removal for the whole deleted subtree"
    );
}

// ---------------------------------------------------------------------------
// Refs
// ---------------------------------------------------------------------------

#[test]
fn ref_attaches_after_commit_and_detaches_on_unmount() {
    let mut h = Harness::new();
    let slot = weft::ElementRef::new();
    h.render(Element::host("panel").node_ref(slot.clone())).unwrap();
    assert!(slot.is_attached());
    assert!(slot.get::<usize>().is_some());

    h.unmount().unwrap();
    assert!(!slot.is_attached());
}

// ---------------------------------------------------------------------------
// Concurrent rendering
// ---------------------------------------------------------------------------

fn wide_tree(text: &str) -> Element {
    Element::host("list").children([
        Element::host("row").key("a").child(Element::text(text)),
        Element::host("row").key("b").child(Element::text("two")),
        Element::host("row").key("c").child(Element::text("three")),
    ])
}

#[test]
fn interrupted_render_commits_nothing_until_complete() {
    let mut h = Harness::with_zero_budget();
    h.render_at(Priority::Normal, wide_tree("one")).unwrap();

    // One unit per slice; the pass cannot finish in a single flush.
    let more = h.flush().unwrap();
    assert!(more);
    assert_eq!(h.tree(), "", "partial work must stay invisible");

    h.run_until_idle().unwrap();
    assert_eq!(h.tree(), Harness::new().sync_render(wide_tree("one")));
}

#[test]
fn sync_update_preempts_in_flight_pass() {
    let mut h = Harness::with_zero_budget();
    h.render_at(Priority::Normal, wide_tree("slow")).unwrap();
    h.flush().unwrap();
    assert_eq!(h.tree(), "");

    // A sync render lands immediately, discarding the in-flight pass.
    h.render(Element::host("banner").child(Element::text("urgent"))).unwrap();
    assert_eq!(h.tree(), "<banner>\n  \"urgent\"\n");

    // The deferred update is still pending and lands afterwards.
    h.run_until_idle().unwrap();
    assert_eq!(h.tree(), Harness::new().sync_render(wide_tree("slow")));
}

#[test]
fn expired_task_runs_without_yielding() {
    let mut h = Harness::with_zero_budget();
    h.render_at(Priority::Normal, wide_tree("late")).unwrap();

    // Push past the normal timeout so the task arrives expired.
    h.advance(Duration::from_secs(6));
    let more = h.flush().unwrap();
    assert!(!more);
    assert_eq!(h.tree(), Harness::new().sync_render(wide_tree("late")));
}

#[test]
fn concurrent_state_update_batches_and_lands() {
    RENDER_COUNT.with(|c| *c.borrow_mut() = 0);
    let mut h = Harness::new();
    h.render(Element::component(counter)).unwrap();
    let set = take_setter();

    h.engine()
        .run_with_priority(Priority::Normal, |_| {
            set.update(|n| n + 5);
        })
        .unwrap();
    assert_eq!(h.tree(), "<label>\n  \"0\"\n", "normal lane is deferred");

    h.run_until_idle().unwrap();
    assert_eq!(h.tree(), "<label>\n  \"5\"\n");
}
