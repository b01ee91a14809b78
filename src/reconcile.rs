//! Child reconciliation: diff proposed elements against committed fibers.
//!
//! Produces the work-in-progress child list of one parent. Identity is
//! `(key, type)`: a match reuses the committed fiber (cloned into the other
//! buffer), a miss deletes and recreates. Effect flags are only recorded
//! when the parent has a committed counterpart; during a fresh mount the
//! whole subtree becomes visible through its topmost placement.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::element::Element;
use crate::fiber::{create_work_in_progress, Fiber, FiberId, FiberProps, Flags, WorkTag};
use crate::host::HostBackend;

/// Proposed children of one fiber for this render.
#[derive(Debug, Clone)]
pub(crate) enum Children {
    None,
    Single(Element),
    Many(Vec<Element>),
}

/// Diff `children` against the committed child list and install the result
/// as `wip`'s children. Returns the first work-in-progress child.
pub(crate) fn reconcile_children<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    wip: FiberId,
    current_first_child: Option<FiberId>,
    children: Children,
    track: bool,
) -> Option<FiberId> {
    let first = match children {
        Children::None => {
            delete_remaining(arena, wip, current_first_child, track);
            None
        }
        Children::Single(element) => match element {
            Element::Text(content) => {
                Some(reconcile_single_text(arena, wip, current_first_child, content, track))
            }
            other => Some(reconcile_single_element(arena, wip, current_first_child, other, track)),
        },
        Children::Many(elements) => {
            reconcile_array(arena, wip, current_first_child, elements, track)
        }
    };
    arena[wip].child = first;
    first
}

// ---------------------------------------------------------------------------
// Single child
// ---------------------------------------------------------------------------

/// Scan the committed children for a `(key, type)` match; reuse it and drop
/// the rest, or drop everything and mount fresh.
fn reconcile_single_element<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    wip: FiberId,
    current_first_child: Option<FiberId>,
    element: Element,
    track: bool,
) -> FiberId {
    let key = element.get_key();
    let mut cursor = current_first_child;
    while let Some(cur) = cursor {
        if arena[cur].key.as_deref() == key {
            if arena[cur].matches_element(&element) {
                let next = arena[cur].sibling;
                delete_remaining(arena, wip, next, track);
                let reused =
                    create_work_in_progress(arena, cur, FiberProps::of_element(&element));
                adopt(arena, wip, reused, 0);
                refresh_ref(arena, reused, &element);
                return reused;
            }
            // Key matched but the type changed: nothing further can match
            // this key either.
            delete_remaining(arena, wip, Some(cur), track);
            break;
        }
        delete_child(arena, wip, cur, track);
        cursor = arena[cur].sibling;
    }
    mount_fresh(arena, wip, &element, 0, track)
}

/// Text carries no key: reuse the first committed child if it is text,
/// otherwise replace everything.
fn reconcile_single_text<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    wip: FiberId,
    current_first_child: Option<FiberId>,
    content: String,
    track: bool,
) -> FiberId {
    if let Some(cur) = current_first_child {
        if arena[cur].tag == WorkTag::HostText {
            let next = arena[cur].sibling;
            delete_remaining(arena, wip, next, track);
            let reused = create_work_in_progress(arena, cur, FiberProps::Text(content));
            adopt(arena, wip, reused, 0);
            return reused;
        }
    }
    delete_remaining(arena, wip, current_first_child, track);
    mount_fresh(arena, wip, &Element::Text(content), 0, track)
}

// ---------------------------------------------------------------------------
// Keyed arrays
// ---------------------------------------------------------------------------

/// Map key for array matching: explicit key, or position for unkeyed nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Key(String),
    Index(usize),
}

/// Diff an element array against the committed child list.
///
/// Committed children are indexed by key (position for unkeyed ones); each
/// proposed element claims its match or mounts fresh. Unclaimed fibers are
/// deleted. Reused fibers whose committed positions form the longest
/// increasing subsequence stay put; every other node is flagged for
/// placement.
fn reconcile_array<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    wip: FiberId,
    current_first_child: Option<FiberId>,
    elements: Vec<Element>,
    track: bool,
) -> Option<FiberId> {
    let mut existing: HashMap<SlotKey, (usize, FiberId)> = HashMap::new();
    let mut cursor = current_first_child;
    let mut old_index = 0usize;
    while let Some(cur) = cursor {
        let slot = match &arena[cur].key {
            Some(key) => SlotKey::Key(key.clone()),
            None => SlotKey::Index(old_index),
        };
        existing.insert(slot, (old_index, cur));
        cursor = arena[cur].sibling;
        old_index += 1;
    }

    // (fiber, committed position if reused)
    let mut placed: Vec<(FiberId, Option<usize>)> = Vec::with_capacity(elements.len());
    for (new_index, element) in elements.iter().enumerate() {
        let slot = match element.get_key() {
            Some(key) => SlotKey::Key(key.to_owned()),
            None => SlotKey::Index(new_index),
        };
        match existing.get(&slot).copied() {
            Some((old_pos, old_id)) if arena[old_id].matches_element(element) => {
                existing.remove(&slot);
                let reused =
                    create_work_in_progress(arena, old_id, FiberProps::of_element(element));
                adopt(arena, wip, reused, new_index as u32);
                refresh_ref(arena, reused, element);
                placed.push((reused, Some(old_pos)));
            }
            claimed => {
                // A same-key fiber of the wrong type cannot be reused by
                // anyone else either.
                if let Some((_, old_id)) = claimed {
                    existing.remove(&slot);
                    delete_child(arena, wip, old_id, track);
                }
                let fresh = mount_fresh_detached(arena, element);
                adopt(arena, wip, fresh, new_index as u32);
                placed.push((fresh, None));
            }
        }
    }

    for (_, old_id) in existing.into_values() {
        delete_child(arena, wip, old_id, track);
    }

    if track {
        flag_moves(arena, &placed);
    }

    // Link the sibling chain.
    let mut iter = placed.iter().map(|(id, _)| *id);
    let first = iter.next();
    let mut prev = first;
    for id in iter {
        if let Some(p) = prev {
            arena[p].sibling = Some(id);
        }
        prev = Some(id);
    }
    if let Some(last) = prev {
        arena[last].sibling = None;
    }
    first
}

/// Flag placement on every node not part of the longest increasing
/// subsequence of committed positions. New mounts are always flagged.
fn flag_moves<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    placed: &[(FiberId, Option<usize>)],
) {
    let reused: Vec<(usize, FiberId)> = placed
        .iter()
        .filter_map(|(id, old)| old.map(|pos| (pos, *id)))
        .collect();
    let keep = longest_increasing(&reused.iter().map(|(pos, _)| *pos).collect::<Vec<_>>());

    for (i, (_, id)) in reused.iter().enumerate() {
        if !keep[i] {
            arena[*id].flags |= Flags::PLACEMENT;
        }
    }
    for (id, old) in placed {
        if old.is_none() {
            arena[*id].flags |= Flags::PLACEMENT;
        }
    }
}

/// Which positions of `seq` belong to a longest strictly increasing
/// subsequence.
fn longest_increasing(seq: &[usize]) -> Vec<bool> {
    let n = seq.len();
    let mut keep = vec![false; n];
    if n == 0 {
        return keep;
    }
    // tails[k] = index into seq of the smallest tail of an increasing
    // subsequence of length k+1; parent links recover the chain.
    let mut tails: Vec<usize> = Vec::with_capacity(n);
    let mut parent = vec![usize::MAX; n];
    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            parent[i] = tails[pos - 1];
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }
    let mut at = *tails.last().unwrap_or(&usize::MAX);
    while at != usize::MAX {
        keep[at] = true;
        at = parent[at];
    }
    keep
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn adopt<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    parent: FiberId,
    child: FiberId,
    index: u32,
) {
    let node = &mut arena[child];
    node.parent = Some(parent);
    node.index = index;
    node.sibling = None;
}

fn refresh_ref<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    fiber: FiberId,
    element: &Element,
) {
    if let Element::Host(h) = element {
        arena[fiber].node_ref = h.node_ref.clone();
    }
}

fn mount_fresh<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    parent: FiberId,
    element: &Element,
    index: u32,
    track: bool,
) -> FiberId {
    let id = mount_fresh_detached(arena, element);
    adopt(arena, parent, id, index);
    if track {
        arena[id].flags |= Flags::PLACEMENT;
    }
    id
}

fn mount_fresh_detached<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    element: &Element,
) -> FiberId {
    arena.insert(Fiber::of_element(element))
}

/// Record `child` (a committed fiber) for deletion under `parent`.
fn delete_child<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    parent: FiberId,
    child: FiberId,
    track: bool,
) {
    if !track {
        return;
    }
    arena[parent].deletions.push(child);
    arena[parent].flags |= Flags::CHILD_DELETION;
}

fn delete_remaining<H: HostBackend>(
    arena: &mut SlotMap<FiberId, Fiber<H>>,
    parent: FiberId,
    from: Option<FiberId>,
    track: bool,
) {
    let mut cursor = from;
    while let Some(cur) = cursor {
        delete_child(arena, parent, cur, track);
        cursor = arena[cur].sibling;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryHost;

    type Arena = SlotMap<FiberId, Fiber<MemoryHost>>;

    fn arena_with_parent() -> (Arena, FiberId) {
        let mut arena: Arena = SlotMap::with_key();
        let parent = arena.insert(Fiber::of_element(&Element::host("root")));
        (arena, parent)
    }

    /// Mount a child list without effect tracking, as a fresh subtree would.
    fn mount(arena: &mut Arena, parent: FiberId, children: Children) -> Option<FiberId> {
        reconcile_children(arena, parent, None, children, false)
    }

    fn child_kinds(arena: &Arena, first: Option<FiberId>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = first;
        while let Some(id) = cursor {
            out.push(match &arena[id].element_type {
                crate::fiber::ElementType::Host(kind) => kind.clone(),
                crate::fiber::ElementType::Text => "#text".into(),
                other => panic!("unexpected type {other:?}"),
            });
            cursor = arena[id].sibling;
        }
        out
    }

    #[test]
    fn mount_builds_sibling_chain() {
        let (mut arena, parent) = arena_with_parent();
        let first = mount(
            &mut arena,
            parent,
            Children::Many(vec![
                Element::host("a"),
                Element::host("b"),
                Element::text("t"),
            ]),
        );
        assert_eq!(child_kinds(&arena, first), ["a", "b", "#text"]);
        let first = first.unwrap();
        assert!(arena[first].flags.is_empty(), "mount records no effects");
    }

    #[test]
    fn single_reuse_keeps_fiber_and_deletes_rest() {
        let (mut arena, parent) = arena_with_parent();
        let old_first = mount(
            &mut arena,
            parent,
            Children::Many(vec![Element::host("a"), Element::host("b")]),
        )
        .unwrap();

        let new = reconcile_children(
            &mut arena,
            parent,
            Some(old_first),
            Children::Single(Element::host("a")),
            true,
        )
        .unwrap();

        assert_eq!(arena[new].alternate, Some(old_first));
        assert!(!arena[new].flags.contains(Flags::PLACEMENT));
        assert_eq!(arena[parent].deletions.len(), 1);
    }

    #[test]
    fn type_change_deletes_and_mounts_fresh() {
        let (mut arena, parent) = arena_with_parent();
        let old = mount(&mut arena, parent, Children::Single(Element::host("a"))).unwrap();

        let new = reconcile_children(
            &mut arena,
            parent,
            Some(old),
            Children::Single(Element::host("b")),
            true,
        )
        .unwrap();

        assert!(arena[new].alternate.is_none());
        assert!(arena[new].flags.contains(Flags::PLACEMENT));
        assert_eq!(arena[parent].deletions.as_slice(), &[old]);
    }

    #[test]
    fn key_scan_reuses_later_sibling() {
        let (mut arena, parent) = arena_with_parent();
        let old_first = mount(
            &mut arena,
            parent,
            Children::Many(vec![
                Element::host("a").key("x"),
                Element::host("a").key("y"),
            ]),
        )
        .unwrap();
        let old_second = arena[old_first].sibling.unwrap();

        let new = reconcile_children(
            &mut arena,
            parent,
            Some(old_first),
            Children::Single(Element::host("a").key("y")),
            true,
        )
        .unwrap();

        assert_eq!(arena[new].alternate, Some(old_second));
        // The non-matching leading sibling was deleted.
        assert_eq!(arena[parent].deletions.as_slice(), &[old_first]);
    }

    #[test]
    fn text_reuses_text() {
        let (mut arena, parent) = arena_with_parent();
        let old = mount(&mut arena, parent, Children::Single(Element::text("a"))).unwrap();

        let new = reconcile_children(
            &mut arena,
            parent,
            Some(old),
            Children::Single(Element::text("b")),
            true,
        )
        .unwrap();
        assert_eq!(arena[new].alternate, Some(old));
        assert!(matches!(&arena[new].pending_props, FiberProps::Text(t) if t == "b"));
    }

    #[test]
    fn keyed_reorder_moves_minimum() {
        let (mut arena, parent) = arena_with_parent();
        let old_first = mount(
            &mut arena,
            parent,
            Children::Many(vec![
                Element::host("li").key("a"),
                Element::host("li").key("b"),
                Element::host("li").key("c"),
            ]),
        )
        .unwrap();

        // a b c -> b c a: only `a` moves.
        let new_first = reconcile_children(
            &mut arena,
            parent,
            Some(old_first),
            Children::Many(vec![
                Element::host("li").key("b"),
                Element::host("li").key("c"),
                Element::host("li").key("a"),
            ]),
            true,
        );

        let mut flags = Vec::new();
        let mut cursor = new_first;
        while let Some(id) = cursor {
            flags.push((
                arena[id].key.clone().unwrap(),
                arena[id].flags.contains(Flags::PLACEMENT),
            ));
            cursor = arena[id].sibling;
        }
        assert_eq!(
            flags,
            [
                ("b".into(), false),
                ("c".into(), false),
                ("a".into(), true)
            ]
        );
        assert!(arena[parent].deletions.is_empty());
    }

    #[test]
    fn array_deletes_unclaimed_and_mounts_new() {
        let (mut arena, parent) = arena_with_parent();
        let old_first = mount(
            &mut arena,
            parent,
            Children::Many(vec![
                Element::host("li").key("a"),
                Element::host("li").key("b"),
            ]),
        )
        .unwrap();
        let old_b = arena[old_first].sibling.unwrap();

        let new_first = reconcile_children(
            &mut arena,
            parent,
            Some(old_first),
            Children::Many(vec![
                Element::host("li").key("a"),
                Element::host("li").key("c"),
            ]),
            true,
        )
        .unwrap();

        assert_eq!(arena[parent].deletions.as_slice(), &[old_b]);
        let new_c = arena[new_first].sibling.unwrap();
        assert!(arena[new_c].alternate.is_none());
        assert!(arena[new_c].flags.contains(Flags::PLACEMENT));
    }

    #[test]
    fn unkeyed_children_match_by_position() {
        let (mut arena, parent) = arena_with_parent();
        let old_first = mount(
            &mut arena,
            parent,
            Children::Many(vec![Element::host("a"), Element::host("b")]),
        )
        .unwrap();
        let old_second = arena[old_first].sibling.unwrap();

        let new_first = reconcile_children(
            &mut arena,
            parent,
            Some(old_first),
            Children::Many(vec![Element::host("a"), Element::host("b")]),
            true,
        )
        .unwrap();

        assert_eq!(arena[new_first].alternate, Some(old_first));
        assert_eq!(arena[arena[new_first].sibling.unwrap()].alternate, Some(old_second));
        assert!(arena[parent].deletions.is_empty());
    }

    #[test]
    fn empty_children_delete_everything() {
        let (mut arena, parent) = arena_with_parent();
        let old_first = mount(
            &mut arena,
            parent,
            Children::Many(vec![Element::host("a"), Element::host("b")]),
        );

        reconcile_children(&mut arena, parent, old_first, Children::None, true);
        assert_eq!(arena[parent].deletions.len(), 2);
        assert_eq!(arena[parent].child, None);
    }

    #[test]
    fn lis_keeps_longest_run() {
        assert_eq!(longest_increasing(&[0, 1, 2]), [true, true, true]);
        assert_eq!(longest_increasing(&[2, 0, 1]), [false, true, true]);
        assert_eq!(longest_increasing(&[1, 2, 0]), [true, true, false]);
        assert!(longest_increasing(&[]).is_empty());
    }
}
