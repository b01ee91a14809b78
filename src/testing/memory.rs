//! An in-memory host backend that records every operation.

use crate::element::Props;
use crate::host::{HostBackend, HostChild, HostParent};

/// A child handle in the memory host: node ids into its arena.
pub type MemoryChild = HostChild<usize, usize>;
type MemoryParent = HostParent<usize, usize>;

/// One recorded backend call, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateInstance { kind: String },
    CreateTextInstance { text: String },
    AppendInitialChild,
    AppendChildToContainer,
    AppendChild,
    InsertChildBefore,
    CommitInstanceUpdate { id: usize },
    CommitTextUpdate { text: String },
    RemoveChild,
}

#[derive(Debug, Default)]
struct Node {
    /// `None` for text nodes.
    kind: Option<String>,
    props: Props,
    text: String,
    children: Vec<MemoryChild>,
}

/// A widget system made of vectors. Instances and containers are indices;
/// every mutation is appended to an operation log for assertions.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<Node>,
    containers: Vec<Vec<MemoryChild>>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty root container.
    pub fn new_container(&mut self) -> usize {
        self.containers.push(Vec::new());
        self.containers.len() - 1
    }

    /// Every recorded operation so far.
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Take and clear the operation log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Children attached to a container.
    pub fn container_children(&self, container: usize) -> &[MemoryChild] {
        &self.containers[container]
    }

    pub fn kind_of(&self, id: usize) -> Option<&str> {
        self.nodes[id].kind.as_deref()
    }

    pub fn text_of(&self, id: usize) -> &str {
        &self.nodes[id].text
    }

    pub fn props_of(&self, id: usize) -> &Props {
        &self.nodes[id].props
    }

    /// The mounted tree under a container as indented text, one node per
    /// line. Text nodes render quoted.
    pub fn render_to_string(&self, container: usize) -> String {
        let mut out = String::new();
        for child in &self.containers[container] {
            self.format_child(child, 0, &mut out);
        }
        out
    }

    fn format_child(&self, child: &MemoryChild, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        match child {
            HostChild::Text(id) => {
                out.push_str(&pad);
                out.push('"');
                out.push_str(&self.nodes[*id].text);
                out.push_str("\"\n");
            }
            HostChild::Element(id) => {
                let node = &self.nodes[*id];
                out.push_str(&pad);
                out.push('<');
                out.push_str(node.kind.as_deref().unwrap_or("?"));
                for (name, value) in node.props.iter() {
                    out.push_str(&format!(" {name}={value:?}"));
                }
                out.push_str(">\n");
                for grandchild in &node.children {
                    self.format_child(grandchild, depth + 1, out);
                }
            }
        }
    }

    fn child_list(&mut self, parent: &MemoryParent) -> &mut Vec<MemoryChild> {
        match parent {
            HostParent::Element(id) => &mut self.nodes[*id].children,
            HostParent::Container(id) => &mut self.containers[*id],
        }
    }
}

impl HostBackend for MemoryHost {
    type Container = usize;
    type Instance = usize;
    type TextInstance = usize;

    fn create_instance(&mut self, kind: &str, props: &Props) -> usize {
        self.ops.push(HostOp::CreateInstance { kind: kind.to_owned() });
        self.nodes.push(Node {
            kind: Some(kind.to_owned()),
            props: props.clone(),
            ..Node::default()
        });
        self.nodes.len() - 1
    }

    fn create_text_instance(&mut self, content: &str) -> usize {
        self.ops.push(HostOp::CreateTextInstance { text: content.to_owned() });
        self.nodes.push(Node {
            text: content.to_owned(),
            ..Node::default()
        });
        self.nodes.len() - 1
    }

    fn append_initial_child(&mut self, parent: &usize, child: &MemoryChild) {
        self.ops.push(HostOp::AppendInitialChild);
        self.nodes[*parent].children.push(child.clone());
    }

    fn append_child_to_container(&mut self, container: &usize, child: &MemoryChild) {
        self.ops.push(HostOp::AppendChildToContainer);
        let list = &mut self.containers[*container];
        list.retain(|c| c != child);
        list.push(child.clone());
    }

    fn insert_child_before(
        &mut self,
        parent: &MemoryParent,
        child: &MemoryChild,
        before: &MemoryChild,
    ) {
        self.ops.push(HostOp::InsertChildBefore);
        let list = self.child_list(parent);
        list.retain(|c| c != child);
        let at = list.iter().position(|c| c == before).unwrap_or(list.len());
        list.insert(at, child.clone());
    }

    fn append_child(&mut self, parent: &MemoryParent, child: &MemoryChild) {
        self.ops.push(HostOp::AppendChild);
        let list = self.child_list(parent);
        list.retain(|c| c != child);
        list.push(child.clone());
    }

    fn commit_instance_update(&mut self, instance: &usize, props: &Props) {
        self.ops.push(HostOp::CommitInstanceUpdate { id: *instance });
        self.nodes[*instance].props = props.clone();
    }

    fn commit_text_update(&mut self, text: &usize, content: &str) {
        self.ops.push(HostOp::CommitTextUpdate { text: content.to_owned() });
        self.nodes[*text].text = content.to_owned();
    }

    fn remove_child(&mut self, parent: &MemoryParent, child: &MemoryChild) {
        self.ops.push(HostOp::RemoveChild);
        self.child_list(parent).retain(|c| c != child);
    }
}
