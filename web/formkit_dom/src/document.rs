//! In-memory mirror of the DOM the host owns.
//!
//! Every mutation updates the mirror and appends a [`DomOp`] to the journal
//! that is shipped to the host. Host events update the mirror first and then
//! reach the handler registered on the target node.

use crate::protocol::{DomOp, HostEvent};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out node ids. An id is never handed out twice, so a stale id held
/// by a registry or an in-flight host event cannot name a newer node.
#[derive(Debug, Default)]
pub struct IdPool {
    next: u64,
    live: usize,
}

impl IdPool {
    pub fn acquire(&mut self) -> NodeId {
        self.next += 1;
        self.live += 1;
        NodeId(self.next)
    }

    pub fn release(&mut self, _id: NodeId) {
        self.live = self.live.saturating_sub(1);
    }

    pub fn in_use(&self) -> usize {
        self.live
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub tag: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub hidden: bool,
    pub value: String,
    pub checked: bool,
    pub open: bool,
    pub return_value: String,
}

pub type Handler = Rc<dyn Fn(&Dom, &HostEvent)>;

/// Told the ids of every node a [`Dom::remove`] took out.
pub type RemovalListener = Rc<dyn Fn(&[NodeId])>;

struct Document {
    body: NodeId,
    nodes: BTreeMap<NodeId, Node>,
    ids: IdPool,
    ops: Vec<DomOp>,
    handlers: BTreeMap<NodeId, Handler>,
    removal_listeners: Vec<RemovalListener>,
}

/// Shared handle to the mirror. Clones address the same document.
#[derive(Clone)]
pub struct Dom {
    doc: Rc<RefCell<Document>>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// A document holding only `<body>`, which the host already has.
    pub fn new() -> Self {
        let mut ids = IdPool::default();
        let body = ids.acquire();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            body,
            Node {
                tag: "body".to_string(),
                ..Node::default()
            },
        );

        Self {
            doc: Rc::new(RefCell::new(Document {
                body,
                nodes,
                ids,
                ops: Vec::new(),
                handlers: BTreeMap::new(),
                removal_listeners: Vec::new(),
            })),
        }
    }

    pub fn body(&self) -> NodeId {
        self.doc.borrow().body
    }

    pub fn create(&self, tag: &str) -> NodeId {
        let mut doc = self.doc.borrow_mut();
        let id = doc.ids.acquire();
        doc.nodes.insert(
            id,
            Node {
                tag: tag.to_string(),
                ..Node::default()
            },
        );
        doc.ops.push(DomOp::Create {
            id,
            tag: tag.to_string(),
        });
        id
    }

    /// Creates `tag` and appends it to `parent`.
    pub fn create_in(&self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create(tag);
        self.append(parent, id);
        id
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.doc.borrow().nodes.contains_key(&id)
    }

    pub fn append(&self, parent: NodeId, child: NodeId) -> bool {
        let mut doc = self.doc.borrow_mut();
        if !doc.nodes.contains_key(&parent) || !doc.nodes.contains_key(&child) {
            log::warn!("append {child} to {parent}: missing node");
            return false;
        }

        if let Some(old) = doc.nodes.get(&child).and_then(|node| node.parent) {
            if let Some(old_parent) = doc.nodes.get_mut(&old) {
                old_parent.children.retain(|id| *id != child);
            }
        }
        if let Some(node) = doc.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = doc.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        doc.ops.push(DomOp::Append { parent, child });
        true
    }

    /// Removes `id` and its subtree, frees their ids, drops their handlers
    /// and then tells the removal listeners. Returns `false` for unknown
    /// nodes and for `<body>`.
    pub fn remove(&self, id: NodeId) -> bool {
        let (removed, listeners) = {
            let mut doc = self.doc.borrow_mut();
            if id == doc.body || !doc.nodes.contains_key(&id) {
                return false;
            }

            if let Some(parent) = doc.nodes.get(&id).and_then(|node| node.parent) {
                if let Some(parent) = doc.nodes.get_mut(&parent) {
                    parent.children.retain(|child| *child != id);
                }
            }

            let mut removed = Vec::new();
            let mut stack = vec![id];
            while let Some(next) = stack.pop() {
                if let Some(node) = doc.nodes.remove(&next) {
                    stack.extend(node.children);
                    removed.push(next);
                }
                doc.handlers.remove(&next);
                doc.ids.release(next);
            }

            doc.ops.push(DomOp::Remove { id });
            (removed, doc.removal_listeners.clone())
        };

        for listener in listeners {
            listener(&removed);
        }
        true
    }

    /// Registers `listener` for every later [`Dom::remove`].
    pub fn on_removed(&self, listener: impl Fn(&[NodeId]) + 'static) {
        self.doc
            .borrow_mut()
            .removal_listeners
            .push(Rc::new(listener));
    }

    fn update(&self, id: NodeId, op: DomOp, apply: impl FnOnce(&mut Node)) -> bool {
        let mut doc = self.doc.borrow_mut();
        let Some(node) = doc.nodes.get_mut(&id) else {
            log::debug!("mutation of missing node {id} ignored");
            return false;
        };
        apply(node);
        doc.ops.push(op);
        true
    }

    pub fn set_attr(&self, id: NodeId, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let op = DomOp::SetAttr {
            id,
            name: name.to_string(),
            value: value.clone(),
        };
        self.update(id, op, |node| {
            node.attrs.insert(name.to_string(), value);
        })
    }

    pub fn remove_attr(&self, id: NodeId, name: &str) -> bool {
        let op = DomOp::RemoveAttr {
            id,
            name: name.to_string(),
        };
        self.update(id, op, |node| {
            node.attrs.remove(name);
        })
    }

    pub fn set_text(&self, id: NodeId, text: impl Into<String>) -> bool {
        let text = text.into();
        let op = DomOp::SetText {
            id,
            text: text.clone(),
        };
        self.update(id, op, |node| node.text = text)
    }

    pub fn set_hidden(&self, id: NodeId, hidden: bool) -> bool {
        self.update(id, DomOp::SetHidden { id, hidden }, |node| {
            node.hidden = hidden
        })
    }

    pub fn set_value(&self, id: NodeId, value: impl Into<String>) -> bool {
        let value = value.into();
        let op = DomOp::SetValue {
            id,
            value: value.clone(),
        };
        self.update(id, op, |node| node.value = value)
    }

    pub fn set_checked(&self, id: NodeId, checked: bool) -> bool {
        self.update(id, DomOp::SetChecked { id, checked }, |node| {
            node.checked = checked
        })
    }

    pub fn show_modal(&self, id: NodeId) -> bool {
        self.update(id, DomOp::ShowModal { id }, |node| {
            node.open = true;
            node.return_value.clear();
        })
    }

    /// Opens a `<dialog>` without blocking the rest of the page.
    pub fn show(&self, id: NodeId) -> bool {
        self.update(id, DomOp::Show { id }, |node| {
            node.open = true;
            node.return_value.clear();
        })
    }

    pub fn close(&self, id: NodeId, return_value: &str) -> bool {
        let op = DomOp::Close {
            id,
            return_value: return_value.to_string(),
        };
        self.update(id, op, |node| {
            node.open = false;
            node.return_value = return_value.to_string();
        })
    }

    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.doc.borrow().nodes.get(&id).cloned()
    }

    fn read<R>(&self, id: NodeId, read: impl FnOnce(&Node) -> R) -> Option<R> {
        self.doc.borrow().nodes.get(&id).map(read)
    }

    pub fn is_open(&self, id: NodeId) -> bool {
        self.read(id, |node| node.open).unwrap_or(false)
    }

    pub fn return_value(&self, id: NodeId) -> Option<String> {
        self.read(id, |node| node.return_value.clone())
    }

    pub fn value(&self, id: NodeId) -> Option<String> {
        self.read(id, |node| node.value.clone())
    }

    pub fn text(&self, id: NodeId) -> Option<String> {
        self.read(id, |node| node.text.clone())
    }

    pub fn checked(&self, id: NodeId) -> Option<bool> {
        self.read(id, |node| node.checked)
    }

    pub fn hidden(&self, id: NodeId) -> Option<bool> {
        self.read(id, |node| node.hidden)
    }

    pub fn tag(&self, id: NodeId) -> Option<String> {
        self.read(id, |node| node.tag.clone())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.read(id, |node| node.attrs.get(name).cloned()).flatten()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.read(id, |node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.read(id, |node| node.parent).flatten()
    }

    /// All nodes whose attribute `name` equals `value`, in id order.
    pub fn find_by_attr(&self, name: &str, value: &str) -> Vec<NodeId> {
        self.doc
            .borrow()
            .nodes
            .iter()
            .filter(|(_, node)| node.attrs.get(name).is_some_and(|found| found == value))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of `id` and all its descendants, depth first.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let doc = self.doc.borrow();
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = doc.nodes.get(&next) {
                out.push(next);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    pub fn node_count(&self) -> usize {
        self.doc.borrow().nodes.len()
    }

    pub fn handler_count(&self) -> usize {
        self.doc.borrow().handlers.len()
    }

    pub fn ids_in_use(&self) -> usize {
        self.doc.borrow().ids.in_use()
    }

    /// Registers the event handler of `id`, replacing any previous one.
    pub fn on(&self, id: NodeId, handler: impl Fn(&Dom, &HostEvent) + 'static) -> bool {
        let mut doc = self.doc.borrow_mut();
        if !doc.nodes.contains_key(&id) {
            return false;
        }
        doc.handlers.insert(id, Rc::new(handler));
        true
    }

    /// Applies a host event to the mirror, then runs the target's handler.
    /// Returns `false` when the target no longer exists.
    pub fn dispatch(&self, event: &HostEvent) -> bool {
        let id = event.target();
        let handler = {
            let mut doc = self.doc.borrow_mut();
            let Some(node) = doc.nodes.get_mut(&id) else {
                log::debug!("event for missing node {id} dropped");
                return false;
            };

            match event {
                HostEvent::Input { value, .. } => node.value = value.clone(),
                HostEvent::Toggle { checked, .. } => node.checked = *checked,
                HostEvent::Closed { return_value, .. } => {
                    node.open = false;
                    node.return_value = return_value.clone();
                }
                HostEvent::Click { .. } | HostEvent::Files { .. } | HostEvent::Pointer { .. } => {}
            }

            doc.handlers.get(&id).cloned()
        };

        if let Some(handler) = handler {
            handler(self, event);
        }
        true
    }

    pub fn take_ops(&self) -> Vec<DomOp> {
        std::mem::take(&mut self.doc.borrow_mut().ops)
    }

    pub fn has_pending_ops(&self) -> bool {
        !self.doc.borrow().ops.is_empty()
    }
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let doc = self.doc.borrow();
        f.debug_struct("Dom")
            .field("nodes", &doc.nodes.len())
            .field("handlers", &doc.handlers.len())
            .field("pending_ops", &doc.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn ids_are_never_handed_out_twice() {
        let dom = Dom::new();
        let a = dom.create_in(dom.body(), "div");
        let b = dom.create_in(a, "span");
        assert_eq!(dom.ids_in_use(), 3);

        assert!(dom.remove(a));
        assert!(!dom.exists(b));
        assert_eq!(dom.ids_in_use(), 1);
        let next = dom.create("p");
        assert!(next > a.max(b));
        assert_eq!(dom.ids_in_use(), 2);
    }

    #[test]
    fn removal_listeners_see_the_whole_subtree() {
        let dom = Dom::new();
        let a = dom.create_in(dom.body(), "div");
        let b = dom.create_in(a, "span");
        let c = dom.create_in(b, "em");
        let seen: Rc<RefCell<Vec<NodeId>>> = Rc::default();
        let sink = seen.clone();
        dom.on_removed(move |ids| sink.borrow_mut().extend_from_slice(ids));

        assert!(dom.remove(a));
        let mut seen = seen.borrow().clone();
        seen.sort();
        assert_eq!(seen, [a, b, c]);
    }

    #[test]
    fn remove_detaches_and_emits_one_op_for_the_subtree() {
        let dom = Dom::new();
        let parent = dom.create_in(dom.body(), "div");
        let child = dom.create_in(parent, "input");
        dom.on(child, |_, _| {});
        dom.take_ops();

        assert!(dom.remove(parent));
        assert_eq!(dom.take_ops(), [DomOp::Remove { id: parent }]);
        assert!(dom.children(dom.body()).is_empty());
        assert_eq!(dom.handler_count(), 0);
        assert!(!dom.remove(dom.body()));
    }

    #[test]
    fn dispatch_updates_mirror_before_handler_runs() {
        let dom = Dom::new();
        let input = dom.create_in(dom.body(), "input");
        let seen = Rc::new(RefCell::new(String::new()));
        let sink = seen.clone();
        dom.on(input, move |dom, event| {
            assert_eq!(event.target(), input);
            *sink.borrow_mut() = dom.value(input).unwrap_or_default();
        });

        assert!(dom.dispatch(&HostEvent::Input {
            id: input,
            value: "typed".to_string(),
        }));
        assert_eq!(*seen.borrow(), "typed");
    }

    #[test]
    fn handler_may_remove_its_own_node() {
        let dom = Dom::new();
        let button = dom.create_in(dom.body(), "button");
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        dom.on(button, move |dom, _| {
            dom.remove(button);
            flag.set(true);
        });

        assert!(dom.dispatch(&HostEvent::Click { id: button }));
        assert!(ran.get());
        assert!(!dom.exists(button));
        assert!(!dom.dispatch(&HostEvent::Click { id: button }));
    }

    #[test]
    fn host_close_marks_dialog_closed() {
        let dom = Dom::new();
        let dialog = dom.create_in(dom.body(), "dialog");
        dom.show_modal(dialog);
        assert!(dom.is_open(dialog));

        dom.dispatch(&HostEvent::Closed {
            id: dialog,
            return_value: String::new(),
        });
        assert!(!dom.is_open(dialog));
        assert_eq!(dom.return_value(dialog).as_deref(), Some(""));
    }

    #[test]
    fn mutations_of_missing_nodes_are_ignored() {
        let dom = Dom::new();
        dom.take_ops();
        assert!(!dom.set_text(NodeId(99), "x"));
        assert!(!dom.append(dom.body(), NodeId(99)));
        assert!(!dom.has_pending_ops());
    }
}
