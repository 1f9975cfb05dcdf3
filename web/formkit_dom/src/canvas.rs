//! Canvases drawn as `<svg>` subtrees, one per `(parent, name)`.

use crate::backend::DomBackend;
use crate::document::{Dom, NodeId};
use crate::protocol::HostEvent;
use formkit::{Canvas, FixedAdvance, MouseState, Point, RenderAtom, RenderAtomsUser, Shape};
use std::collections::BTreeSet;
use std::rc::Rc;

pub const CANVAS_ATTR: &str = "data-canvas";

impl DomBackend {
    /// Hands the canvas `name` under `parent` to `user`, then redraws it.
    /// Returns `false` (and forgets the parent's canvases) when `parent`
    /// is gone.
    pub fn with_canvas(&self, parent: NodeId, name: &str, user: &mut dyn RenderAtomsUser) -> bool {
        if !self.inner.dom.exists(parent) {
            self.forget_canvases(parent);
            return false;
        }

        self.inner
            .canvases
            .borrow_mut()
            .with_canvas(&parent, name, user);
        self.redraw(parent, name);
        true
    }

    /// A snapshot of the canvas, if it was ever used.
    pub fn canvas(&self, parent: NodeId, name: &str) -> Option<Canvas> {
        self.inner.canvases.borrow().get(&parent, name).cloned()
    }

    pub fn canvas_node(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.inner
            .canvas_nodes
            .borrow()
            .get(&(parent, name.to_string()))
            .copied()
    }

    pub fn remove_canvas(&self, parent: NodeId, name: &str) -> bool {
        let node = self
            .inner
            .canvas_nodes
            .borrow_mut()
            .remove(&(parent, name.to_string()));
        if let Some(node) = node {
            self.inner.dom.remove(node);
        }
        self.inner.canvases.borrow_mut().remove(&parent, name).is_some()
    }

    /// Drops the canvases of removed parents and forgets removed `<svg>`
    /// nodes, so a later canvas never lands on a stale node.
    pub(crate) fn forget_removed(&self, removed: &[NodeId]) {
        let removed: BTreeSet<NodeId> = removed.iter().copied().collect();
        let dropped = match self.inner.canvases.try_borrow_mut() {
            Ok(mut canvases) => canvases.remove_parents(|owner| removed.contains(owner)),
            Err(_) => {
                log::warn!("canvas registry busy; stale canvases kept until next use");
                0
            }
        };
        if let Ok(mut nodes) = self.inner.canvas_nodes.try_borrow_mut() {
            nodes.retain(|(owner, _), svg| !removed.contains(owner) && !removed.contains(svg));
        }
        if dropped > 0 {
            log::debug!("dropped {dropped} canvases with their removed parents");
        }
    }

    fn forget_canvases(&self, parent: NodeId) {
        let dropped = self.inner.canvases.borrow_mut().remove_parent(&parent);
        self.inner
            .canvas_nodes
            .borrow_mut()
            .retain(|(owner, _), _| *owner != parent);
        if dropped > 0 {
            log::debug!("dropped {dropped} canvases of vanished parent {parent}");
        }
    }

    fn svg_node(&self, parent: NodeId, name: &str) -> NodeId {
        let key = (parent, name.to_string());
        let existing = self.inner.canvas_nodes.borrow().get(&key).copied();
        if let Some(svg) = existing.filter(|svg| self.inner.dom.exists(*svg)) {
            return svg;
        }

        let dom = &self.inner.dom;
        let svg = dom.create_in(parent, "svg");
        dom.set_attr(svg, CANVAS_ATTR, name);

        let weak = Rc::downgrade(&self.inner);
        let owned = name.to_string();
        dom.on(svg, move |_, event| {
            let HostEvent::Pointer { x, y, pressed, .. } = event else {
                return;
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let backend = DomBackend { inner };
            let changed = backend
                .inner
                .canvases
                .borrow_mut()
                .get_mut(&parent, &owned)
                .is_some_and(|canvas| {
                    canvas.update_mouse(Point::new(*x, *y), *pressed, &FixedAdvance)
                });
            if changed {
                backend.redraw(parent, &owned);
            }
        });

        self.inner.canvas_nodes.borrow_mut().insert(key, svg);
        svg
    }

    fn redraw(&self, parent: NodeId, name: &str) {
        let Some(canvas) = self.canvas(parent, name) else {
            return;
        };
        let svg = self.svg_node(parent, name);
        let dom = &self.inner.dom;
        for child in dom.children(svg) {
            dom.remove(child);
        }

        let layer = dom.create_in(svg, "g");
        dom.set_attr(
            layer,
            "transform",
            format!(
                "scale({}) translate({} {})",
                canvas.view.zoom, -canvas.view.offset.x, -canvas.view.offset.y
            ),
        );
        for atom in &canvas.atoms {
            draw_atom(dom, layer, atom);
        }
    }
}

fn draw_atom(dom: &Dom, layer: NodeId, atom: &RenderAtom) {
    let node = match &atom.shape {
        Shape::Rectangle(rect) | Shape::RoundedRectangle { rect, .. } => {
            let node = dom.create_in(layer, "rect");
            dom.set_attr(node, "x", rect.x.to_string());
            dom.set_attr(node, "y", rect.y.to_string());
            dom.set_attr(node, "width", rect.width.to_string());
            dom.set_attr(node, "height", rect.height.to_string());
            if let Shape::RoundedRectangle { radius, .. } = &atom.shape {
                dom.set_attr(node, "rx", radius.to_string());
                dom.set_attr(node, "ry", radius.to_string());
            }
            node
        }
        Shape::Ellipse(rect) => {
            let node = dom.create_in(layer, "ellipse");
            dom.set_attr(node, "cx", (rect.x + rect.width / 2.0).to_string());
            dom.set_attr(node, "cy", (rect.y + rect.height / 2.0).to_string());
            dom.set_attr(node, "rx", (rect.width / 2.0).to_string());
            dom.set_attr(node, "ry", (rect.height / 2.0).to_string());
            node
        }
        Shape::Text { origin, text, size } => {
            let node = dom.create_in(layer, "text");
            dom.set_attr(node, "x", origin.x.to_string());
            // SVG places text on its baseline.
            dom.set_attr(node, "y", (origin.y + size).to_string());
            dom.set_attr(node, "font-size", size.to_string());
            dom.set_text(node, text.as_str());
            node
        }
    };

    let color = atom.style.color.to_string();
    if atom.style.fill {
        dom.set_attr(node, "fill", color);
    } else {
        dom.set_attr(node, "fill", "none");
        dom.set_attr(node, "stroke", color);
    }
    dom.set_attr(node, "data-mouse", mouse_name(atom.mouse_state));
}

fn mouse_name(state: MouseState) -> &'static str {
    match state {
        MouseState::Free => "free",
        MouseState::Hovered => "hovered",
        MouseState::Clicked => "clicked",
        MouseState::Held => "held",
        MouseState::Released => "released",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formkit::{Color, Rect, Style, ViewRect};

    fn square(atoms: &mut Vec<RenderAtom>, _: &mut ViewRect) {
        atoms.push(RenderAtom::new(
            Shape::Rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)),
            Style {
                color: Color::BLUE,
                fill: true,
            },
        ));
    }

    #[test]
    fn draws_atoms_under_a_view_transform() {
        let backend = DomBackend::default();
        let dom = backend.dom().clone();
        let tab = dom.create_in(dom.body(), "div");

        assert!(backend.with_canvas(tab, "plot", &mut square));
        let svg = backend.canvas_node(tab, "plot").expect("svg node");
        assert_eq!(dom.attr(svg, CANVAS_ATTR).as_deref(), Some("plot"));

        let layer = dom.children(svg)[0];
        assert_eq!(
            dom.attr(layer, "transform").as_deref(),
            Some("scale(1) translate(-0 -0)")
        );
        let rect = dom.children(layer)[0];
        assert_eq!(dom.tag(rect).as_deref(), Some("rect"));
        assert_eq!(dom.attr(rect, "fill").as_deref(), Some("#285adcff"));
    }

    #[test]
    fn pointer_events_update_mouse_state_and_redraw() {
        let backend = DomBackend::default();
        let dom = backend.dom().clone();
        let tab = dom.create_in(dom.body(), "div");
        backend.with_canvas(tab, "plot", &mut square);
        let svg = backend.canvas_node(tab, "plot").expect("svg node");

        backend.dispatch(&HostEvent::Pointer {
            id: svg,
            x: 5.0,
            y: 5.0,
            pressed: false,
        });
        let canvas = backend.canvas(tab, "plot").expect("canvas");
        assert_eq!(canvas.atoms[0].mouse_state, MouseState::Hovered);

        let rect = dom.children(dom.children(svg)[0])[0];
        assert_eq!(dom.attr(rect, "data-mouse").as_deref(), Some("hovered"));
    }

    #[test]
    fn removing_a_parent_drops_its_canvases_at_once() {
        let backend = DomBackend::default();
        let dom = backend.dom().clone();
        let old_tab = dom.create_in(dom.body(), "div");
        backend.with_canvas(old_tab, "plot", &mut square);
        let old_svg = backend.canvas_node(old_tab, "plot").expect("svg node");

        dom.remove(old_tab);
        assert!(backend.canvas(old_tab, "plot").is_none());
        assert!(backend.canvas_node(old_tab, "plot").is_none());

        let new_tab = dom.create_in(dom.body(), "div");
        let input = dom.create_in(new_tab, "input");
        assert_ne!(new_tab, old_tab);
        assert_ne!(input, old_svg);

        let mut seen = None;
        backend.with_canvas(new_tab, "plot", &mut |atoms: &mut Vec<RenderAtom>, _: &mut ViewRect| {
            seen = Some(atoms.len());
        });
        assert_eq!(seen, Some(0));
        assert!(dom.children(input).is_empty());
        let svg = backend.canvas_node(new_tab, "plot").expect("fresh svg");
        assert_eq!(dom.parent(svg), Some(new_tab));
    }

    #[test]
    fn vanished_parent_drops_its_canvases() {
        let backend = DomBackend::default();
        let dom = backend.dom().clone();
        let tab = dom.create_in(dom.body(), "div");
        backend.with_canvas(tab, "a", &mut square);
        backend.with_canvas(tab, "b", &mut square);

        dom.remove(tab);
        assert!(!backend.with_canvas(tab, "a", &mut square));
        assert!(backend.canvas(tab, "a").is_none());
        assert!(backend.canvas(tab, "b").is_none());
        assert_eq!(dom.handler_count(), 0);
    }
}
