//! Canvases shown as their own windows, one per `(parent, name)`.
//!
//! Atoms are converted to screen space here, so the markup only places
//! rectangles, paths and text at the coordinates it is given.

use crate::backend::{SlintBackend, WindowId};
use crate::{CanvasAtom, CanvasWindow};
use formkit::{
    Canvas, Color, FixedAdvance, MouseState, Point, RenderAtom, RenderAtomsUser, Shape,
    TextMeasure,
};
use slint::{ComponentHandle, ModelRc, SharedString, VecModel};
use std::rc::Rc;

const RECTANGLE: i32 = 0;
const ELLIPSE: i32 = 1;
const TEXT: i32 = 2;

/// Zoom step per wheel notch.
const WHEEL_ZOOM: f32 = 1.1;

impl SlintBackend {
    /// Hands the canvas `name` under `parent` to `user`, then redraws its
    /// window. Returns `false` (and drops the parent's canvases) when
    /// `parent` is gone.
    pub fn with_canvas(&self, parent: WindowId, name: &str, user: &mut dyn RenderAtomsUser) -> bool {
        if !self.window_alive(parent) {
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

    pub fn canvas(&self, parent: WindowId, name: &str) -> Option<Canvas> {
        self.inner.canvases.borrow().get(&parent, name).cloned()
    }

    pub fn remove_canvas(&self, parent: WindowId, name: &str) -> bool {
        let window = self
            .inner
            .canvas_windows
            .borrow_mut()
            .remove(&(parent, name.to_string()));
        if let Some(window) = window {
            if let Err(err) = window.hide() {
                log::warn!("failed to hide canvas {name:?}: {err}");
            }
        }
        self.inner.canvases.borrow_mut().remove(&parent, name).is_some()
    }

    pub(crate) fn forget_canvases(&self, parent: WindowId) {
        let dropped = self.inner.canvases.borrow_mut().remove_parent(&parent);
        let windows: Vec<CanvasWindow> = {
            let mut canvas_windows = self.inner.canvas_windows.borrow_mut();
            let keys: Vec<_> = canvas_windows
                .keys()
                .filter(|(owner, _)| *owner == parent)
                .cloned()
                .collect();
            keys.iter()
                .filter_map(|key| canvas_windows.remove(key))
                .collect()
        };
        for window in windows {
            if let Err(err) = window.hide() {
                log::warn!("failed to hide canvas window: {err}");
            }
        }
        if dropped > 0 {
            log::debug!("dropped {dropped} canvases of vanished parent {parent}");
        }
    }

    fn canvas_window(&self, parent: WindowId, name: &str) -> Option<CanvasWindow> {
        let key = (parent, name.to_string());
        if let Some(window) = self.inner.canvas_windows.borrow().get(&key) {
            return Some(window.clone_strong());
        }

        let window = match CanvasWindow::new() {
            Ok(window) => window,
            Err(err) => {
                log::error!("cannot create canvas window {name:?}: {err}");
                return None;
            }
        };
        window.set_heading(SharedString::from(name));

        let weak = Rc::downgrade(&self.inner);
        let owned = name.to_string();
        window.on_pointer(move |x, y, pressed| {
            let Some(backend) = SlintBackend::from_weak(&weak) else {
                return;
            };
            let changed = backend
                .inner
                .canvases
                .borrow_mut()
                .get_mut(&parent, &owned)
                .is_some_and(|canvas| {
                    canvas.update_mouse(Point::new(x, y), pressed, &FixedAdvance)
                });
            if changed {
                backend.redraw(parent, &owned);
            }
        });

        let weak = Rc::downgrade(&self.inner);
        let owned = name.to_string();
        window.on_zoomed(move |x, y, delta| {
            let factor = if delta > 0.0 {
                WHEEL_ZOOM
            } else if delta < 0.0 {
                1.0 / WHEEL_ZOOM
            } else {
                return;
            };
            let Some(backend) = SlintBackend::from_weak(&weak) else {
                return;
            };
            if let Some(canvas) = backend.inner.canvases.borrow_mut().get_mut(&parent, &owned) {
                canvas.view.zoom(factor, Point::new(x, y));
            }
            backend.redraw(parent, &owned);
        });

        if let Err(err) = window.show() {
            log::error!("cannot show canvas window {name:?}: {err}");
            return None;
        }
        self.inner
            .canvas_windows
            .borrow_mut()
            .insert(key, window.clone_strong());
        Some(window)
    }

    fn redraw(&self, parent: WindowId, name: &str) {
        let Some(canvas) = self.canvas(parent, name) else {
            return;
        };
        let Some(window) = self.canvas_window(parent, name) else {
            return;
        };
        let atoms = screen_atoms(&canvas, &FixedAdvance);
        window.set_atoms(ModelRc::new(VecModel::from(atoms)));
    }
}

/// The canvas's atoms placed in window pixels under its current view.
pub fn screen_atoms(canvas: &Canvas, measure: &dyn TextMeasure) -> Vec<CanvasAtom> {
    canvas
        .atoms
        .iter()
        .map(|atom| screen_atom(canvas, atom, measure))
        .collect()
}

fn screen_atom(canvas: &Canvas, atom: &RenderAtom, measure: &dyn TextMeasure) -> CanvasAtom {
    let zoom = canvas.view.zoom;
    let bounds = atom.bounds(measure);
    let origin = canvas.view.canvas_to_screen(Point::new(bounds.x, bounds.y));
    let width = bounds.width * zoom;
    let height = bounds.height * zoom;

    let mut out = CanvasAtom {
        kind: RECTANGLE,
        x: origin.x,
        y: origin.y,
        width,
        height,
        radius: 0.0,
        commands: SharedString::new(),
        text: SharedString::new(),
        font_size: 0.0,
        color: slint_color(atom.style.color),
        fill: atom.style.fill,
        state: SharedString::from(mouse_name(atom.mouse_state)),
    };

    match &atom.shape {
        Shape::Rectangle(_) => {}
        Shape::RoundedRectangle { radius, .. } => out.radius = radius * zoom,
        Shape::Ellipse(_) => {
            out.kind = ELLIPSE;
            out.commands = SharedString::from(ellipse_path(width, height));
        }
        Shape::Text { text, size, .. } => {
            out.kind = TEXT;
            out.text = SharedString::from(text.as_str());
            out.font_size = size * zoom;
        }
    }

    out
}

/// Two arcs through the left and right extremes of a `width` x `height` box.
fn ellipse_path(width: f32, height: f32) -> String {
    let rx = width / 2.0;
    let ry = height / 2.0;
    format!("M 0 {ry} A {rx} {ry} 0 1 0 {width} {ry} A {rx} {ry} 0 1 0 0 {ry} Z")
}

fn slint_color(color: Color) -> slint::Color {
    slint::Color::from_argb_u8(color.a, color.r, color.g, color.b)
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
    use formkit::{Rect, Style};

    fn style() -> Style {
        Style {
            color: Color::BLUE,
            fill: false,
        }
    }

    #[test]
    fn atoms_follow_the_view() {
        let mut canvas = Canvas::new();
        canvas.push(Shape::Rectangle(Rect::new(10.0, 10.0, 20.0, 20.0)), style());
        canvas.view.offset = Point::new(5.0, 5.0);
        canvas.view.zoom = 2.0;

        let atoms = screen_atoms(&canvas, &FixedAdvance);
        assert_eq!(atoms.len(), 1);
        let rect = &atoms[0];
        assert_eq!(rect.kind, RECTANGLE);
        assert_eq!((rect.x, rect.y), (10.0, 10.0));
        assert_eq!((rect.width, rect.height), (40.0, 40.0));
        assert_eq!(rect.color, slint::Color::from_rgb_u8(40, 90, 220));
        assert!(!rect.fill);
    }

    #[test]
    fn ellipses_become_paths_and_text_scales() {
        let mut canvas = Canvas::new();
        canvas.push(Shape::Ellipse(Rect::new(0.0, 0.0, 20.0, 10.0)), style());
        canvas.push(
            Shape::Text {
                origin: Point::new(0.0, 0.0),
                text: "hi".to_string(),
                size: 10.0,
            },
            style(),
        );

        let atoms = screen_atoms(&canvas, &FixedAdvance);
        assert_eq!(atoms[0].kind, ELLIPSE);
        assert_eq!(
            atoms[0].commands.as_str(),
            "M 0 5 A 10 5 0 1 0 20 5 A 10 5 0 1 0 0 5 Z"
        );
        assert_eq!(atoms[1].kind, TEXT);
        assert_eq!(atoms[1].text.as_str(), "hi");
        assert_eq!(atoms[1].font_size, 10.0);
        assert_eq!(atoms[1].width, 12.0);
    }

    #[test]
    fn mouse_state_is_carried_by_name() {
        let mut canvas = Canvas::new();
        canvas.push(Shape::Rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)), style());
        canvas.update_mouse(Point::new(5.0, 5.0), false, &FixedAdvance);

        let atoms = screen_atoms(&canvas, &FixedAdvance);
        assert_eq!(atoms[0].state.as_str(), "hovered");
    }
}
