//! Styled 2D atoms on a pannable, zoomable canvas, with pointer hit-testing.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle; `width` and `height` are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Edges count as inside.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(220, 40, 40);
    pub const GREEN: Color = Color::rgb(40, 170, 70);
    pub const BLUE: Color = Color::rgb(40, 90, 220);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// CSS hex notation, `#rrggbbaa`.
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub color: Color,
    pub fill: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            fill: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rectangle(Rect),
    RoundedRectangle { rect: Rect, radius: f32 },
    Ellipse(Rect),
    /// `origin` is the top-left corner of the first line.
    Text { origin: Point, text: String, size: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseState {
    #[default]
    Free,
    Hovered,
    Clicked,
    Held,
    Released,
}

/// Text extents, as the backend's renderer would lay the text out.
pub trait TextMeasure {
    /// Width and height of `text` at font `size`.
    fn measure(&self, text: &str, size: f32) -> (f32, f32);
}

/// Fixed advance per character: `0.6 * size` wide, `1.2 * size` per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedAdvance;

impl TextMeasure for FixedAdvance {
    fn measure(&self, text: &str, size: f32) -> (f32, f32) {
        let lines = text.lines().count().max(1);
        let widest = text
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        (widest as f32 * size * 0.6, lines as f32 * size * 1.2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderAtom {
    pub shape: Shape,
    pub style: Style,
    pub mouse_state: MouseState,
}

impl RenderAtom {
    pub fn new(shape: Shape, style: Style) -> Self {
        Self {
            shape,
            style,
            mouse_state: MouseState::Free,
        }
    }

    /// Hit-test bounds in canvas space. Rounded corners and ellipse curves
    /// are approximated by the enclosing rectangle.
    pub fn bounds(&self, measure: &dyn TextMeasure) -> Rect {
        match &self.shape {
            Shape::Rectangle(rect) | Shape::Ellipse(rect) => *rect,
            Shape::RoundedRectangle { rect, .. } => *rect,
            Shape::Text { origin, text, size } => {
                let (width, height) = measure.measure(text, *size);
                Rect::new(origin.x, origin.y, width, height)
            }
        }
    }
}

/// Maps screen pixels to canvas coordinates: `canvas = screen / zoom + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub offset: Point,
    pub zoom: f32,
}

impl ViewRect {
    pub const MIN_ZOOM: f32 = 0.05;
    pub const MAX_ZOOM: f32 = 50.0;

    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        Point::new(
            screen.x / self.zoom + self.offset.x,
            screen.y / self.zoom + self.offset.y,
        )
    }

    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point::new(
            (canvas.x - self.offset.x) * self.zoom,
            (canvas.y - self.offset.y) * self.zoom,
        )
    }

    /// Moves the view by a screen-space drag of `(dx, dy)`.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset.x -= dx / self.zoom;
        self.offset.y -= dy / self.zoom;
    }

    /// Scales by `factor`, keeping the canvas point under `anchor` (screen
    /// space) fixed. Zoom is clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoom(&mut self, factor: f32, anchor: Point) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }

        let pinned = self.screen_to_canvas(anchor);
        self.zoom = (self.zoom * factor).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        self.offset = Point::new(
            pinned.x - anchor.x / self.zoom,
            pinned.y - anchor.y / self.zoom,
        );
    }

    /// The canvas-space area a viewport of `width` x `height` pixels shows.
    pub fn visible(&self, width: f32, height: f32) -> Rect {
        Rect::new(
            self.offset.x,
            self.offset.y,
            width / self.zoom,
            height / self.zoom,
        )
    }
}

impl Default for ViewRect {
    fn default() -> Self {
        Self {
            offset: Point::default(),
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Canvas {
    pub atoms: Vec<RenderAtom>,
    pub view: ViewRect,
    pressed: bool,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, shape: Shape, style: Style) -> usize {
        self.atoms.push(RenderAtom::new(shape, style));
        self.atoms.len() - 1
    }

    pub fn clear(&mut self) {
        self.atoms.clear();
    }

    /// Topmost atom under a canvas-space point.
    pub fn hit(&self, point: Point, measure: &dyn TextMeasure) -> Option<usize> {
        self.atoms
            .iter()
            .rposition(|atom| atom.bounds(measure).contains(point))
    }

    /// Recomputes every atom's mouse state from the pointer position (screen
    /// space) and button state. Returns whether any state changed.
    pub fn update_mouse(&mut self, pointer: Point, pressed: bool, measure: &dyn TextMeasure) -> bool {
        let point = self.view.screen_to_canvas(pointer);
        let was_pressed = self.pressed;
        self.pressed = pressed;

        let mut changed = false;
        for atom in &mut self.atoms {
            let inside = atom.bounds(measure).contains(point);
            let next = next_mouse_state(atom.mouse_state, inside, pressed, was_pressed);
            if next != atom.mouse_state {
                atom.mouse_state = next;
                changed = true;
            }
        }

        changed
    }
}

fn next_mouse_state(current: MouseState, inside: bool, pressed: bool, was_pressed: bool) -> MouseState {
    if !inside {
        return MouseState::Free;
    }

    match (current, pressed) {
        (MouseState::Clicked | MouseState::Held, true) => MouseState::Held,
        (MouseState::Clicked | MouseState::Held, false) => MouseState::Released,
        // Dragging in with the button already down is only a hover.
        (_, true) if !was_pressed => MouseState::Clicked,
        _ => MouseState::Hovered,
    }
}

/// Consumer of a canvas's atoms and view, handed both mutably.
pub trait RenderAtomsUser {
    fn use_atoms(&mut self, atoms: &mut Vec<RenderAtom>, view: &mut ViewRect);
}

impl<F: FnMut(&mut Vec<RenderAtom>, &mut ViewRect)> RenderAtomsUser for F {
    fn use_atoms(&mut self, atoms: &mut Vec<RenderAtom>, view: &mut ViewRect) {
        self(atoms, view)
    }
}

/// Canvases by `(parent, name)`, created on first request. `P` is the
/// backend's handle for the tab or window that hosts a canvas.
#[derive(Debug, Clone)]
pub struct CanvasRegistry<P> {
    canvases: BTreeMap<(P, String), Canvas>,
}

impl<P> Default for CanvasRegistry<P> {
    fn default() -> Self {
        Self {
            canvases: BTreeMap::new(),
        }
    }
}

impl<P: Ord + Clone> CanvasRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, parent: &P, name: &str) -> &mut Canvas {
        self.canvases
            .entry((parent.clone(), name.to_string()))
            .or_insert_with(|| {
                log::debug!("created canvas {name:?}");
                Canvas::new()
            })
    }

    pub fn get(&self, parent: &P, name: &str) -> Option<&Canvas> {
        self.canvases.get(&(parent.clone(), name.to_string()))
    }

    pub fn get_mut(&mut self, parent: &P, name: &str) -> Option<&mut Canvas> {
        self.canvases.get_mut(&(parent.clone(), name.to_string()))
    }

    pub fn contains(&self, parent: &P, name: &str) -> bool {
        self.get(parent, name).is_some()
    }

    pub fn remove(&mut self, parent: &P, name: &str) -> Option<Canvas> {
        self.canvases.remove(&(parent.clone(), name.to_string()))
    }

    /// Drops every canvas under `parent`, e.g. when its window closes.
    pub fn remove_parent(&mut self, parent: &P) -> usize {
        self.remove_parents(|owner| owner == parent)
    }

    /// Drops every canvas whose parent matches `gone`.
    pub fn remove_parents(&mut self, gone: impl Fn(&P) -> bool) -> usize {
        let before = self.canvases.len();
        self.canvases.retain(|(owner, _), _| !gone(owner));
        before - self.canvases.len()
    }

    pub fn names(&self, parent: &P) -> Vec<&str> {
        self.canvases
            .keys()
            .filter(|(owner, _)| owner == parent)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }

    /// Hands the named canvas to `user`, creating it if needed.
    pub fn with_canvas(&mut self, parent: &P, name: &str, user: &mut dyn RenderAtomsUser) {
        let canvas = self.get_or_create(parent, name);
        user.use_atoms(&mut canvas.atoms, &mut canvas.view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed() -> Canvas {
        let mut canvas = Canvas::new();
        canvas.push(Shape::Rectangle(Rect::new(10.0, 10.0, 20.0, 20.0)), Style::default());
        canvas
    }

    #[test]
    fn mouse_state_walks_through_a_click() {
        let mut canvas = boxed();
        let inside = Point::new(15.0, 15.0);
        let outside = Point::new(100.0, 100.0);
        let measure = FixedAdvance;

        let mut states = Vec::new();
        for (pointer, pressed) in [
            (inside, false),
            (inside, true),
            (inside, true),
            (inside, false),
            (inside, false),
            (outside, false),
        ] {
            canvas.update_mouse(pointer, pressed, &measure);
            states.push(canvas.atoms[0].mouse_state);
        }

        assert_eq!(
            states,
            [
                MouseState::Hovered,
                MouseState::Clicked,
                MouseState::Held,
                MouseState::Released,
                MouseState::Hovered,
                MouseState::Free,
            ]
        );
    }

    #[test]
    fn dragging_in_with_button_down_only_hovers() {
        let mut canvas = boxed();
        let measure = FixedAdvance;
        canvas.update_mouse(Point::new(0.0, 0.0), true, &measure);
        canvas.update_mouse(Point::new(15.0, 15.0), true, &measure);
        assert_eq!(canvas.atoms[0].mouse_state, MouseState::Hovered);
    }

    #[test]
    fn view_changes_never_move_atoms() {
        let mut canvas = boxed();
        let before = canvas.atoms.clone();

        canvas.view.pan(50.0, -20.0);
        canvas.view.zoom(2.0, Point::new(40.0, 40.0));
        assert_eq!(canvas.atoms, before);

        let screen = canvas.view.canvas_to_screen(Point::new(15.0, 15.0));
        canvas.update_mouse(screen, false, &FixedAdvance);
        assert_eq!(canvas.atoms[0].mouse_state, MouseState::Hovered);
    }

    #[test]
    fn zoom_keeps_anchor_fixed_and_clamps() {
        let mut view = ViewRect::default();
        let anchor = Point::new(100.0, 50.0);
        let pinned = view.screen_to_canvas(anchor);

        view.zoom(4.0, anchor);
        let after = view.screen_to_canvas(anchor);
        assert!((after.x - pinned.x).abs() < 1e-4);
        assert!((after.y - pinned.y).abs() < 1e-4);

        view.zoom(1_000.0, anchor);
        assert_eq!(view.zoom, ViewRect::MAX_ZOOM);
        view.zoom(-1.0, anchor);
        assert_eq!(view.zoom, ViewRect::MAX_ZOOM);
    }

    #[test]
    fn text_hit_test_uses_measured_extents() {
        let mut canvas = Canvas::new();
        canvas.push(
            Shape::Text {
                origin: Point::new(0.0, 0.0),
                text: "abcd".to_string(),
                size: 10.0,
            },
            Style::default(),
        );

        assert_eq!(canvas.hit(Point::new(23.0, 11.0), &FixedAdvance), Some(0));
        assert_eq!(canvas.hit(Point::new(25.0, 5.0), &FixedAdvance), None);
    }

    #[test]
    fn topmost_atom_wins_hit_test() {
        let mut canvas = boxed();
        canvas.push(
            Shape::Ellipse(Rect::new(0.0, 0.0, 40.0, 40.0)),
            Style {
                color: Color::RED,
                fill: true,
            },
        );
        assert_eq!(canvas.hit(Point::new(15.0, 15.0), &FixedAdvance), Some(1));
        assert_eq!(canvas.hit(Point::new(35.0, 5.0), &FixedAdvance), Some(1));
    }

    #[test]
    fn registry_returns_existing_canvas_per_parent() {
        let mut registry: CanvasRegistry<u32> = CanvasRegistry::new();
        registry
            .get_or_create(&1, "plot")
            .push(Shape::Rectangle(Rect::default()), Style::default());

        assert_eq!(registry.get_or_create(&1, "plot").atoms.len(), 1);
        assert!(registry.get_or_create(&2, "plot").atoms.is_empty());
        assert_eq!(registry.len(), 2);

        let mut seen = 0;
        registry.with_canvas(&1, "plot", &mut |atoms: &mut Vec<RenderAtom>, _view: &mut ViewRect| {
            seen = atoms.len();
        });
        assert_eq!(seen, 1);

        assert_eq!(registry.names(&1), ["plot"]);
        assert_eq!(registry.remove_parent(&1), 1);
        assert!(!registry.contains(&1, "plot"));
        assert!(registry.contains(&2, "plot"));
    }

    #[test]
    fn color_renders_as_css_hex() {
        assert_eq!(Color::rgba(255, 0, 16, 128).to_string(), "#ff001080");
    }
}
