use formkit::{
    Binding, BranchUnit, ComplexString, DialogResult, Edit, EnableForm, EnableUnit, Field,
    FileDialog, Form, FormData, FormVisitor, Menu, MenuController, MenuOutcome, MenuState,
    MenuSurface, MenuView, NewMenu, Number, Range, StringMap, StringSelection, StringSet,
    VariantForm, share, unshare, walk_form,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A headless backend: every leaf becomes a "widget" that only remembers
/// its binding, so a test can fire change events at it.
#[derive(Default)]
struct Widgets {
    leaves: Vec<(String, Binding)>,
    selectors: Vec<(String, Binding)>,
    toggles: Vec<(String, Binding)>,
}

impl Widgets {
    fn leaf(&self, label: &str) -> &Binding {
        self.find(&self.leaves, label)
    }

    fn selector(&self, label: &str) -> &Binding {
        self.find(&self.selectors, label)
    }

    fn toggle(&self, label: &str) -> &Binding {
        self.find(&self.toggles, label)
    }

    fn find<'a>(&self, list: &'a [(String, Binding)], label: &str) -> &'a Binding {
        list.iter()
            .find(|(name, _)| name == label)
            .map(|(_, binding)| binding)
            .unwrap_or_else(|| panic!("no widget labelled {label}"))
    }

    fn record(&mut self, field: &Field<'_>) {
        self.leaves
            .push((field.label.to_string(), field.binding.clone()));
    }
}

impl FormVisitor for Widgets {
    type Unit = ();

    fn empty(&mut self, _field: &Field<'_>) {}

    fn boolean(&mut self, field: &Field<'_>, _value: bool) {
        self.record(field);
    }

    fn number(&mut self, field: &Field<'_>, _value: &Number) {
        self.record(field);
    }

    fn text(&mut self, field: &Field<'_>, _value: &str) {
        self.record(field);
    }

    fn complex_text(&mut self, field: &Field<'_>, _value: &ComplexString) {
        self.record(field);
    }

    fn string_set(&mut self, field: &Field<'_>, _value: &StringSet) {
        self.record(field);
    }

    fn selection(&mut self, field: &Field<'_>, _value: &StringSelection) {
        self.record(field);
    }

    fn string_map(&mut self, field: &Field<'_>, _value: &StringMap) {
        self.record(field);
    }

    fn group(&mut self, _field: &Field<'_>, _children: Vec<()>) {}

    fn expander(&mut self, _field: &Field<'_>, _body: ()) {}

    fn enable_group(&mut self, _field: &Field<'_>, entries: Vec<EnableUnit<()>>) {
        for entry in entries {
            self.toggles.push((entry.label, entry.toggle));
        }
    }

    fn variant(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        _selected: &str,
        _branches: Vec<BranchUnit<()>>,
    ) {
        self.selectors.push((field.label.to_string(), selector));
    }

    fn tabs(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        _selected: &str,
        _tabs: Vec<BranchUnit<()>>,
    ) {
        self.selectors.push((field.label.to_string(), selector));
    }
}

fn render(form: &Form) -> (formkit::SharedForm, Widgets) {
    let shared = share(form.clone());
    let mut widgets = Widgets::default();
    walk_form(form, &shared, "", &mut widgets);
    (shared, widgets)
}

#[test]
fn firing_every_widget_round_trips_into_the_tree() {
    init_logging();

    let form = Form::new()
        .with("enabled", false)
        .with("count", Number::from(Range::new(1_u32, 0, 10).expect("valid range")))
        .with("name", "old")
        .with("notes", ComplexString::new("n"))
        .with("tags", StringSet::new())
        .with("color", StringSelection::from_options(["blue", "red"], "blue"))
        .with("extra", Form::new().with("nested", "x"));
    let (shared, widgets) = render(&form);

    assert!(widgets.leaf("enabled").apply(Edit::Bool(true)));
    assert!(widgets.leaf("count").apply(Edit::Number("7".into())));
    assert!(widgets.leaf("name").apply(Edit::Text("new".into())));
    assert!(widgets.leaf("notes").apply(Edit::Text("changed".into())));
    assert!(widgets.leaf("tags").apply(Edit::Lines(vec!["a".into(), "b".into()])));
    assert!(widgets.leaf("color").apply(Edit::Index(1)));
    assert!(widgets.leaf("nested").apply(Edit::Text("y".into())));

    let edited = unshare(&shared);
    assert_eq!(edited.get("enabled"), Some(&FormData::Bool(true)));
    assert_eq!(
        edited.get("count").and_then(FormData::as_number).map(Number::as_f64),
        Some(7.0)
    );
    assert_eq!(edited.get("name").and_then(FormData::as_str), Some("new"));
    assert_eq!(edited.get("notes").and_then(FormData::as_str), Some("changed"));
    match edited.get("color") {
        Some(FormData::Selection(selection)) => assert_eq!(selection.selected(), Some("red")),
        other => panic!("expected selection, got {other:?}"),
    }
    assert_eq!(
        edited
            .get("extra")
            .and_then(FormData::as_form)
            .and_then(|extra| extra.get("nested"))
            .and_then(FormData::as_str),
        Some("y")
    );
}

#[test]
fn variant_branches_keep_values_across_selection() {
    init_logging();

    let form = Form::new().with(
        "shape",
        VariantForm::new()
            .with("a", Form::new().with("a_value", "first"))
            .with("b", Form::new().with("b_value", "second")),
    );
    let (shared, widgets) = render(&form);

    assert!(widgets.leaf("a_value").apply(Edit::Text("kept".into())));
    assert!(widgets.selector("shape").apply(Edit::Select("b".into())));
    assert!(widgets.leaf("b_value").apply(Edit::Text("written".into())));
    assert!(widgets.selector("shape").apply(Edit::Select("a".into())));

    let edited = unshare(&shared);
    let Some(FormData::Variant(variant)) = edited.get("shape") else {
        panic!("expected variant");
    };
    assert_eq!(variant.selected(), "a");
    assert_eq!(
        variant.get("a").and_then(|a| a.get("a_value")).and_then(FormData::as_str),
        Some("kept")
    );
    assert_eq!(
        variant.get("b").and_then(|b| b.get("b_value")).and_then(FormData::as_str),
        Some("written")
    );
}

#[test]
fn disabling_an_entry_keeps_its_subform() {
    init_logging();

    let form = Form::new().with(
        "net",
        EnableForm::new().with("proxy", true, Form::new().with("host", "a.example")),
    );
    let (shared, widgets) = render(&form);

    assert!(widgets.leaf("host").apply(Edit::Text("b.example".into())));
    assert!(widgets.toggle("proxy").apply(Edit::Bool(false)));

    let edited = unshare(&shared);
    let Some(FormData::Enable(enable)) = edited.get("net") else {
        panic!("expected enable form");
    };
    assert!(!enable.is_enabled("proxy"));
    assert_eq!(
        enable
            .get("proxy")
            .and_then(|entry| entry.form.get("host"))
            .and_then(FormData::as_str),
        Some("b.example")
    );
}

#[derive(Clone, Default)]
struct Registry(Rc<RefCell<Vec<String>>>);

struct Window {
    registry: Registry,
    title: Option<String>,
}

impl MenuSurface for Window {
    fn open(&mut self, view: &MenuView) {
        self.registry.0.borrow_mut().push(view.title.clone());
        self.title = Some(view.title.clone());
    }

    fn close(&mut self) {
        if let Some(title) = self.title.take() {
            self.registry.0.borrow_mut().retain(|open| *open != title);
        }
    }
}

#[test]
fn replacing_then_closing_a_menu_leaves_nothing_open() {
    init_logging();

    let registry = Registry::default();
    let observed = registry.clone();
    let menus = vec![Menu::new("A").item("X", move || {
        assert_eq!(*observed.0.borrow(), ["A"]);
        NewMenu::new("B", vec![Menu::new("B").item("Y", || false)])
    })];

    let mut controller = MenuController::open(
        "A",
        menus,
        Window {
            registry: registry.clone(),
            title: None,
        },
    );
    assert_eq!(*registry.0.borrow(), ["A"]);

    assert_eq!(controller.click(0, 0), MenuOutcome::Replaced);
    assert_eq!(*registry.0.borrow(), ["B"]);

    assert_eq!(controller.click(0, 0), MenuOutcome::Closed);
    assert_eq!(controller.state(), MenuState::Closed);
    assert!(registry.0.borrow().is_empty());
}

#[test]
fn file_handler_rejecting_second_path_fails_and_stops() {
    init_logging();

    let mut seen: Vec<PathBuf> = Vec::new();
    let mut handler = |path: &Path| {
        seen.push(path.to_path_buf());
        seen.len() < 2
    };

    let result = FileDialog::dispatch(
        Some(vec!["one".into(), "two".into(), "three".into()]),
        &mut handler,
    );

    assert_eq!(result, DialogResult::Error);
    assert_eq!(seen, [PathBuf::from("one"), PathBuf::from("two")]);
}
