//! Flattens a form into the row list the dialog window scrolls through.
//!
//! Slint components are declared ahead of time, so a form becomes a flat
//! sequence of typed rows. Nesting is kept as an indent depth plus the gates
//! that hide a row: a collapsed header, a switched-off enable entry, or an
//! unselected branch.

use formkit::{
    Binding, BranchUnit, ComplexString, Edit, EnableUnit, Field, Form, FormData, FormVisitor,
    Number, Segment, SharedForm, SlotRef, StringMap, StringSelection, StringSet, walk_form,
};
use std::collections::BTreeSet;

/// The widget a row is drawn with. The numeric codes are what the markup
/// switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Note,
    Header,
    Check,
    Number,
    Text,
    Multiline,
    Choice,
    Snippets,
    Tabs,
}

impl RowKind {
    pub fn code(self) -> i32 {
        match self {
            RowKind::Note => 0,
            RowKind::Header => 1,
            RowKind::Check => 2,
            RowKind::Number => 3,
            RowKind::Text => 4,
            RowKind::Multiline => 5,
            RowKind::Choice => 6,
            RowKind::Snippets => 7,
            RowKind::Tabs => 8,
        }
    }
}

/// What a row edits, which decides how widget input becomes an [`Edit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Note,
    Header,
    Bool,
    Number,
    Text,
    ComplexText,
    Lines,
    Selection,
    Branch { tabs: bool },
    Snippet(Vec<(String, String)>),
}

impl Role {
    fn kind(&self) -> RowKind {
        match self {
            Role::Note => RowKind::Note,
            Role::Header => RowKind::Header,
            Role::Bool => RowKind::Check,
            Role::Number => RowKind::Number,
            Role::Text => RowKind::Text,
            Role::ComplexText | Role::Lines => RowKind::Multiline,
            Role::Selection => RowKind::Choice,
            Role::Branch { tabs: false } => RowKind::Choice,
            Role::Branch { tabs: true } => RowKind::Tabs,
            Role::Snippet(_) => RowKind::Snippets,
        }
    }
}

/// A condition a row needs to be shown.
#[derive(Debug, Clone)]
pub enum Gate {
    /// The header with this row id is expanded.
    Expanded(usize),
    /// The enable entry behind this switch is on.
    Enabled(Binding),
    /// The selector currently names `branch`.
    Branch { selector: Binding, branch: String },
}

#[derive(Debug, Clone)]
pub struct RowSpec {
    pub id: usize,
    pub role: Role,
    pub label: String,
    pub depth: usize,
    pub binding: Binding,
    /// Branch labels or snippet captions; selection options are read live.
    pub options: Vec<String>,
    pub gates: Vec<Gate>,
}

/// A visible row with its current value, ready for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    /// Index into [`FormRows::rows`]; callbacks carry it back.
    pub slot: usize,
    pub kind: RowKind,
    pub label: String,
    pub depth: usize,
    pub text: String,
    pub checked: bool,
    /// Selected option, `-1` for none.
    pub index: i32,
    pub options: Vec<String>,
    pub expanded: bool,
}

pub struct FormRows {
    rows: Vec<RowSpec>,
    collapsed: BTreeSet<usize>,
}

impl FormRows {
    pub fn build(form: &Form, shared: &SharedForm) -> Self {
        let rows = walk_form(form, shared, "", &mut RowVisitor::default());
        Self {
            rows,
            collapsed: BTreeSet::new(),
        }
    }

    pub fn rows(&self) -> &[RowSpec] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose gates all hold, with values read from the form now.
    pub fn view(&self) -> Vec<RowView> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.gates.iter().all(|gate| self.passes(gate)))
            .map(|(slot, row)| self.row_view(slot, row))
            .collect()
    }

    fn passes(&self, gate: &Gate) -> bool {
        match gate {
            Gate::Expanded(id) => !self.collapsed.contains(id),
            Gate::Enabled(switch) => switch
                .read(|slot| matches!(slot, SlotRef::Switch(true)))
                .unwrap_or(false),
            Gate::Branch { selector, branch } => selector
                .read(|slot| match slot {
                    SlotRef::Selector(branches) => branches.selected() == branch,
                    _ => false,
                })
                .unwrap_or(false),
        }
    }

    fn row_view(&self, slot: usize, row: &RowSpec) -> RowView {
        let mut view = RowView {
            slot,
            kind: row.role.kind(),
            label: row.label.clone(),
            depth: row.depth,
            text: String::new(),
            checked: false,
            index: -1,
            options: row.options.clone(),
            expanded: !self.collapsed.contains(&row.id),
        };

        match &row.role {
            Role::Note | Role::Header | Role::Snippet(_) => {}
            Role::Bool => {
                view.checked = row
                    .binding
                    .read(|slot| match slot {
                        SlotRef::Switch(on) => on,
                        SlotRef::Data(FormData::Bool(on)) => *on,
                        _ => false,
                    })
                    .unwrap_or(false);
            }
            Role::Number | Role::Text | Role::ComplexText => {
                view.text = row.binding.current_text().unwrap_or_default();
            }
            Role::Lines => {
                view.text = row
                    .binding
                    .read(|slot| match slot {
                        SlotRef::Data(FormData::StringSet(set)) => {
                            set.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
                        }
                        _ => String::new(),
                    })
                    .unwrap_or_default();
            }
            Role::Selection => {
                let current = row
                    .binding
                    .read(|slot| match slot {
                        SlotRef::Data(FormData::Selection(selection)) => Some((
                            selection.options().map(str::to_string).collect::<Vec<_>>(),
                            if selection.valid() {
                                selection.index as i32
                            } else {
                                -1
                            },
                        )),
                        _ => None,
                    })
                    .flatten();
                if let Some((options, index)) = current {
                    view.options = options;
                    view.index = index;
                }
            }
            Role::Branch { .. } => {
                let selected = row
                    .binding
                    .read(|slot| match slot {
                        SlotRef::Selector(branches) => branches.selected().to_string(),
                        _ => String::new(),
                    })
                    .unwrap_or_default();
                view.index = row
                    .options
                    .iter()
                    .position(|label| *label == selected)
                    .map_or(-1, |index| index as i32);
            }
        }

        view
    }

    pub fn toggle(&mut self, slot: usize, checked: bool) -> bool {
        match self.rows.get(slot) {
            Some(row) if row.role == Role::Bool => row.binding.apply(Edit::Bool(checked)),
            _ => false,
        }
    }

    pub fn edit_text(&mut self, slot: usize, text: &str) -> bool {
        let Some(row) = self.rows.get(slot) else {
            return false;
        };
        let edit = match row.role {
            Role::Number => Edit::Number(text.to_string()),
            Role::Text | Role::ComplexText => Edit::Text(text.to_string()),
            Role::Lines => Edit::Lines(text.lines().map(str::to_string).collect()),
            _ => return false,
        };
        row.binding.apply(edit)
    }

    pub fn choose(&mut self, slot: usize, index: usize) -> bool {
        let Some(row) = self.rows.get(slot) else {
            return false;
        };
        let edit = match &row.role {
            Role::Selection => Edit::Index(index),
            Role::Branch { .. } => match row.options.get(index) {
                Some(label) => Edit::Select(label.clone()),
                None => return false,
            },
            Role::Snippet(snippets) => match snippets.get(index) {
                Some((category, snippet)) => Edit::InsertSnippet {
                    category: category.clone(),
                    snippet: snippet.clone(),
                },
                None => return false,
            },
            _ => return false,
        };
        row.binding.apply(edit)
    }

    /// Flips a header between expanded and collapsed.
    pub fn toggle_header(&mut self, slot: usize) -> bool {
        let Some(row) = self.rows.get(slot).filter(|row| row.role == Role::Header) else {
            return false;
        };
        if !self.collapsed.remove(&row.id) {
            self.collapsed.insert(row.id);
        }
        true
    }
}

#[derive(Default)]
struct RowVisitor {
    next_id: usize,
}

impl RowVisitor {
    fn row(&mut self, role: Role, label: &str, binding: Binding) -> RowSpec {
        let id = self.next_id;
        self.next_id += 1;
        RowSpec {
            id,
            role,
            label: label.to_string(),
            depth: 0,
            binding,
            options: Vec::new(),
            gates: Vec::new(),
        }
    }

    fn leaf(&mut self, role: Role, field: &Field<'_>) -> Vec<RowSpec> {
        vec![self.row(role, field.label, field.binding.clone())]
    }
}

fn nest(rows: Vec<RowSpec>, gate: Option<Gate>) -> impl Iterator<Item = RowSpec> {
    rows.into_iter().map(move |mut row| {
        row.depth += 1;
        if let Some(gate) = &gate {
            row.gates.insert(0, gate.clone());
        }
        row
    })
}

impl FormVisitor for RowVisitor {
    type Unit = Vec<RowSpec>;

    fn empty(&mut self, field: &Field<'_>) -> Self::Unit {
        self.leaf(Role::Note, field)
    }

    fn boolean(&mut self, field: &Field<'_>, _value: bool) -> Self::Unit {
        self.leaf(Role::Bool, field)
    }

    fn number(&mut self, field: &Field<'_>, _value: &Number) -> Self::Unit {
        self.leaf(Role::Number, field)
    }

    fn text(&mut self, field: &Field<'_>, _value: &str) -> Self::Unit {
        self.leaf(Role::Text, field)
    }

    fn complex_text(&mut self, field: &Field<'_>, value: &ComplexString) -> Self::Unit {
        let mut rows = self.leaf(Role::ComplexText, field);

        let snippets: Vec<(String, String)> = value
            .snippets
            .iter()
            .flat_map(|(category, snippets)| {
                snippets
                    .iter()
                    .map(move |snippet| (category.clone(), snippet.clone()))
            })
            .collect();
        if !snippets.is_empty() {
            let captions = snippets
                .iter()
                .map(|(category, snippet)| format!("{category}: {snippet}"))
                .collect();
            let mut row = self.row(Role::Snippet(snippets), "Insert", field.binding.clone());
            row.options = captions;
            rows.push(row);
        }
        rows
    }

    fn string_set(&mut self, field: &Field<'_>, _value: &StringSet) -> Self::Unit {
        self.leaf(Role::Lines, field)
    }

    fn selection(&mut self, field: &Field<'_>, _value: &StringSelection) -> Self::Unit {
        self.leaf(Role::Selection, field)
    }

    fn string_map(&mut self, field: &Field<'_>, value: &StringMap) -> Self::Unit {
        let mut rows = self.leaf(Role::Note, field);
        let flags: Vec<RowSpec> = value
            .keys()
            .map(|key| {
                let binding = field.binding.child(Segment::Flag(key.clone()));
                self.row(Role::Bool, key, binding)
            })
            .collect();
        rows.extend(nest(flags, None));
        rows
    }

    fn group(&mut self, _field: &Field<'_>, children: Vec<Self::Unit>) -> Self::Unit {
        children.into_iter().flatten().collect()
    }

    fn expander(&mut self, field: &Field<'_>, body: Self::Unit) -> Self::Unit {
        let header = self.row(Role::Header, field.label, field.binding.clone());
        let gate = Gate::Expanded(header.id);
        std::iter::once(header).chain(nest(body, Some(gate))).collect()
    }

    fn enable_group(&mut self, _field: &Field<'_>, entries: Vec<EnableUnit<Self::Unit>>) -> Self::Unit {
        let mut rows = Vec::new();
        for entry in entries {
            let switch = self.row(Role::Bool, &entry.label, entry.toggle.clone());
            rows.push(switch);
            rows.extend(nest(entry.body, Some(Gate::Enabled(entry.toggle))));
        }
        rows
    }

    fn variant(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        _selected: &str,
        branches: Vec<BranchUnit<Self::Unit>>,
    ) -> Self::Unit {
        self.branches(field, selector, branches, false)
    }

    fn tabs(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        _selected: &str,
        tabs: Vec<BranchUnit<Self::Unit>>,
    ) -> Self::Unit {
        self.branches(field, selector, tabs, true)
    }
}

impl RowVisitor {
    fn branches(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        branches: Vec<BranchUnit<Vec<RowSpec>>>,
        tabs: bool,
    ) -> Vec<RowSpec> {
        let mut chooser = self.row(Role::Branch { tabs }, field.label, selector.clone());
        chooser.options = branches.iter().map(|branch| branch.label.clone()).collect();

        let mut rows = vec![chooser];
        for branch in branches {
            let gate = Gate::Branch {
                selector: selector.clone(),
                branch: branch.label,
            };
            rows.extend(nest(branch.body, Some(gate)));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formkit::{EnableForm, MultiForm, PayloadKind, Range, VariantForm, share, unshare};

    fn labels(rows: &FormRows) -> Vec<String> {
        rows.view()
            .iter()
            .map(|row| format!("{}{}", "  ".repeat(row.depth), row.label))
            .collect()
    }

    fn slot(rows: &FormRows, label: &str) -> usize {
        rows.view()
            .iter()
            .find(|row| row.label == label)
            .map(|row| row.slot)
            .unwrap_or_else(|| panic!("no visible row {label}"))
    }

    #[test]
    fn every_payload_kind_yields_rows() {
        let form: Form = PayloadKind::ALL
            .iter()
            .map(|kind| (format!("{kind:?}"), kind.placeholder()))
            .collect();
        let rows = FormRows::build(&form, &share(form.clone()));

        for kind in PayloadKind::ALL {
            let label = format!("{kind:?}");
            assert!(
                rows.rows().iter().any(|row| row.label == label),
                "no row for {label}"
            );
        }
    }

    #[test]
    fn collapsed_headers_hide_their_body() {
        let form = Form::new().with("outer", Form::new().with("inner", true));
        let mut rows = FormRows::build(&form, &share(form.clone()));
        assert_eq!(labels(&rows), ["outer", "  inner"]);

        let header = slot(&rows, "outer");
        assert!(rows.toggle_header(header));
        assert_eq!(labels(&rows), ["outer"]);
        assert!(!rows.view()[0].expanded);

        rows.toggle_header(header);
        assert_eq!(labels(&rows), ["outer", "  inner"]);
    }

    #[test]
    fn switches_and_selectors_gate_rows() {
        let form = Form::new()
            .with(
                "extras",
                EnableForm::new().with("shadow", false, Form::new().with("depth", "2")),
            )
            .with(
                "shape",
                VariantForm::new()
                    .with("cube", Form::new().with("size", "1"))
                    .with("ball", Form::new().with("radius", "r"))
                    .selecting("cube"),
            );
        let shared = share(form.clone());
        let mut rows = FormRows::build(&form, &shared);
        assert_eq!(
            labels(&rows),
            ["extras", "  shadow", "shape", "  size"]
        );

        assert!(rows.toggle(slot(&rows, "shadow"), true));
        let chooser = slot(&rows, "shape");
        let ball = rows.rows()[chooser]
            .options
            .iter()
            .position(|label| label == "ball")
            .expect("ball option");
        assert!(rows.choose(chooser, ball));
        assert_eq!(
            labels(&rows),
            ["extras", "  shadow", "    depth", "shape", "  radius"]
        );

        let edited = unshare(&shared);
        let Some(FormData::Variant(shape)) = edited.get("shape") else {
            panic!("expected a variant");
        };
        assert_eq!(shape.selected(), "ball");
    }

    #[test]
    fn tabs_render_as_a_tab_row() {
        let form = Form::new().with(
            "pages",
            MultiForm::new()
                .with("a", Form::new().with("x", true))
                .with("b", Form::new().with("y", true))
                .selecting("b"),
        );
        let rows = FormRows::build(&form, &share(form.clone()));
        let view = rows.view();
        assert_eq!(view[0].kind, RowKind::Tabs);
        assert_eq!(view[0].options, ["a", "b"]);
        assert_eq!(view[0].index, 1);
        assert_eq!(view[1].label, "y");
    }

    #[test]
    fn text_edits_follow_the_row_role() {
        let number = Number::from(Range::new(3_u8, 0, 9).expect("valid range"));
        let form = Form::new()
            .with("count", number)
            .with("tags", StringSet::new())
            .with(
                "body",
                ComplexString::new("hi").with_snippets("greeting", [" there"]),
            )
            .with("pick", StringSelection::from_options(["x", "y"], "y"));
        let shared = share(form.clone());
        let mut rows = FormRows::build(&form, &shared);

        let count = slot(&rows, "count");
        assert!(rows.edit_text(count, "7"));
        assert!(!rows.edit_text(count, "70"));
        let shown = rows.view().into_iter().find(|row| row.slot == count);
        assert_eq!(shown.map(|row| row.text), Some("7".to_string()));

        assert!(rows.edit_text(slot(&rows, "tags"), "a\nb\n"));
        assert!(rows.choose(slot(&rows, "Insert"), 0));
        assert!(!rows.choose(slot(&rows, "pick"), 5));

        let view = rows.view();
        let body = view.iter().find(|row| row.label == "body").expect("body row");
        assert_eq!(body.text, "hi there");
        let pick = view.iter().find(|row| row.label == "pick").expect("pick row");
        assert_eq!(pick.index, 1);
        assert_eq!(pick.options, ["x", "y"]);
        let tags = view.iter().find(|row| row.label == "tags").expect("tags row");
        assert_eq!(tags.text, "a\nb");
    }

    #[test]
    fn string_map_flags_are_indented_checks() {
        let mut map = StringMap::new();
        map.insert("bold".to_string(), true);
        map.insert("italic".to_string(), false);
        let form = Form::new().with("style", map);
        let shared = share(form.clone());
        let mut rows = FormRows::build(&form, &shared);

        assert_eq!(labels(&rows), ["style", "  bold", "  italic"]);
        assert!(rows.toggle(slot(&rows, "italic"), true));
        let view = rows.view();
        assert!(view.iter().filter(|row| row.kind == RowKind::Check).all(|row| row.checked));
    }
}
