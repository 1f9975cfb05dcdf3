//! Builds DOM subtrees for form nodes.
//!
//! Every control carries a `data-path` attribute with the field path it
//! edits, and its handler writes through the matching [`Binding`]. Rejected
//! edits put the control back to the model's current value.

use crate::document::{Dom, NodeId};
use crate::protocol::HostEvent;
use formkit::{
    Binding, BranchUnit, ComplexString, Edit, EnableUnit, Field, FormVisitor, Number, Segment,
    SlotRef, StringMap, StringSelection, StringSet,
};

pub const PATH_ATTR: &str = "data-path";

pub struct DomVisitor {
    dom: Dom,
}

impl DomVisitor {
    pub fn new(dom: Dom) -> Self {
        Self { dom }
    }

    fn bound(&self, tag: &str, binding: &Binding) -> NodeId {
        let id = self.dom.create(tag);
        self.dom.set_attr(id, PATH_ATTR, binding.path().to_string());
        id
    }

    /// Wraps `control` in a `div.field` with a leading `<label>`.
    fn labelled(&self, label: &str, control: NodeId) -> NodeId {
        let wrapper = self.dom.create("div");
        self.dom.set_attr(wrapper, "class", "field");
        if !label.is_empty() {
            let caption = self.dom.create_in(wrapper, "label");
            self.dom.set_text(caption, label);
        }
        self.dom.append(wrapper, control);
        wrapper
    }

    fn checkbox(&self, label: &str, checked: bool, binding: Binding) -> NodeId {
        let wrapper = self.dom.create("label");
        let input = self.bound("input", &binding);
        self.dom.set_attr(input, "type", "checkbox");
        self.dom.set_checked(input, checked);
        self.dom.append(wrapper, input);
        let caption = self.dom.create_in(wrapper, "span");
        self.dom.set_text(caption, label);

        self.dom.on(input, move |dom, event| {
            if let HostEvent::Toggle { checked, .. } = event {
                if !binding.apply(Edit::Bool(*checked)) {
                    dom.set_checked(input, !*checked);
                }
            }
        });
        wrapper
    }

    /// Text-like input that writes `edit(value)` and resyncs on rejection.
    fn text_input(
        &self,
        tag: &str,
        binding: Binding,
        value: &str,
        edit: fn(&str) -> Edit,
    ) -> NodeId {
        let input = self.bound(tag, &binding);
        self.dom.set_value(input, value);
        self.dom.on(input, move |dom, event| {
            if let HostEvent::Input { value, .. } = event {
                if !binding.apply(edit(value)) {
                    if let Some(current) = binding.current_text() {
                        dom.set_value(input, current);
                    }
                }
            }
        });
        input
    }

    /// Shows the body whose label is `selected` and hides the others.
    fn reveal(dom: &Dom, bodies: &[(String, NodeId)], selected: &str) {
        for (label, body) in bodies {
            dom.set_hidden(*body, label != selected);
        }
    }

    fn branch_bodies(&self, container: NodeId, branches: Vec<BranchUnit<NodeId>>) -> Vec<(String, NodeId)> {
        branches
            .into_iter()
            .map(|branch| {
                let page = self.dom.create_in(container, "div");
                self.dom.set_attr(page, "class", "branch");
                self.dom.set_attr(page, "data-branch", branch.label.as_str());
                self.dom.append(page, branch.body);
                (branch.label, page)
            })
            .collect()
    }
}

impl FormVisitor for DomVisitor {
    type Unit = NodeId;

    fn empty(&mut self, field: &Field<'_>) -> NodeId {
        let id = self.bound("div", &field.binding);
        self.dom.set_attr(id, "class", "empty");
        id
    }

    fn boolean(&mut self, field: &Field<'_>, value: bool) -> NodeId {
        self.checkbox(field.label, value, field.binding.clone())
    }

    fn number(&mut self, field: &Field<'_>, value: &Number) -> NodeId {
        let input = self.text_input("input", field.binding.clone(), &value.to_string(), |text| {
            Edit::Number(text.to_string())
        });
        let (min, max) = value.min_max_f64();
        self.dom.set_attr(input, "type", "number");
        self.dom.set_attr(input, "min", min.to_string());
        self.dom.set_attr(input, "max", max.to_string());
        self.dom.set_attr(input, "step", if value.is_integer() { "1" } else { "any" });
        self.labelled(field.label, input)
    }

    fn text(&mut self, field: &Field<'_>, value: &str) -> NodeId {
        let input = self.text_input("input", field.binding.clone(), value, |text| {
            Edit::Text(text.to_string())
        });
        self.dom.set_attr(input, "type", "text");
        self.labelled(field.label, input)
    }

    fn complex_text(&mut self, field: &Field<'_>, value: &ComplexString) -> NodeId {
        let input = self.text_input("textarea", field.binding.clone(), &value.text, |text| {
            Edit::Text(text.to_string())
        });
        let wrapper = self.labelled(field.label, input);

        for (category, snippets) in &value.snippets {
            let row = self.dom.create_in(wrapper, "div");
            self.dom.set_attr(row, "class", "snippets");
            let caption = self.dom.create_in(row, "span");
            self.dom.set_text(caption, category.as_str());

            for snippet in snippets {
                let button = self.dom.create_in(row, "button");
                self.dom.set_text(button, snippet.as_str());
                let binding = field.binding.clone();
                let edit = Edit::InsertSnippet {
                    category: category.clone(),
                    snippet: snippet.clone(),
                };
                self.dom.on(button, move |dom, event| {
                    if matches!(event, HostEvent::Click { .. }) && binding.apply(edit.clone()) {
                        if let Some(text) = binding.current_text() {
                            dom.set_value(input, text);
                        }
                    }
                });
            }
        }

        wrapper
    }

    fn string_set(&mut self, field: &Field<'_>, value: &StringSet) -> NodeId {
        let lines = value.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
        let input = self.text_input("textarea", field.binding.clone(), &lines, |text| {
            Edit::Lines(text.lines().map(str::to_string).collect())
        });
        self.labelled(field.label, input)
    }

    fn selection(&mut self, field: &Field<'_>, value: &StringSelection) -> NodeId {
        let select = self.bound("select", &field.binding);
        let selected = value.valid().then_some(value.index as usize);

        for (index, option) in value.options().enumerate() {
            let node = self.dom.create_in(select, "option");
            self.dom.set_attr(node, "value", index.to_string());
            self.dom.set_text(node, option);
            if selected == Some(index) {
                self.dom.set_attr(node, "selected", "");
            }
        }
        self.dom.set_value(
            select,
            selected.map(|index| index.to_string()).unwrap_or_default(),
        );

        let binding = field.binding.clone();
        self.dom.on(select, move |_, event| {
            if let HostEvent::Input { value, .. } = event {
                match value.parse::<usize>() {
                    Ok(index) => {
                        binding.apply(Edit::Index(index));
                    }
                    Err(_) => log::debug!("selection value {value:?} is not an index"),
                }
            }
        });
        self.labelled(field.label, select)
    }

    fn string_map(&mut self, field: &Field<'_>, value: &StringMap) -> NodeId {
        let fieldset = self.bound("fieldset", &field.binding);
        if !field.label.is_empty() {
            let legend = self.dom.create_in(fieldset, "legend");
            self.dom.set_text(legend, field.label);
        }

        for (key, checked) in value {
            let flag = field.binding.child(Segment::Flag(key.clone()));
            let checkbox = self.checkbox(key, *checked, flag);
            self.dom.append(fieldset, checkbox);
        }
        fieldset
    }

    fn group(&mut self, field: &Field<'_>, children: Vec<NodeId>) -> NodeId {
        let group = self.bound("div", &field.binding);
        self.dom.set_attr(group, "class", "group");
        for child in children {
            self.dom.append(group, child);
        }
        group
    }

    fn expander(&mut self, field: &Field<'_>, body: NodeId) -> NodeId {
        let details = self.dom.create("details");
        let summary = self.dom.create_in(details, "summary");
        self.dom.set_text(summary, field.label);
        self.dom.append(details, body);
        details
    }

    fn enable_group(&mut self, field: &Field<'_>, entries: Vec<EnableUnit<NodeId>>) -> NodeId {
        let container = self.bound("div", &field.binding);
        self.dom.set_attr(container, "class", "enable");

        for entry in entries {
            let row = self.dom.create_in(container, "div");
            let toggle = self.bound("input", &entry.toggle);
            let caption = self.dom.create("label");
            self.dom.append(caption, toggle);
            let text = self.dom.create_in(caption, "span");
            self.dom.set_text(text, entry.label.as_str());
            self.dom.append(row, caption);
            self.dom.set_attr(toggle, "type", "checkbox");
            self.dom.set_checked(toggle, entry.enabled);

            let body = entry.body;
            self.dom.append(row, body);
            self.dom.set_hidden(body, !entry.enabled);

            let binding = entry.toggle;
            self.dom.on(toggle, move |dom, event| {
                if let HostEvent::Toggle { checked, .. } = event {
                    if binding.apply(Edit::Bool(*checked)) {
                        dom.set_hidden(body, !*checked);
                    } else {
                        dom.set_checked(toggle, !*checked);
                    }
                }
            });
        }

        container
    }

    fn variant(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        selected: &str,
        branches: Vec<BranchUnit<NodeId>>,
    ) -> NodeId {
        let container = self.bound("div", &field.binding);
        self.dom.set_attr(container, "class", "variant");

        let chooser = self.bound("select", &selector);
        for branch in &branches {
            let option = self.dom.create_in(chooser, "option");
            self.dom.set_attr(option, "value", branch.label.as_str());
            self.dom.set_text(option, branch.label.as_str());
        }
        self.dom.set_value(chooser, selected);
        let chooser_row = self.labelled(field.label, chooser);
        self.dom.append(container, chooser_row);

        let bodies = self.branch_bodies(container, branches);
        Self::reveal(&self.dom, &bodies, selected);

        self.dom.on(chooser, move |dom, event| {
            let HostEvent::Input { value, .. } = event else {
                return;
            };
            if selector.apply(Edit::Select(value.clone())) {
                Self::reveal(dom, &bodies, value);
                return;
            }

            let current = selector
                .read(|slot| match slot {
                    SlotRef::Selector(branches) => Some(branches.selected().to_string()),
                    _ => None,
                })
                .flatten();
            if let Some(current) = current {
                dom.set_value(chooser, current);
            }
        });

        container
    }

    fn tabs(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        selected: &str,
        tabs: Vec<BranchUnit<NodeId>>,
    ) -> NodeId {
        let container = self.bound("div", &field.binding);
        self.dom.set_attr(container, "class", "tabs");
        if !field.label.is_empty() {
            let heading = self.dom.create_in(container, "h3");
            self.dom.set_text(heading, field.label);
        }

        let bar = self.bound("div", &selector);
        self.dom.set_attr(bar, "role", "tablist");
        self.dom.append(container, bar);

        let buttons: Vec<(String, NodeId)> = tabs
            .iter()
            .map(|tab| {
                let button = self.dom.create_in(bar, "button");
                self.dom.set_attr(button, "role", "tab");
                self.dom.set_text(button, tab.label.as_str());
                (tab.label.clone(), button)
            })
            .collect();
        let pages = self.branch_bodies(container, tabs);
        Self::reveal(&self.dom, &pages, selected);
        for (label, button) in &buttons {
            self.dom
                .set_attr(*button, "aria-selected", (label == selected).to_string());
        }

        for (label, button) in buttons.clone() {
            let selector = selector.clone();
            let pages = pages.clone();
            let buttons = buttons.clone();
            self.dom.on(button, move |dom, event| {
                if !matches!(event, HostEvent::Click { .. }) {
                    return;
                }
                if selector.apply(Edit::Select(label.clone())) {
                    Self::reveal(dom, &pages, &label);
                    for (other, tab) in &buttons {
                        dom.set_attr(*tab, "aria-selected", (*other == label).to_string());
                    }
                }
            });
        }

        container
    }
}
