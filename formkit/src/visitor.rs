//! Backend dispatch over form payloads.
//!
//! [`walk_form`] is the one depth-first driver. It tracks the current label,
//! builds the [`FieldPath`] of every node, applies the expander rule and
//! hands each node to a backend's [`FormVisitor`], which only has to build
//! widgets and wire their callbacks to the supplied [`Binding`].

use crate::edit::{Edit, SlotRef};
use crate::form::{ComplexString, Form, FormData, StringMap, StringSelection, StringSet};
use crate::path::{FieldPath, Segment};
use crate::range::Number;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// The live form a dialog edits. Widgets reach it through [`Binding`]s.
pub type SharedForm = Arc<Mutex<Form>>;

pub fn share(form: Form) -> SharedForm {
    Arc::new(Mutex::new(form))
}

/// Takes the form back out of a [`SharedForm`], leaving an empty one behind.
pub fn unshare(form: &SharedForm) -> Form {
    let mut guard = form.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *guard)
}

/// What a widget callback captures: the shared form plus the path of the slot
/// it edits.
#[derive(Clone)]
pub struct Binding {
    form: SharedForm,
    path: FieldPath,
}

impl Binding {
    pub fn new(form: SharedForm, path: FieldPath) -> Self {
        Self { form, path }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn form(&self) -> &SharedForm {
        &self.form
    }

    pub fn child(&self, segment: Segment) -> Self {
        Self {
            form: self.form.clone(),
            path: self.path.child(segment),
        }
    }

    /// Writes `edit` through the path. Rejections are logged and reported as
    /// `false`; the field keeps its previous value.
    pub fn apply(&self, edit: Edit) -> bool {
        let Ok(mut form) = self.form.lock() else {
            log::error!("form lock poisoned; dropping edit at {}", self.path);
            return false;
        };

        match form.apply(&self.path, edit) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("rejected edit: {err}");
                false
            }
        }
    }

    /// Reads the slot as it is now, e.g. to resync a widget after a rejection.
    pub fn read<R>(&self, read: impl FnOnce(SlotRef<'_>) -> R) -> Option<R> {
        let Ok(form) = self.form.lock() else {
            log::error!("form lock poisoned; cannot read {}", self.path);
            return None;
        };

        match form.slot(&self.path) {
            Ok(slot) => Some(read(slot)),
            Err(err) => {
                log::debug!("cannot read slot: {err}");
                None
            }
        }
    }

    /// Display text of the bound slot: numbers, strings and the text part of
    /// complex strings.
    pub fn current_text(&self) -> Option<String> {
        self.read(|slot| match slot {
            SlotRef::Data(FormData::Number(number)) => Some(number.to_string()),
            SlotRef::Data(data) => data.as_str().map(str::to_string),
            _ => None,
        })
        .flatten()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("path", &self.path).finish()
    }
}

/// The node being visited: its label and where edits go.
#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub label: &'a str,
    pub binding: Binding,
}

pub struct EnableUnit<U> {
    pub label: String,
    pub enabled: bool,
    pub toggle: Binding,
    pub body: U,
}

pub struct BranchUnit<U> {
    pub label: String,
    pub body: U,
}

/// Widget-construction primitives one backend supplies.
///
/// Each method returns the backend's visual unit for one node. Composite
/// methods receive their children already built.
pub trait FormVisitor {
    type Unit;

    fn empty(&mut self, field: &Field<'_>) -> Self::Unit;
    fn boolean(&mut self, field: &Field<'_>, value: bool) -> Self::Unit;
    fn number(&mut self, field: &Field<'_>, value: &Number) -> Self::Unit;
    fn text(&mut self, field: &Field<'_>, value: &str) -> Self::Unit;
    fn complex_text(&mut self, field: &Field<'_>, value: &ComplexString) -> Self::Unit;
    fn string_set(&mut self, field: &Field<'_>, value: &StringSet) -> Self::Unit;

    /// Must leave every option unselected when `value` is not valid.
    fn selection(&mut self, field: &Field<'_>, value: &StringSelection) -> Self::Unit;

    fn string_map(&mut self, field: &Field<'_>, value: &StringMap) -> Self::Unit;
    fn group(&mut self, field: &Field<'_>, children: Vec<Self::Unit>) -> Self::Unit;
    fn expander(&mut self, field: &Field<'_>, body: Self::Unit) -> Self::Unit;

    fn enable_group(
        &mut self,
        field: &Field<'_>,
        entries: Vec<EnableUnit<Self::Unit>>,
    ) -> Self::Unit;

    /// Exactly one branch is shown: the one named `selected`.
    fn variant(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        selected: &str,
        branches: Vec<BranchUnit<Self::Unit>>,
    ) -> Self::Unit;

    fn tabs(
        &mut self,
        field: &Field<'_>,
        selector: Binding,
        selected: &str,
        tabs: Vec<BranchUnit<Self::Unit>>,
    ) -> Self::Unit;
}

/// Visits `form` depth-first. A non-empty `label` puts the whole form behind
/// an expander; an empty one renders it flat.
pub fn walk_form<V: FormVisitor>(
    form: &Form,
    shared: &SharedForm,
    label: &str,
    visitor: &mut V,
) -> V::Unit {
    let mut walker = Walker {
        visitor,
        shared,
        label: label.to_string(),
    };
    walker.structure(form, FieldPath::root())
}

struct Walker<'v, V> {
    visitor: &'v mut V,
    shared: &'v SharedForm,
    label: String,
}

impl<V: FormVisitor> Walker<'_, V> {
    fn binding(&self, path: FieldPath) -> Binding {
        Binding::new(self.shared.clone(), path)
    }

    fn structure(&mut self, form: &Form, path: FieldPath) -> V::Unit {
        let label = std::mem::take(&mut self.label);
        let children = self.children(form, &path);
        let field = Field {
            label: &label,
            binding: self.binding(path),
        };
        let unit = self.visitor.group(&field, children);

        if label.is_empty() {
            unit
        } else {
            self.visitor.expander(&field, unit)
        }
    }

    fn children(&mut self, form: &Form, path: &FieldPath) -> Vec<V::Unit> {
        let mut units = Vec::with_capacity(form.len());

        for (label, data) in form.iter() {
            self.label = label.to_string();
            units.push(self.data(data, path.key(label)));
        }

        self.label.clear();
        units
    }

    fn data(&mut self, data: &FormData, path: FieldPath) -> V::Unit {
        let label = std::mem::take(&mut self.label);
        let field = Field {
            label: &label,
            binding: self.binding(path.clone()),
        };

        match data {
            FormData::Empty => self.visitor.empty(&field),
            FormData::Bool(value) => self.visitor.boolean(&field, *value),
            FormData::Number(number) => self.visitor.number(&field, number),
            FormData::String(text) => self.visitor.text(&field, text),
            FormData::ComplexString(complex) => self.visitor.complex_text(&field, complex),
            FormData::StringSet(set) => self.visitor.string_set(&field, set),
            FormData::Selection(selection) => self.visitor.selection(&field, selection),
            FormData::StringMap(map) => self.visitor.string_map(&field, map),
            FormData::Struct(form) => {
                self.label = label;
                self.structure(form, path)
            }
            FormData::Enable(enable) => {
                let mut entries = Vec::with_capacity(enable.len());
                for (entry_label, entry) in enable.iter() {
                    let body = self.structure(&entry.form, path.key(entry_label));
                    entries.push(EnableUnit {
                        label: entry_label.to_string(),
                        enabled: entry.enabled,
                        toggle: self.binding(path.enabled(entry_label)),
                        body,
                    });
                }

                let unit = self.visitor.enable_group(&field, entries);
                if label.is_empty() {
                    unit
                } else {
                    self.visitor.expander(&field, unit)
                }
            }
            FormData::Variant(variant) => {
                let branches = self.branches(variant.iter(), &path);
                let selector = self.binding(path.selector());
                self.visitor
                    .variant(&field, selector, variant.selected(), branches)
            }
            FormData::Multi(multi) => {
                let tabs = self.branches(multi.iter(), &path);
                let selector = self.binding(path.selector());
                self.visitor.tabs(&field, selector, multi.selected(), tabs)
            }
        }
    }

    fn branches<'f>(
        &mut self,
        forms: impl Iterator<Item = (&'f str, &'f Form)>,
        path: &FieldPath,
    ) -> Vec<BranchUnit<V::Unit>> {
        forms
            .map(|(label, form)| BranchUnit {
                label: label.to_string(),
                body: self.structure(form, path.key(label)),
            })
            .collect()
    }
}
