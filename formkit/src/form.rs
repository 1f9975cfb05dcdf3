//! The recursive, self-describing form data model.
//!
//! A [`Form`] maps unique labels to [`FormData`] payloads. Every container is
//! keyed by label and iterates in label order. The tree is the live state of
//! a dialog: backends write edits straight into it through
//! [`FieldPath`](crate::FieldPath) handles, so nothing has to be copied back
//! when the dialog closes.

use crate::range::Number;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ordered set of unique strings, iterated lexicographically.
pub type StringSet = BTreeSet<String>;

/// Multi-select flags keyed by label.
pub type StringMap = BTreeMap<String, bool>;

/// Free text plus categories of snippets that can be inserted into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexString {
    pub text: String,
    pub snippets: BTreeMap<String, StringSet>,
}

impl ComplexString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            snippets: BTreeMap::new(),
        }
    }

    pub fn with_snippets<I, S>(mut self, category: impl Into<String>, snippets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.snippets
            .entry(category.into())
            .or_default()
            .extend(snippets.into_iter().map(Into::into));
        self
    }

    /// Appends `snippet` to the text. Only snippets offered under `category`
    /// are accepted.
    pub fn insert_snippet(&mut self, category: &str, snippet: &str) -> bool {
        let known = self
            .snippets
            .get(category)
            .is_some_and(|set| set.contains(snippet));

        if known {
            self.text.push_str(snippet);
        }

        known
    }
}

/// Single choice out of a [`StringSet`], by position in iteration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringSelection {
    pub set: StringSet,
    pub index: isize,
}

impl StringSelection {
    pub fn new(set: StringSet, index: isize) -> Self {
        Self { set, index }
    }

    /// Builds a selection pointing at `selected`, or an invalid one when
    /// `selected` is not among `options`.
    pub fn from_options<I, S>(options: I, selected: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: StringSet = options.into_iter().map(Into::into).collect();
        let index = set
            .iter()
            .position(|option| option == selected)
            .map_or(-1, |index| index as isize);
        Self { set, index }
    }

    pub fn valid(&self) -> bool {
        self.index >= 0 && (self.index as usize) < self.set.len()
    }

    pub fn selected(&self) -> Option<&str> {
        if !self.valid() {
            return None;
        }

        self.set.iter().nth(self.index as usize).map(String::as_str)
    }

    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.set.iter().map(String::as_str)
    }

    pub fn select_index(&mut self, index: usize) -> bool {
        if index < self.set.len() {
            self.index = index as isize;
            true
        } else {
            false
        }
    }

    pub fn select(&mut self, option: &str) -> bool {
        match self.set.iter().position(|candidate| candidate == option) {
            Some(index) => self.select_index(index),
            None => false,
        }
    }
}

/// The closed set of payload kinds a form node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadKind {
    Empty,
    Bool,
    Number,
    String,
    ComplexString,
    StringSet,
    Selection,
    StringMap,
    Struct,
    Enable,
    Variant,
    Multi,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 12] = [
        PayloadKind::Empty,
        PayloadKind::Bool,
        PayloadKind::Number,
        PayloadKind::String,
        PayloadKind::ComplexString,
        PayloadKind::StringSet,
        PayloadKind::Selection,
        PayloadKind::StringMap,
        PayloadKind::Struct,
        PayloadKind::Enable,
        PayloadKind::Variant,
        PayloadKind::Multi,
    ];

    /// A minimal payload of this kind.
    pub fn placeholder(self) -> FormData {
        match self {
            PayloadKind::Empty => FormData::Empty,
            PayloadKind::Bool => FormData::Bool(false),
            PayloadKind::Number => FormData::Number(Number::from(crate::Range::<i32>::default())),
            PayloadKind::String => FormData::String(String::new()),
            PayloadKind::ComplexString => FormData::ComplexString(ComplexString::default()),
            PayloadKind::StringSet => FormData::StringSet(StringSet::new()),
            PayloadKind::Selection => FormData::Selection(StringSelection::default()),
            PayloadKind::StringMap => FormData::StringMap(StringMap::new()),
            PayloadKind::Struct => FormData::Struct(Form::new()),
            PayloadKind::Enable => FormData::Enable(EnableForm::new()),
            PayloadKind::Variant => FormData::Variant(VariantForm::new()),
            PayloadKind::Multi => FormData::Multi(MultiForm::new()),
        }
    }
}

/// One node of a form tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FormData {
    #[default]
    Empty,
    Bool(bool),
    Number(Number),
    String(String),
    ComplexString(ComplexString),
    StringSet(StringSet),
    Selection(StringSelection),
    StringMap(StringMap),
    Struct(Form),
    Enable(EnableForm),
    Variant(VariantForm),
    Multi(MultiForm),
}

impl FormData {
    pub fn kind(&self) -> PayloadKind {
        match self {
            FormData::Empty => PayloadKind::Empty,
            FormData::Bool(_) => PayloadKind::Bool,
            FormData::Number(_) => PayloadKind::Number,
            FormData::String(_) => PayloadKind::String,
            FormData::ComplexString(_) => PayloadKind::ComplexString,
            FormData::StringSet(_) => PayloadKind::StringSet,
            FormData::Selection(_) => PayloadKind::Selection,
            FormData::StringMap(_) => PayloadKind::StringMap,
            FormData::Struct(_) => PayloadKind::Struct,
            FormData::Enable(_) => PayloadKind::Enable,
            FormData::Variant(_) => PayloadKind::Variant,
            FormData::Multi(_) => PayloadKind::Multi,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormData::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            FormData::Number(number) => Some(number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormData::String(text) => Some(text),
            FormData::ComplexString(complex) => Some(&complex.text),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&Form> {
        match self {
            FormData::Struct(form) => Some(form),
            _ => None,
        }
    }
}

impl From<bool> for FormData {
    fn from(value: bool) -> Self {
        FormData::Bool(value)
    }
}

impl From<Number> for FormData {
    fn from(value: Number) -> Self {
        FormData::Number(value)
    }
}

impl From<String> for FormData {
    fn from(value: String) -> Self {
        FormData::String(value)
    }
}

impl From<&str> for FormData {
    fn from(value: &str) -> Self {
        FormData::String(value.to_string())
    }
}

impl From<ComplexString> for FormData {
    fn from(value: ComplexString) -> Self {
        FormData::ComplexString(value)
    }
}

impl From<StringSet> for FormData {
    fn from(value: StringSet) -> Self {
        FormData::StringSet(value)
    }
}

impl From<StringSelection> for FormData {
    fn from(value: StringSelection) -> Self {
        FormData::Selection(value)
    }
}

impl From<StringMap> for FormData {
    fn from(value: StringMap) -> Self {
        FormData::StringMap(value)
    }
}

impl From<Form> for FormData {
    fn from(value: Form) -> Self {
        FormData::Struct(value)
    }
}

impl From<EnableForm> for FormData {
    fn from(value: EnableForm) -> Self {
        FormData::Enable(value)
    }
}

impl From<VariantForm> for FormData {
    fn from(value: VariantForm) -> Self {
        FormData::Variant(value)
    }
}

impl From<MultiForm> for FormData {
    fn from(value: MultiForm) -> Self {
        FormData::Multi(value)
    }
}

/// Label → payload mapping; the primary recursive node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Form {
    fields: BTreeMap<String, FormData>,
}

pub type StructForm = Form;

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, data: impl Into<FormData>) -> Self {
        self.insert(label, data);
        self
    }

    pub fn insert(&mut self, label: impl Into<String>, data: impl Into<FormData>) -> Option<FormData> {
        self.fields.insert(label.into(), data.into())
    }

    pub fn remove(&mut self, label: &str) -> Option<FormData> {
        self.fields.remove(label)
    }

    pub fn get(&self, label: &str) -> Option<&FormData> {
        self.fields.get(label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut FormData> {
        self.fields.get_mut(label)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormData)> {
        self.fields.iter().map(|(label, data)| (label.as_str(), data))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut FormData)> {
        self.fields
            .iter_mut()
            .map(|(label, data)| (label.as_str(), data))
    }
}

impl<K: Into<String>, V: Into<FormData>> FromIterator<(K, V)> for Form {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(label, data)| (label.into(), data.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnableEntry {
    pub enabled: bool,
    pub form: Form,
}

/// Entries that are individually switched on or off. Switching an entry off
/// only gates its subform; the subform keeps its values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnableForm {
    entries: BTreeMap<String, EnableEntry>,
}

impl EnableForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, enabled: bool, form: Form) -> Self {
        self.entries
            .insert(label.into(), EnableEntry { enabled, form });
        self
    }

    pub fn get(&self, label: &str) -> Option<&EnableEntry> {
        self.entries.get(label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut EnableEntry> {
        self.entries.get_mut(label)
    }

    pub fn is_enabled(&self, label: &str) -> bool {
        self.entries.get(label).is_some_and(|entry| entry.enabled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnableEntry)> {
        self.entries
            .iter()
            .map(|(label, entry)| (label.as_str(), entry))
    }
}

/// Labelled subforms with one of them selected. Shared by [`VariantForm`]
/// and [`MultiForm`], which differ only in how backends present them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branches {
    forms: BTreeMap<String, Form>,
    selected: String,
}

impl Branches {
    /// Adds a branch. The first branch added becomes the selection.
    pub fn insert(&mut self, label: impl Into<String>, form: Form) {
        let label = label.into();
        if self.selected.is_empty() {
            self.selected = label.clone();
        }
        self.forms.insert(label, form);
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Switches the selection. Unknown labels are refused.
    pub fn select(&mut self, label: &str) -> bool {
        if self.forms.contains_key(label) {
            self.selected = label.to_string();
            true
        } else {
            false
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.forms.keys().position(|label| *label == self.selected)
    }

    pub fn active(&self) -> Option<&Form> {
        self.forms.get(&self.selected)
    }

    pub fn active_mut(&mut self) -> Option<&mut Form> {
        self.forms.get_mut(&self.selected)
    }

    pub fn get(&self, label: &str) -> Option<&Form> {
        self.forms.get(label)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut Form> {
        self.forms.get_mut(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.forms.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Form)> {
        self.forms.iter().map(|(label, form)| (label.as_str(), form))
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

macro_rules! branches_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Branches);

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn with(mut self, label: impl Into<String>, form: Form) -> Self {
                self.0.insert(label, form);
                self
            }

            pub fn selecting(mut self, label: &str) -> Self {
                self.0.select(label);
                self
            }
        }

        impl std::ops::Deref for $name {
            type Target = Branches;

            fn deref(&self) -> &Branches {
                &self.0
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Branches {
                &mut self.0
            }
        }
    };
}

branches_newtype!(
    /// Mutually exclusive branches; only the selected one is live.
    VariantForm
);

branches_newtype!(
    /// Branches that coexist as tabs; `selected` is the foreground tab.
    MultiForm
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Range;

    #[test]
    fn selection_validity_tracks_index() {
        let mut selection = StringSelection::from_options(["b", "a", "c"], "b");
        assert!(selection.valid());
        assert_eq!(selection.index, 1);
        assert_eq!(selection.selected(), Some("b"));

        selection.index = 3;
        assert!(!selection.valid());
        assert_eq!(selection.selected(), None);

        selection.index = -1;
        assert!(!selection.valid());
    }

    #[test]
    fn selection_from_unknown_option_is_invalid() {
        let selection = StringSelection::from_options(["x", "y"], "z");
        assert!(!selection.valid());
    }

    #[test]
    fn selection_rejects_out_of_bounds_choice() {
        let mut selection = StringSelection::from_options(["x", "y"], "x");
        assert!(!selection.select_index(2));
        assert_eq!(selection.index, 0);
        assert!(selection.select("y"));
        assert_eq!(selection.index, 1);
    }

    #[test]
    fn form_iterates_in_label_order() {
        let form = Form::new()
            .with("zeta", true)
            .with("alpha", "text")
            .with("mid", FormData::Empty);

        let labels: Vec<&str> = form.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn branches_select_first_inserted_and_refuse_unknown() {
        let mut variant = VariantForm::new()
            .with("circle", Form::new().with("r", 1.5_f64.to_string()))
            .with("box", Form::new());

        assert_eq!(variant.selected(), "circle");
        assert!(!variant.select("triangle"));
        assert_eq!(variant.selected(), "circle");
        assert!(variant.select("box"));
        assert_eq!(variant.selected_index(), Some(0));
    }

    #[test]
    fn complex_string_only_inserts_offered_snippets() {
        let mut complex = ComplexString::new("Hello ")
            .with_snippets("names", ["{user}", "{host}"]);

        assert!(complex.insert_snippet("names", "{user}"));
        assert!(!complex.insert_snippet("names", "{path}"));
        assert!(!complex.insert_snippet("other", "{user}"));
        assert_eq!(complex.text, "Hello {user}");
    }

    #[test]
    fn every_kind_has_a_placeholder_of_that_kind() {
        for kind in PayloadKind::ALL {
            assert_eq!(kind.placeholder().kind(), kind);
        }
    }

    #[test]
    fn form_round_trips_through_json() {
        let form = Form::new()
            .with("count", Number::from(Range::new(3_u16, 0, 9).expect("valid range")))
            .with(
                "mode",
                VariantForm::new()
                    .with("fast", Form::new())
                    .with("slow", Form::new().with("delay", "5"))
                    .selecting("slow"),
            );

        let json = serde_json::to_string(&form).expect("serialize form");
        let back: Form = serde_json::from_str(&json).expect("deserialize form");
        assert_eq!(back, form);
    }
}
