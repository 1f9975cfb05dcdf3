//! View → model writes, resolved through a [`FieldPath`] at call time.

use crate::error::FormError;
use crate::form::{Branches, Form, FormData};
use crate::path::{FieldPath, Segment};

/// A change a widget reports for the slot it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Bool fields, enable switches and string-map flags.
    Bool(bool),
    /// Raw text for a bounded number; parsed at the number's own width.
    Number(String),
    /// Plain text, or the text part of a complex string.
    Text(String),
    /// Replacement contents for a string set, one entry per line.
    Lines(Vec<String>),
    /// Position in a selection's option order.
    Index(usize),
    /// Branch or tab label for a variant/multi selector.
    Select(String),
    InsertSnippet { category: String, snippet: String },
}

impl Edit {
    pub fn name(&self) -> &'static str {
        match self {
            Edit::Bool(_) => "bool",
            Edit::Number(_) => "number",
            Edit::Text(_) => "text",
            Edit::Lines(_) => "lines",
            Edit::Index(_) => "index",
            Edit::Select(_) => "select",
            Edit::InsertSnippet { .. } => "insert-snippet",
        }
    }
}

/// Mutable view of the slot a path resolves to.
pub enum Slot<'a> {
    Data(&'a mut FormData),
    Switch(&'a mut bool),
    Selector(&'a mut Branches),
}

/// Shared view of the slot a path resolves to.
#[derive(Debug, Clone, Copy)]
pub enum SlotRef<'a> {
    Data(&'a FormData),
    Switch(bool),
    Selector(&'a Branches),
}

enum Cursor<'a> {
    Form(&'a mut Form),
    Data(&'a mut FormData),
}

enum CursorRef<'a> {
    Form(&'a Form),
    Data(&'a FormData),
}

impl Form {
    pub fn slot_mut(&mut self, path: &FieldPath) -> Result<Slot<'_>, FormError> {
        let segments = path.segments();
        let mut cursor = Cursor::Form(self);

        for (position, segment) in segments.iter().enumerate() {
            let last = position + 1 == segments.len();
            let unknown = || FormError::UnknownField(path.clone());

            cursor = match (cursor, segment, last) {
                (Cursor::Form(form), Segment::Key(label), _) => {
                    Cursor::Data(form.get_mut(label).ok_or_else(unknown)?)
                }
                (Cursor::Data(FormData::Struct(form)), Segment::Key(label), _) => {
                    Cursor::Data(form.get_mut(label).ok_or_else(unknown)?)
                }
                (Cursor::Data(FormData::Enable(enable)), Segment::Key(label), _) => {
                    Cursor::Form(&mut enable.get_mut(label).ok_or_else(unknown)?.form)
                }
                (Cursor::Data(FormData::Enable(enable)), Segment::Enabled(label), true) => {
                    let entry = enable.get_mut(label).ok_or_else(unknown)?;
                    return Ok(Slot::Switch(&mut entry.enabled));
                }
                (Cursor::Data(FormData::Variant(variant)), Segment::Key(label), _) => {
                    Cursor::Form(variant.get_mut(label).ok_or_else(unknown)?)
                }
                (Cursor::Data(FormData::Multi(multi)), Segment::Key(label), _) => {
                    Cursor::Form(multi.get_mut(label).ok_or_else(unknown)?)
                }
                (Cursor::Data(FormData::Variant(variant)), Segment::Selector, true) => {
                    return Ok(Slot::Selector(variant));
                }
                (Cursor::Data(FormData::Multi(multi)), Segment::Selector, true) => {
                    return Ok(Slot::Selector(multi));
                }
                (Cursor::Data(FormData::StringMap(map)), Segment::Flag(key), true) => {
                    return Ok(Slot::Switch(map.get_mut(key).ok_or_else(unknown)?));
                }
                _ => return Err(FormError::NotEditable(path.clone())),
            };
        }

        match cursor {
            Cursor::Data(data) => Ok(Slot::Data(data)),
            Cursor::Form(_) => Err(FormError::NotEditable(path.clone())),
        }
    }

    pub fn slot(&self, path: &FieldPath) -> Result<SlotRef<'_>, FormError> {
        let segments = path.segments();
        let mut cursor = CursorRef::Form(self);

        for (position, segment) in segments.iter().enumerate() {
            let last = position + 1 == segments.len();
            let unknown = || FormError::UnknownField(path.clone());

            cursor = match (cursor, segment) {
                (CursorRef::Form(form), Segment::Key(label)) => {
                    CursorRef::Data(form.get(label).ok_or_else(unknown)?)
                }
                (CursorRef::Data(FormData::Struct(form)), Segment::Key(label)) => {
                    CursorRef::Data(form.get(label).ok_or_else(unknown)?)
                }
                (CursorRef::Data(FormData::Enable(enable)), Segment::Key(label)) => {
                    CursorRef::Form(&enable.get(label).ok_or_else(unknown)?.form)
                }
                (CursorRef::Data(FormData::Enable(enable)), Segment::Enabled(label)) if last => {
                    let entry = enable.get(label).ok_or_else(unknown)?;
                    return Ok(SlotRef::Switch(entry.enabled));
                }
                (CursorRef::Data(FormData::Variant(variant)), Segment::Key(label)) => {
                    CursorRef::Form(variant.get(label).ok_or_else(unknown)?)
                }
                (CursorRef::Data(FormData::Multi(multi)), Segment::Key(label)) => {
                    CursorRef::Form(multi.get(label).ok_or_else(unknown)?)
                }
                (CursorRef::Data(FormData::Variant(variant)), Segment::Selector) if last => {
                    return Ok(SlotRef::Selector(variant));
                }
                (CursorRef::Data(FormData::Multi(multi)), Segment::Selector) if last => {
                    return Ok(SlotRef::Selector(multi));
                }
                (CursorRef::Data(FormData::StringMap(map)), Segment::Flag(key)) if last => {
                    return Ok(SlotRef::Switch(*map.get(key).ok_or_else(unknown)?));
                }
                _ => return Err(FormError::NotEditable(path.clone())),
            };
        }

        match cursor {
            CursorRef::Data(data) => Ok(SlotRef::Data(data)),
            CursorRef::Form(_) => Err(FormError::NotEditable(path.clone())),
        }
    }

    /// Writes `edit` into the slot at `path`. Rejected edits leave the slot
    /// untouched.
    pub fn apply(&mut self, path: &FieldPath, edit: Edit) -> Result<(), FormError> {
        let slot = self.slot_mut(path)?;

        match (slot, edit) {
            (Slot::Switch(flag), Edit::Bool(value)) => *flag = value,
            (Slot::Data(FormData::Bool(flag)), Edit::Bool(value)) => *flag = value,
            (Slot::Data(FormData::Number(number)), Edit::Number(text)) => {
                if !number.set_from_str(&text) {
                    return Err(FormError::OutOfRange {
                        path: path.clone(),
                        value: text,
                    });
                }
            }
            (Slot::Data(FormData::String(current)), Edit::Text(text)) => *current = text,
            (Slot::Data(FormData::ComplexString(complex)), Edit::Text(text)) => {
                complex.text = text;
            }
            (
                Slot::Data(FormData::ComplexString(complex)),
                Edit::InsertSnippet { category, snippet },
            ) => {
                if !complex.insert_snippet(&category, &snippet) {
                    return Err(FormError::InvalidChoice {
                        path: path.clone(),
                        choice: format!("{category}: {snippet}"),
                    });
                }
            }
            (Slot::Data(FormData::StringSet(set)), Edit::Lines(lines)) => {
                *set = lines
                    .iter()
                    .map(|line| line.trim())
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            (Slot::Data(FormData::Selection(selection)), Edit::Index(index)) => {
                if !selection.select_index(index) {
                    return Err(FormError::InvalidChoice {
                        path: path.clone(),
                        choice: index.to_string(),
                    });
                }
            }
            (Slot::Selector(branches), Edit::Select(label)) => {
                if !branches.select(&label) {
                    return Err(FormError::InvalidChoice {
                        path: path.clone(),
                        choice: label,
                    });
                }
            }
            (_, edit) => {
                return Err(FormError::Mismatch {
                    path: path.clone(),
                    edit: edit.name(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{EnableForm, MultiForm, StringMap, StringSelection, VariantForm};
    use crate::range::{Number, Range};

    fn sample() -> Form {
        Form::new()
            .with("name", "ada")
            .with("age", Number::from(Range::new(30_u8, 0, 130).expect("valid range")))
            .with(
                "colors",
                StringSelection::from_options(["red", "green", "blue"], "green"),
            )
            .with(
                "flags",
                StringMap::from([("a".to_string(), false), ("b".to_string(), true)]),
            )
            .with(
                "extras",
                EnableForm::new().with("proxy", false, Form::new().with("host", "localhost")),
            )
            .with(
                "shape",
                VariantForm::new()
                    .with("circle", Form::new().with("radius", "1"))
                    .with("square", Form::new().with("side", "2")),
            )
            .with(
                "tabs",
                MultiForm::new().with("one", Form::new().with("x", true)),
            )
    }

    #[test]
    fn edits_land_in_the_addressed_field_only() {
        let mut form = sample();
        let root = FieldPath::root();

        form.apply(&root.key("name"), Edit::Text("grace".into()))
            .expect("text edit");
        form.apply(&root.key("age"), Edit::Number("42".into()))
            .expect("number edit");
        form.apply(&root.key("flags").flag("a"), Edit::Bool(true))
            .expect("flag edit");

        assert_eq!(form.get("name").and_then(FormData::as_str), Some("grace"));
        assert_eq!(
            form.get("age").and_then(FormData::as_number).map(Number::as_f64),
            Some(42.0)
        );
        match form.get("flags") {
            Some(FormData::StringMap(map)) => {
                assert_eq!(map.get("a"), Some(&true));
                assert_eq!(map.get("b"), Some(&true));
            }
            other => panic!("expected string map, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_number_is_rejected_and_kept() {
        let mut form = sample();
        let path = FieldPath::root().key("age");

        let err = form
            .apply(&path, Edit::Number("131".into()))
            .expect_err("out of range");
        assert!(matches!(err, FormError::OutOfRange { .. }));
        assert_eq!(
            form.get("age").and_then(FormData::as_number).map(Number::as_f64),
            Some(30.0)
        );
    }

    #[test]
    fn nested_paths_reach_enable_and_variant_children() {
        let mut form = sample();
        let root = FieldPath::root();

        form.apply(&root.key("extras").enabled("proxy"), Edit::Bool(true))
            .expect("enable switch");
        form.apply(
            &root.key("extras").key("proxy").key("host"),
            Edit::Text("example.org".into()),
        )
        .expect("enable child edit");
        form.apply(&root.key("shape").selector(), Edit::Select("square".into()))
            .expect("variant select");
        form.apply(
            &root.key("tabs").key("one").key("x"),
            Edit::Bool(false),
        )
        .expect("tab child edit");

        match form.slot(&root.key("extras").enabled("proxy")) {
            Ok(SlotRef::Switch(enabled)) => assert!(enabled),
            _ => panic!("expected switch slot"),
        }
        match form.slot(&root.key("shape").selector()) {
            Ok(SlotRef::Selector(branches)) => assert_eq!(branches.selected(), "square"),
            _ => panic!("expected selector slot"),
        }
        match form.slot(&root.key("extras").key("proxy").key("host")) {
            Ok(SlotRef::Data(data)) => assert_eq!(data.as_str(), Some("example.org")),
            _ => panic!("expected data slot"),
        }
    }

    #[test]
    fn mismatched_or_unknown_targets_fail() {
        let mut form = sample();
        let root = FieldPath::root();

        assert!(matches!(
            form.apply(&root.key("name"), Edit::Bool(true)),
            Err(FormError::Mismatch { .. })
        ));
        assert!(matches!(
            form.apply(&root.key("missing"), Edit::Bool(true)),
            Err(FormError::UnknownField(_))
        ));
        assert!(matches!(
            form.apply(&root.key("shape").selector(), Edit::Select("hexagon".into())),
            Err(FormError::InvalidChoice { .. })
        ));
        assert!(matches!(
            form.apply(&root.key("name").selector(), Edit::Select("x".into())),
            Err(FormError::NotEditable(_))
        ));
        assert!(matches!(form.slot(&root), Err(FormError::NotEditable(_))));
    }

    #[test]
    fn string_set_edit_drops_blank_lines() {
        let mut form = Form::new().with("tags", crate::form::StringSet::new());
        form.apply(
            &FieldPath::root().key("tags"),
            Edit::Lines(vec![" b ".into(), "".into(), "a".into(), "b".into()]),
        )
        .expect("lines edit");

        match form.get("tags") {
            Some(FormData::StringSet(set)) => {
                let items: Vec<&str> = set.iter().map(String::as_str).collect();
                assert_eq!(items, ["a", "b"]);
            }
            other => panic!("expected string set, got {other:?}"),
        }
    }

    #[test]
    fn selection_index_edit_validates_bounds() {
        let mut form = sample();
        let path = FieldPath::root().key("colors");
        assert!(form.apply(&path, Edit::Index(3)).is_err());
        form.apply(&path, Edit::Index(0)).expect("valid index");

        match form.get("colors") {
            Some(FormData::Selection(selection)) => assert_eq!(selection.selected(), Some("blue")),
            other => panic!("expected selection, got {other:?}"),
        }
    }
}
