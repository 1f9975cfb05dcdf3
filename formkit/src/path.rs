use crate::error::FormError;
use std::fmt;
use std::str::FromStr;

const ENABLED_MARKER: &str = "@enabled:";
const FLAG_MARKER: &str = "@flag:";
const SELECTOR_MARKER: &str = "@selected";

/// One step from a form node towards an editable slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A struct child, an enable entry's subform, a branch or a tab.
    Key(String),
    /// The switch of an enable entry.
    Enabled(String),
    /// The `selected` label of a variant or multi form.
    Selector,
    /// One flag of a string map.
    Flag(String),
}

impl Segment {
    fn is_terminal(&self) -> bool {
        !matches!(self, Segment::Key(_))
    }
}

/// Address of one slot inside a [`Form`](crate::Form), resolved each time it
/// is used so the tree can move freely while widgets hold the path.
///
/// Renders like a JSON pointer: `/outer/inner`, with `~0` for `~`, `~1` for
/// `/` and `~2` for `@` inside labels, plus `@enabled:x`, `@flag:x` and
/// `@selected` for the non-key segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn key(&self, label: impl Into<String>) -> Self {
        self.child(Segment::Key(label.into()))
    }

    pub fn enabled(&self, label: impl Into<String>) -> Self {
        self.child(Segment::Enabled(label.into()))
    }

    pub fn flag(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Flag(key.into()))
    }

    pub fn selector(&self) -> Self {
        self.child(Segment::Selector)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            f.write_str("/")?;
            match segment {
                Segment::Key(label) => f.write_str(&escape_token(label))?,
                Segment::Enabled(label) => {
                    write!(f, "{ENABLED_MARKER}{}", escape_token(label))?
                }
                Segment::Flag(key) => write!(f, "{FLAG_MARKER}{}", escape_token(key))?,
                Segment::Selector => f.write_str(SELECTOR_MARKER)?,
            }
        }

        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = FormError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        if path.is_empty() {
            return Ok(Self::root());
        }

        if !path.starts_with('/') {
            return Err(FormError::MalformedPath(format!(
                "path must start with '/': {path}"
            )));
        }

        let segments = path
            .split('/')
            .skip(1)
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(position) = segments.iter().position(Segment::is_terminal) {
            if position + 1 != segments.len() {
                return Err(FormError::MalformedPath(format!(
                    "terminal segment must be last: {path}"
                )));
            }
        }

        Ok(Self { segments })
    }
}

fn parse_segment(token: &str) -> Result<Segment, FormError> {
    if token == SELECTOR_MARKER {
        return Ok(Segment::Selector);
    }

    if let Some(label) = token.strip_prefix(ENABLED_MARKER) {
        return Ok(Segment::Enabled(unescape_token(label)?));
    }

    if let Some(key) = token.strip_prefix(FLAG_MARKER) {
        return Ok(Segment::Flag(unescape_token(key)?));
    }

    if token.starts_with('@') {
        return Err(FormError::MalformedPath(format!(
            "unknown segment marker: {token}"
        )));
    }

    Ok(Segment::Key(unescape_token(token)?))
}

fn escape_token(token: &str) -> String {
    let mut out = String::with_capacity(token.len());

    for ch in token.chars() {
        match ch {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            '@' => out.push_str("~2"),
            other => out.push(other),
        }
    }

    out
}

fn unescape_token(token: &str) -> Result<String, FormError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();

    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                Some('2') => out.push('@'),
                Some(other) => {
                    return Err(FormError::MalformedPath(format!(
                        "invalid escape ~{other} in path token"
                    )));
                }
                None => {
                    return Err(FormError::MalformedPath(
                        "trailing ~ in path token".to_string(),
                    ));
                }
            }
        } else {
            out.push(ch);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_escapes_reserved_characters() {
        let path = FieldPath::root()
            .key("a/b")
            .key("~x")
            .key("@mail")
            .enabled("on");
        assert_eq!(path.to_string(), "/a~1b/~0x/~2mail/@enabled:on");
    }

    #[test]
    fn parse_restores_every_segment_kind() {
        let path: FieldPath = "/opts/@flag:fast~1slow".parse().expect("valid path");
        assert_eq!(
            path.segments(),
            [
                Segment::Key("opts".to_string()),
                Segment::Flag("fast/slow".to_string())
            ]
        );

        let selector: FieldPath = "/mode/@selected".parse().expect("valid path");
        assert_eq!(selector, FieldPath::root().key("mode").selector());
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        assert!("no-slash".parse::<FieldPath>().is_err());
        assert!("/bad~3".parse::<FieldPath>().is_err());
        assert!("/trailing~".parse::<FieldPath>().is_err());
        assert!("/@unknown".parse::<FieldPath>().is_err());
        assert!("/@selected/after".parse::<FieldPath>().is_err());
    }

    #[test]
    fn empty_string_is_root() {
        let path: FieldPath = "".parse().expect("root path");
        assert!(path.is_root());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn parent_drops_last_segment() {
        let path = FieldPath::root().key("a").flag("b");
        assert_eq!(path.parent(), Some(FieldPath::root().key("a")));
        assert_eq!(FieldPath::root().parent(), None);
    }
}
