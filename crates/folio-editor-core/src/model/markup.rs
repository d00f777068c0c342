//! Inline markup values (`b`, `em`, `a href=...`).

use smol_str::SmolStr;

use crate::error::ValidationError;

/// Tags a [`Markup`] may carry.
pub const MARKUP_TAGS: &[&str] = &["a", "b", "code", "em", "i", "s", "strong", "sub", "sup", "u"];

/// An immutable tag + attributes value applied to inline content.
///
/// Markups compare by value. Tags and attributes are `SmolStr`s, so clones
/// share storage and two markups built from the same data are interchangeable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Markup {
    tag: SmolStr,
    attributes: Vec<(SmolStr, SmolStr)>,
}

impl Markup {
    /// Build an attribute-less markup. The tag is matched case-insensitively.
    pub fn new(tag: &str) -> Result<Self, ValidationError> {
        Self::with_attributes(tag, std::iter::empty::<(SmolStr, SmolStr)>())
    }

    pub fn with_attributes<K, V>(
        tag: &str,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ValidationError>
    where
        K: Into<SmolStr>,
        V: Into<SmolStr>,
    {
        let tag = SmolStr::new(tag.to_ascii_lowercase());
        if !MARKUP_TAGS.contains(&tag.as_str()) {
            return Err(ValidationError::InvalidMarkupTag(tag));
        }
        Ok(Self {
            tag,
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &[(SmolStr, SmolStr)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

/// Whether two markup stacks hold the same markups, ignoring order.
pub(crate) fn same_markups(a: &[Markup], b: &[Markup]) -> bool {
    a.len() == b.len() && a.iter().all(|m| b.contains(m))
}

/// Drop later markups whose tag is already present.
pub(crate) fn dedup_markups(markups: Vec<Markup>) -> Vec<Markup> {
    let mut out: Vec<Markup> = Vec::with_capacity(markups.len());
    for markup in markups {
        if !out.iter().any(|m| m.tag == markup.tag) {
            out.push(markup);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tags() {
        for tag in MARKUP_TAGS {
            assert!(Markup::new(tag).is_ok(), "{tag} should be valid");
        }
        assert_eq!(Markup::new("B").unwrap().tag(), "b");
    }

    #[test]
    fn test_invalid_tag() {
        assert_eq!(
            Markup::new("blink"),
            Err(ValidationError::InvalidMarkupTag("blink".into()))
        );
    }

    #[test]
    fn test_value_equality() {
        let a = Markup::with_attributes("a", [("href", "https://example.com")]).unwrap();
        let b = Markup::with_attributes("a", [("href", "https://example.com")]).unwrap();
        let c = Markup::with_attributes("a", [("href", "https://other.example")]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.attribute("href"), Some("https://example.com"));
    }

    #[test]
    fn test_same_markups_ignores_order() {
        let b = Markup::new("b").unwrap();
        let em = Markup::new("em").unwrap();
        assert!(same_markups(&[b.clone(), em.clone()], &[em.clone(), b.clone()]));
        assert!(!same_markups(&[b.clone()], &[b, em]));
    }

    #[test]
    fn test_dedup_by_tag() {
        let b = Markup::new("b").unwrap();
        let out = dedup_markups(vec![b.clone(), Markup::new("em").unwrap(), b]);
        assert_eq!(out.len(), 2);
    }
}
