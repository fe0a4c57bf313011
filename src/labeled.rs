use once_cell::sync::Lazy;
use regex::Regex;

use crate::Feature;

static LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new("([a-z])([A-Z])").expect("valid regex"));
static ACRONYM_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new("([A-Z]+)([A-Z][a-z])").expect("valid regex"));

/// Split a camel-cased identifier into capitalized, space-separated words.
///
/// `newHomeTab` becomes `New Home Tab` and `newURLFormat` becomes
/// `New URL Format`.
pub fn un_camel_case(label: &str) -> String {
    let split = LOWER_UPPER.replace_all(label, "$1 $2");
    let split = ACRONYM_WORD.replace_all(&split, "$1 $2");

    let mut chars = split.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A node of the feature tree.
#[derive(Clone, Debug)]
pub enum LabeledItem {
    Feature(LabeledFeature),
    Group(LabeledGroup),
}

impl LabeledItem {
    pub fn label(&self) -> &str {
        match self {
            LabeledItem::Feature(f) => &f.label,
            LabeledItem::Group(g) => &g.label,
        }
    }

    pub fn as_feature(&self) -> Option<&LabeledFeature> {
        match self {
            LabeledItem::Feature(f) => Some(f),
            LabeledItem::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&LabeledGroup> {
        match self {
            LabeledItem::Group(g) => Some(g),
            LabeledItem::Feature(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LabeledFeature {
    pub(crate) label: String,
    pub(crate) feature: Feature,
}

impl LabeledFeature {
    pub fn new(label: impl Into<String>, feature: Feature) -> Self {
        Self {
            label: label.into(),
            feature,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn display_label(&self) -> String {
        un_camel_case(&self.label)
    }
}

/// Renders as `New Home Tab [ON by default]` or `New Home Tab [OFF by override]`.
impl std::fmt::Display for LabeledFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let on_off = if self.feature.enabled() { "ON" } else { "OFF" };
        let reason = if self.feature.override_state().is_overridden() {
            "override"
        } else {
            "default"
        };
        write!(f, "{} [{on_off} by {reason}]", self.display_label())
    }
}

#[derive(Clone, Debug)]
pub struct LabeledGroup {
    pub(crate) label: String,
    pub(crate) items: Vec<LabeledItem>,
}

impl LabeledGroup {
    pub fn new(label: impl Into<String>, items: Vec<LabeledItem>) -> Self {
        Self {
            label: label.into(),
            items,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn items(&self) -> &[LabeledItem] {
        &self.items
    }

    pub fn display_label(&self) -> String {
        un_camel_case(&self.label)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabeledItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a LabeledGroup {
    type Item = &'a LabeledItem;
    type IntoIter = std::slice::Iter<'a, LabeledItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
