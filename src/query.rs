//! Depth-first traversal, description and filtering of a feature tree.
//!
//! Every function here preserves declaration order and is read-only over the
//! tree. Groups are never tested against a predicate themselves; they appear
//! in filtered results only when some descendant feature matches.

use crate::{Feature, LabeledFeature, LabeledGroup, LabeledItem};

/// Joins ancestor group labels and the feature label in descriptions.
pub const PATH_SEPARATOR: &str = " → ";

/// Which features a view includes, judged by state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    All,
    Enabled,
    Disabled,
    /// Any feature whose override is not `Default`.
    Overridden,
}

impl Scope {
    pub fn matches(self, feature: &Feature) -> bool {
        match self {
            Scope::All => true,
            Scope::Enabled => feature.enabled(),
            Scope::Disabled => !feature.enabled(),
            Scope::Overridden => feature.override_state().is_overridden(),
        }
    }
}

/// Visit every feature depth-first, threading the stack of enclosing groups,
/// and collect `build(ancestors, feature)` for those accepted by `filter`.
pub fn depth_first_map<'a, T, F, B>(items: &'a [LabeledItem], mut filter: F, mut build: B) -> Vec<T>
where
    F: FnMut(&LabeledFeature) -> bool,
    B: FnMut(&[&'a LabeledGroup], &'a LabeledFeature) -> T,
{
    let mut out = Vec::new();
    let mut ancestors = Vec::new();
    visit(items, &mut ancestors, &mut filter, &mut build, &mut out);
    out
}

fn visit<'a, T, F, B>(
    items: &'a [LabeledItem],
    ancestors: &mut Vec<&'a LabeledGroup>,
    filter: &mut F,
    build: &mut B,
    out: &mut Vec<T>,
) where
    F: FnMut(&LabeledFeature) -> bool,
    B: FnMut(&[&'a LabeledGroup], &'a LabeledFeature) -> T,
{
    for item in items {
        match item {
            LabeledItem::Group(group) => {
                ancestors.push(group);
                visit(&group.items, ancestors, filter, build, out);
                ancestors.pop();
            }
            LabeledItem::Feature(feature) => {
                if filter(feature) {
                    out.push(build(ancestors.as_slice(), feature));
                }
            }
        }
    }
}

fn qualified(ancestors: &[&LabeledGroup], leaf: String) -> String {
    ancestors
        .iter()
        .map(|group| group.display_label())
        .chain(std::iter::once(leaf))
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Describe each feature in `scope` as
/// `Group → Nested → Label [ON by default]`.
pub fn describe(items: &[LabeledItem], scope: Scope) -> Vec<String> {
    depth_first_map(
        items,
        |item| scope.matches(item.feature()),
        |ancestors, item| qualified(ancestors, item.to_string()),
    )
}

/// The path-qualified display labels of every enabled feature.
pub fn enabled_features(items: &[LabeledItem]) -> Vec<String> {
    depth_first_map(
        items,
        |item| item.feature().enabled(),
        |ancestors, item| qualified(ancestors, item.display_label()),
    )
}

/// The first feature, depth-first, whose key is `key`.
pub fn find_feature<'a>(items: &'a [LabeledItem], key: &str) -> Option<&'a Feature> {
    depth_first_map(
        items,
        |item| item.feature().key() == Some(key),
        |_, item| item.feature(),
    )
    .into_iter()
    .next()
}

/// Whether any feature in the tree is labeled or keyed `key`.
pub(crate) fn occupies_key(items: &[LabeledItem], key: &str) -> bool {
    !depth_first_map(
        items,
        |item| item.label() == key || item.feature().key() == Some(key),
        |_, _| (),
    )
    .is_empty()
}

pub fn feature_count(items: &[LabeledItem]) -> usize {
    depth_first_map(items, |_| true, |_, _| ()).len()
}

/// A search over the tree: a state scope followed by a text query.
///
/// The query is a case-insensitive substring match against a feature's label
/// or its display form. `None` means no text filtering. `Some("")` is an
/// active search with nothing typed yet and matches nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureFilter {
    scope: Scope,
    query: Option<String>,
}

impl FeatureFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn set_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// False when the filter would return the tree unchanged.
    pub fn is_active(&self) -> bool {
        self.query.is_some() || self.scope != Scope::All
    }

    fn matcher(&self) -> impl Fn(&LabeledFeature) -> bool + '_ {
        let needle = self.query.as_deref().map(str::to_lowercase);
        move |item: &LabeledFeature| -> bool {
            if !self.scope.matches(item.feature()) {
                return false;
            }
            match needle.as_deref() {
                None => true,
                Some("") => false,
                Some(needle) => {
                    item.label().to_lowercase().contains(needle)
                        || item.display_label().to_lowercase().contains(needle)
                }
            }
        }
    }

    pub fn matches(&self, item: &LabeledFeature) -> bool {
        self.matcher()(item)
    }

    /// The tree restricted to matching features. Groups left without any
    /// matching descendant are dropped.
    pub fn apply(&self, items: &[LabeledItem]) -> Vec<LabeledItem> {
        if !self.is_active() {
            return items.to_vec();
        }
        prune(items, &self.matcher())
    }

    /// Matching features as a flat list, each with its group path.
    pub fn search<'a>(&self, items: &'a [LabeledItem]) -> Vec<FeatureMatch<'a>> {
        let matcher = self.matcher();
        depth_first_map(
            items,
            |item| !self.is_active() || matcher(item),
            |ancestors, item| FeatureMatch {
                path: ancestors.iter().map(|&group| group.label()).collect(),
                item,
            },
        )
    }
}

fn prune(items: &[LabeledItem], matches: &dyn Fn(&LabeledFeature) -> bool) -> Vec<LabeledItem> {
    items
        .iter()
        .filter_map(|item| match item {
            LabeledItem::Feature(feature) => matches(feature).then(|| item.clone()),
            LabeledItem::Group(group) => {
                let children = prune(&group.items, matches);
                (!children.is_empty())
                    .then(|| LabeledItem::Group(LabeledGroup::new(group.label.clone(), children)))
            }
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct FeatureMatch<'a> {
    pub path: Vec<&'a str>,
    pub item: &'a LabeledFeature,
}

impl std::fmt::Display for FeatureMatch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for label in &self.path {
            write!(f, "{}{PATH_SEPARATOR}", crate::un_camel_case(label))?;
        }
        write!(f, "{}", self.item)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{FeatureGroup, OverrideState, extract};

    /// `top`, group `G` { `g1`, group `N` { `n1` } }, `last`
    fn tree() -> (FeatureGroup, Vec<LabeledItem>) {
        let group = FeatureGroup::new()
            .with_feature("top", Feature::new(true))
            .with_group(
                "G",
                FeatureGroup::new()
                    .with_feature("g1", Feature::new(false))
                    .with_group("N", FeatureGroup::new().with_feature("n1", Feature::new(true))),
            )
            .with_feature("lastFeature", Feature::new(false));
        let items = extract(&group);
        (group, items)
    }

    fn flatten(items: &[LabeledItem], prefix: &str, out: &mut Vec<String>) {
        for item in items {
            let name = format!("{prefix}{}", item.label());
            out.push(name.clone());
            if let LabeledItem::Group(group) = item {
                flatten(group.items(), &format!("{name}:"), out);
            }
        }
    }

    #[test]
    fn flattening_preserves_declaration_order() {
        let (_, items) = tree();
        let mut out = vec![];
        flatten(&items, "", &mut out);
        assert_eq!(out, ["top", "G", "G:g1", "G:N", "G:N:n1", "lastFeature"]);
    }

    #[test]
    fn depth_first_map_threads_ancestors() {
        let (_, items) = tree();
        let paths = depth_first_map(
            &items,
            |_| true,
            |ancestors, item| {
                let mut path: Vec<&str> = ancestors.iter().map(|g| g.label()).collect();
                path.push(item.label());
                path.join("/")
            },
        );
        assert_eq!(paths, ["top", "G/g1", "G/N/n1", "lastFeature"]);
    }

    #[test]
    fn describes_each_scope() {
        let (group, items) = tree();
        group
            .group("G")
            .unwrap()
            .feature("g1")
            .unwrap()
            .set_override(OverrideState::Enabled)
            .unwrap();

        assert_eq!(
            describe(&items, Scope::Enabled),
            [
                "Top [ON by default]",
                "G → G1 [ON by override]",
                "G → N → N1 [ON by default]",
            ]
        );
        assert_eq!(
            describe(&items, Scope::Disabled),
            ["Last Feature [OFF by default]"]
        );
        assert_eq!(
            describe(&items, Scope::Overridden),
            ["G → G1 [ON by override]"]
        );
        assert_eq!(describe(&items, Scope::All).len(), 4);
    }

    #[test]
    fn enabled_features_lists_qualified_labels() {
        let (_, items) = tree();
        assert_eq!(enabled_features(&items), ["Top", "G → N → N1"]);
    }

    #[test]
    fn finds_features_by_key() {
        let keyed = FeatureGroup::new().with_group(
            "outer",
            FeatureGroup::new().with_feature("label", Feature::with_key("the-key", false)),
        );
        let items = extract(&keyed);

        assert!(find_feature(&items, "the-key").is_some());
        assert!(find_feature(&items, "label").is_none());
        assert!(occupies_key(&items, "label"));
        assert!(occupies_key(&items, "the-key"));
        assert!(!occupies_key(&items, "outer"));
        assert_eq!(feature_count(&items), 1);
    }

    #[test]
    fn inactive_filter_returns_the_whole_tree() {
        let (_, items) = tree();
        let filtered = FeatureFilter::new().apply(&items);
        assert_eq!(filtered.len(), items.len());
        assert_eq!(feature_count(&filtered), 4);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let (_, items) = tree();
        let filter = FeatureFilter::new().set_query(Some(String::new()));
        assert!(filter.apply(&items).is_empty());
        assert!(filter.search(&items).is_empty());
    }

    #[test]
    fn query_is_case_insensitive_and_prunes_groups() {
        let (_, items) = tree();
        let filter = FeatureFilter::new().set_query(Some("N1".into()));
        let filtered = filter.apply(&items);

        assert_eq!(filtered.len(), 1);
        let g = filtered[0].as_group().unwrap();
        assert_eq!(g.label(), "G");
        let n = g.items()[0].as_group().unwrap();
        assert_eq!(n.items()[0].label(), "n1");
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn query_matches_the_display_label() {
        let (_, items) = tree();
        let filter = FeatureFilter::new().set_query(Some("last f".into()));
        let found: Vec<String> = filter.search(&items).iter().map(|m| m.to_string()).collect();
        assert_eq!(found, ["Last Feature [OFF by default]"]);
    }

    #[test]
    fn scope_applies_before_the_query() {
        let (group, items) = tree();
        group
            .feature("lastFeature")
            .unwrap()
            .set_override(OverrideState::Disabled)
            .unwrap();

        let overridden = FeatureFilter::new().set_scope(Scope::Overridden);
        let found: Vec<String> = overridden.search(&items).iter().map(|m| m.to_string()).collect();
        assert_eq!(found, ["Last Feature [OFF by override]"]);

        let enabled_n = FeatureFilter::new()
            .set_scope(Scope::Enabled)
            .set_query(Some("n".into()));
        let found: Vec<String> = enabled_n.search(&items).iter().map(|m| m.to_string()).collect();
        assert_eq!(found, ["G → N → N1 [ON by default]"]);
    }
}
