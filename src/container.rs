use crate::{Feature, LabeledFeature, LabeledGroup, LabeledItem};

/// A type that declares features and feature groups, in order.
///
/// This is the explicit replacement for reflecting over a struct's fields:
/// each container lists its members with the label they should carry in the
/// feature tree. Labels double as persistence keys for features declared
/// without one.
///
/// ```rust
/// use feature_overrides::{Declaration, Feature, FeatureContainer};
///
/// struct ThemeFeatures {
///     dark_mode: Feature,
/// }
///
/// impl FeatureContainer for ThemeFeatures {
///     fn declare<'a>(&'a self, declaration: &mut Declaration<'a>) {
///         declaration.feature("darkMode", &self.dark_mode);
///     }
/// }
///
/// struct MyFeatures {
///     portrait_videos: Feature,
///     theme: ThemeFeatures,
/// }
///
/// impl FeatureContainer for MyFeatures {
///     fn declare<'a>(&'a self, declaration: &mut Declaration<'a>) {
///         declaration
///             .feature("portraitVideos", &self.portrait_videos)
///             .group("theme", &self.theme);
///     }
/// }
/// ```
pub trait FeatureContainer {
    fn declare<'a>(&'a self, declaration: &mut Declaration<'a>);
}

impl FeatureContainer for () {
    fn declare<'a>(&'a self, _declaration: &mut Declaration<'a>) {}
}

/// What a declared member is.
#[derive(Clone, Copy)]
pub enum Declared<'a> {
    Feature(&'a Feature),
    Group(&'a dyn FeatureContainer),
    /// Plain data living next to the features; never part of the tree.
    Other,
}

/// The ordered list of members a container declares.
#[derive(Default)]
pub struct Declaration<'a> {
    entries: Vec<(String, Declared<'a>)>,
}

impl<'a> Declaration<'a> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, member: Declared<'a>) -> &mut Self {
        self.entries.push((label.into(), member));
        self
    }

    pub fn feature(&mut self, label: impl Into<String>, feature: &'a Feature) -> &mut Self {
        self.push(label, Declared::Feature(feature))
    }

    pub fn group(
        &mut self,
        label: impl Into<String>,
        group: &'a dyn FeatureContainer,
    ) -> &mut Self {
        self.push(label, Declared::Group(group))
    }

    pub fn other(&mut self, label: impl Into<String>) -> &mut Self {
        self.push(label, Declared::Other)
    }

    /// Splice in everything `parent` declares, at this position.
    ///
    /// Calling `inherit` before declaring the container's own members puts
    /// the ancestor's features first.
    pub fn inherit(&mut self, parent: &'a dyn FeatureContainer) -> &mut Self {
        parent.declare(self);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the labeled tree for `container`, recursing into nested groups.
pub fn extract(container: &dyn FeatureContainer) -> Vec<LabeledItem> {
    let mut declaration = Declaration::new();
    container.declare(&mut declaration);

    declaration
        .entries
        .into_iter()
        .filter_map(|(label, member)| match member {
            Declared::Feature(feature) => Some(LabeledItem::Feature(LabeledFeature::new(
                label,
                feature.clone(),
            ))),
            Declared::Group(group) => Some(LabeledItem::Group(LabeledGroup::new(
                label,
                extract(group),
            ))),
            Declared::Other => {
                tracing::trace!(label, "Skipping a declared member that is not a feature");
                None
            }
        })
        .collect()
}

/// A container assembled at runtime rather than declared as a struct.
#[derive(Clone, Default)]
pub struct FeatureGroup {
    members: Vec<(String, Member)>,
}

#[derive(Clone)]
enum Member {
    Feature(Feature),
    Group(FeatureGroup),
}

impl FeatureGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature(mut self, label: impl Into<String>, feature: Feature) -> Self {
        self.members.push((label.into(), Member::Feature(feature)));
        self
    }

    pub fn with_group(mut self, label: impl Into<String>, group: FeatureGroup) -> Self {
        self.members.push((label.into(), Member::Group(group)));
        self
    }

    pub fn feature(&self, label: &str) -> Option<&Feature> {
        self.members.iter().find_map(|(l, m)| match m {
            Member::Feature(f) if l == label => Some(f),
            _ => None,
        })
    }

    pub fn group(&self, label: &str) -> Option<&FeatureGroup> {
        self.members.iter().find_map(|(l, m)| match m {
            Member::Group(g) if l == label => Some(g),
            _ => None,
        })
    }
}

impl FeatureContainer for FeatureGroup {
    fn declare<'a>(&'a self, declaration: &mut Declaration<'a>) {
        for (label, member) in &self.members {
            match member {
                Member::Feature(feature) => declaration.feature(label.as_str(), feature),
                Member::Group(group) => declaration.group(label.as_str(), group),
            };
        }
    }
}
