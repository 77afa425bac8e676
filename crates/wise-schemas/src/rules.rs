//! Rule variants.
//!
//! The set of variants is closed. Adding one means extending [`Rule`], the
//! evaluator match in `wise-rules` and every protocol version's codec table.

use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeightMode {
    SingleVoteWeight,
}

/// Requested vote weight must lie in `[min, max]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeightRule {
    pub mode: WeightMode,
    pub min: i32,
    pub max: i32,
}

impl WeightRule {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            mode: WeightMode::SingleVoteWeight,
            min,
            max,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagsMode {
    Require,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagsRule {
    pub mode: TagsMode,
    pub tags: Vec<String>,
}

impl TagsRule {
    pub fn new(mode: TagsMode, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode,
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn require(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(TagsMode::Require, tags)
    }

    pub fn deny(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(TagsMode::Deny, tags)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthorsMode {
    Allow,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthorsRule {
    pub mode: AuthorsMode,
    pub authors: Vec<String>,
}

impl AuthorsRule {
    pub fn new(mode: AuthorsMode, authors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode,
            authors: authors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allow(authors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(AuthorsMode::Allow, authors)
    }

    pub fn deny(authors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(AuthorsMode::Deny, authors)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeOfPostMode {
    OlderThan,
    YoungerThan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    pub fn seconds(&self) -> i64 {
        match self {
            TimeUnit::Day => 86_400,
            TimeUnit::Hour => 3_600,
            TimeUnit::Minute => 60,
            TimeUnit::Second => 1,
        }
    }
}

/// Post age, measured from post creation to the voteorder timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgeOfPostRule {
    pub mode: AgeOfPostMode,
    pub value: u32,
    pub unit: TimeUnit,
}

impl AgeOfPostRule {
    pub fn new(mode: AgeOfPostMode, value: u32, unit: TimeUnit) -> Self {
        Self { mode, value, unit }
    }

    pub fn older_than(value: u32, unit: TimeUnit) -> Self {
        Self::new(AgeOfPostMode::OlderThan, value, unit)
    }

    pub fn younger_than(value: u32, unit: TimeUnit) -> Self {
        Self::new(AgeOfPostMode::YoungerThan, value, unit)
    }

    pub fn threshold_secs(&self) -> i64 {
        self.value as i64 * self.unit.seconds()
    }
}

/// Verdict delegated to an external endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CustomRpcRule {
    pub host: String,
    pub path: String,
    pub method: String,
    pub params: String,
}

impl CustomRpcRule {
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
        params: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            method: method.into(),
            params: params.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    Weight(WeightRule),
    Tags(TagsRule),
    Authors(AuthorsRule),
    AgeOfPost(AgeOfPostRule),
    CustomRpc(CustomRpcRule),
}

impl Rule {
    /// Wire-independent variant name, used in logs and rejection reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Weight(_) => "WeightRule",
            Rule::Tags(_) => "TagsRule",
            Rule::Authors(_) => "AuthorsRule",
            Rule::AgeOfPost(_) => "AgeOfPostRule",
            Rule::CustomRpc(_) => "CustomRPCRule",
        }
    }

    /// Canonical form for configuration comparison.
    ///
    /// Tag and author lists are sets: sorted and deduplicated. Every other
    /// field is kept verbatim.
    pub fn normalized(&self) -> Rule {
        match self {
            Rule::Tags(r) => Rule::Tags(TagsRule {
                mode: r.mode,
                tags: as_sorted_set(&r.tags),
            }),
            Rule::Authors(r) => Rule::Authors(AuthorsRule {
                mode: r.mode,
                authors: as_sorted_set(&r.authors),
            }),
            other => other.clone(),
        }
    }
}

fn as_sorted_set(items: &[String]) -> Vec<String> {
    items
        .iter()
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

impl From<WeightRule> for Rule {
    fn from(r: WeightRule) -> Self {
        Rule::Weight(r)
    }
}

impl From<TagsRule> for Rule {
    fn from(r: TagsRule) -> Self {
        Rule::Tags(r)
    }
}

impl From<AuthorsRule> for Rule {
    fn from(r: AuthorsRule) -> Self {
        Rule::Authors(r)
    }
}

impl From<AgeOfPostRule> for Rule {
    fn from(r: AgeOfPostRule) -> Self {
        Rule::AgeOfPost(r)
    }
}

impl From<CustomRpcRule> for Rule {
    fn from(r: CustomRpcRule) -> Self {
        Rule::CustomRpc(r)
    }
}
