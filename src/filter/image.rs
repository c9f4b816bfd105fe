use serde::{Deserialize, Deserializer, Serialize};

use super::{FilterSet, FilterValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricTimeframe {
    Day,
    Week,
    Month,
    Year,
    AllTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSort {
    #[serde(rename = "Most Reactions")]
    MostReactions,
    #[serde(rename = "Most Comments")]
    MostComments,
    Newest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowsingMode {
    All,
    #[serde(rename = "SFW")]
    Sfw,
    #[serde(rename = "NSFW")]
    Nsfw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewReaction {
    Like,
    Dislike,
    Laugh,
    Cry,
    Heart,
}

/// Typed view of the image feed filters. Unset fields never reach the
/// filter set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(default, deserialize_with = "string_like", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_id: Option<i64>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub prioritized_user_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<MetricTimeframe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<ImageSort>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReviewReaction>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<MediaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_meta: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browsing_mode: Option<BrowsingMode>,
}

// `types=image` on the command line arrives as a bare string.
fn one_or_many<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }
    Ok(match OneOrMany::deserialize(d)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(v) => v,
    })
}

fn string_like<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringLike {
        Str(String),
        Int(i64),
    }
    Ok(Option::<StringLike>::deserialize(d)?.map(|v| match v {
        StringLike::Str(s) => s,
        StringLike::Int(n) => n.to_string(),
    }))
}

impl ImageFilters {
    /// Read the typed fields out of a filter set. Keys without a typed field
    /// are ignored; a known key holding a value it cannot take is an error.
    pub fn from_filter_set(set: &FilterSet) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(set)?)
    }

    pub fn to_filter_set(&self) -> FilterSet {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().map(|(k, v)| (k, FilterValue::from(v))).collect(),
            _ => FilterSet::new(),
        }
    }
}

impl From<&ImageFilters> for FilterSet {
    fn from(f: &ImageFilters) -> Self {
        f.to_filter_set()
    }
}

/// The end-of-feed marker is pointless for the all-time listing, which
/// effectively never ends.
pub fn end_of_feed_allowed(requested: bool, filters: &FilterSet) -> bool {
    requested && filters.get("period").and_then(FilterValue::as_str) != Some("AllTime")
}
