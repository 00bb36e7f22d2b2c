use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Subscription status sent on the upsert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Subscribed,
    /// Double opt-in: MailChimp emails a confirmation first.
    Pending,
}

impl MemberStatus {
    pub fn from_double_opt_in(double_opt_in: bool) -> Self {
        if double_opt_in {
            MemberStatus::Pending
        } else {
            MemberStatus::Subscribed
        }
    }
}

/// Body of `PUT lists/{list_id}/members/{subscriber_hash}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberUpsert {
    pub email_address: String,
    pub status: MemberStatus,
    pub email_type: String,
    pub merge_fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interests: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Error document returned by the API (RFC 7807 problem details).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: Option<String>,
    pub title: Option<String>,
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub instance: Option<String>,
}

/// Account summary returned by the API root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListsPage {
    #[serde(default)]
    pub lists: Vec<ListSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InterestCategoriesPage {
    #[serde(default)]
    pub categories: Vec<InterestCategorySummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InterestCategorySummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InterestsPage {
    #[serde(default)]
    pub interests: Vec<InterestSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InterestSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MergeFieldsPage {
    #[serde(default)]
    pub merge_fields: Vec<MergeFieldSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MergeFieldSummary {
    pub merge_id: u64,
    pub tag: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SegmentsPage {
    #[serde(default)]
    pub segments: Vec<SegmentSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SegmentSummary {
    pub id: u64,
    pub name: String,
}
