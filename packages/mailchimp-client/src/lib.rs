//! Pure MailChimp v3 REST API client.
//!
//! A minimal client for the MailChimp marketing API: audience (list) lookups,
//! interest groups, merge fields, tags, and the idempotent member upsert used
//! to subscribe customers.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailchimp_client::{MailchimpClient, MemberUpsert};
//!
//! let client = MailchimpClient::new("0123456789abcdef-us6")?;
//!
//! for (id, name) in client.get_lists().await? {
//!     println!("{id}: {name}");
//! }
//!
//! let member = MemberUpsert::new("jane@example.com", false)
//!     .merge_field("FNAME", "Jane");
//! client.subscribe("a1b2c3", &member).await?;
//! ```

pub mod cache;
pub mod error;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{get_or_compute, MemoryCache, ResponseCache, DEFAULT_CACHE_TTL};
pub use error::{MailchimpError, Result, TRANSPORT_ERROR_CODE};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};
pub use types::{AccountInfo, MemberStatus, MemberUpsert};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use types::{
    InterestCategoriesPage, InterestsPage, ListsPage, MergeFieldsPage, ProblemDetail,
    SegmentsPage,
};

/// Datacenter used when the API key carries no usable suffix.
pub const DEFAULT_DATACENTER: &str = "us1";

/// Page size for collection lookups; MailChimp defaults to 10.
const PAGE_SIZE: &str = "100";

/// Extract the datacenter from an API key (`<key>-<dc>`).
///
/// Falls back to [`DEFAULT_DATACENTER`] when there is no dash or the suffix
/// is not a plain alphanumeric token.
pub fn datacenter(api_key: &str) -> &str {
    match api_key.rsplit_once('-') {
        Some((_, dc)) if !dc.is_empty() && dc.chars().all(|c| c.is_ascii_alphanumeric()) => dc,
        _ => DEFAULT_DATACENTER,
    }
}

/// MailChimp member id: MD5 hex digest of the lower-cased email address.
pub fn subscriber_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.trim().to_lowercase().as_bytes()))
}

impl MemberUpsert {
    /// Start an upsert for `email`; status follows `double_opt_in`.
    ///
    /// The address is trimmed and lower-cased so the body always matches the
    /// [`subscriber_hash`] in the member URL.
    pub fn new(email: impl Into<String>, double_opt_in: bool) -> Self {
        Self {
            email_address: email.into().trim().to_lowercase(),
            status: MemberStatus::from_double_opt_in(double_opt_in),
            email_type: "html".to_string(),
            merge_fields: BTreeMap::new(),
            interests: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    pub fn email_type(mut self, email_type: impl Into<String>) -> Self {
        self.email_type = email_type.into();
        self
    }

    pub fn merge_field(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.merge_fields.insert(tag.into(), value.into());
        self
    }

    pub fn merge_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.merge_fields = fields;
        self
    }

    pub fn interests(mut self, interests: BTreeMap<String, bool>) -> Self {
        self.interests = interests;
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// MailChimp v3 API client.
///
/// Cheap to clone; clones share the transport and cache.
#[derive(Clone)]
pub struct MailchimpClient {
    transport: Arc<dyn HttpTransport>,
    api_key: String,
    base_url: Option<String>,
    cache: Option<Arc<dyn ResponseCache>>,
    cache_ttl: Duration,
}

impl MailchimpClient {
    /// Create a client using the `reqwest` transport.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self::with_transport(api_key, Arc::new(ReqwestTransport::new()?)))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(api_key: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            base_url: None,
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Point the client at a fixed base URL instead of the key's datacenter.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Cache lookup results for `ttl`.
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Same transport, cache and base URL override, different account.
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..self.clone()
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn datacenter(&self) -> &str {
        datacenter(&self.api_key)
    }

    /// `https://<dc>.api.mailchimp.com/3.0` unless overridden.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}.api.mailchimp.com/3.0", self.datacenter()),
        }
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    pub async fn get(&self, resource: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.request(Method::Get, resource, query, None).await
    }

    pub async fn post(&self, resource: &str, body: &Value) -> Result<Value> {
        self.request(Method::Post, resource, &[], Some(body)).await
    }

    pub async fn put(&self, resource: &str, body: &Value) -> Result<Value> {
        self.request(Method::Put, resource, &[], Some(body)).await
    }

    pub async fn patch(&self, resource: &str, body: &Value) -> Result<Value> {
        self.request(Method::Patch, resource, &[], Some(body)).await
    }

    pub async fn delete(&self, resource: &str, body: &Value) -> Result<Value> {
        self.request(Method::Delete, resource, &[], Some(body)).await
    }

    async fn request(
        &self,
        method: Method,
        resource: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url(), resource.trim_start_matches('/'));

        // GET carries its arguments in the query string, everything else in a JSON body.
        let (query, body) = match method {
            Method::Get => (
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<Vec<_>>(),
                None,
            ),
            _ => (Vec::new(), Some(body.cloned().unwrap_or(Value::Null))),
        };

        let request = ApiRequest {
            method,
            url,
            headers: self.headers(),
            query,
            body,
        };

        tracing::debug!(method = %method, resource, "MailChimp request");
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let err = api_error(response.status, &response.body);
            tracing::warn!(
                method = %method,
                resource,
                status = response.status,
                message = err.message(),
                "MailChimp returned an error"
            );
            return Err(err);
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Authorization".into(), format!("apikey {}", self.api_key)),
            ("Content-Type".into(), "application/json".into()),
            ("Accept".into(), "application/json".into()),
            (
                "User-Agent".into(),
                format!(
                    "mailchimp-client/{} (WooCommerce MailChimp subscriptions)",
                    env!("CARGO_PKG_VERSION")
                ),
            ),
        ]
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let value = self.get(resource, query).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn cached_map<F, Fut>(&self, resource: &str, compute: F) -> Result<BTreeMap<String, String>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<BTreeMap<String, String>>>,
    {
        let Some(cache) = &self.cache else {
            return compute().await;
        };

        let key = format!("mailchimp:{}:{}", subscriber_hash(&self.api_key), resource);
        let value = get_or_compute(cache.as_ref(), &key, self.cache_ttl, || async move {
            Ok(serde_json::to_value(compute().await?)?)
        })
        .await?;
        Ok(serde_json::from_value(value)?)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// `GET /`: validates the API key.
    pub async fn ping(&self) -> Result<AccountInfo> {
        self.get_typed("", &[]).await
    }

    /// Audiences as id -> name. An account with no lists yields an empty map.
    pub async fn get_lists(&self) -> Result<BTreeMap<String, String>> {
        self.cached_map("lists", || async {
            let page: ListsPage = self.get_typed("lists", &[("count", PAGE_SIZE)]).await?;
            Ok(page.lists.into_iter().map(|l| (l.id, l.name)).collect())
        })
        .await
    }

    /// Interest categories of a list as id -> title.
    pub async fn get_interest_categories(&self, list_id: &str) -> Result<BTreeMap<String, String>> {
        let resource = format!("lists/{list_id}/interest-categories");
        let page: InterestCategoriesPage =
            self.get_typed(&resource, &[("count", PAGE_SIZE)]).await?;
        Ok(page.categories.into_iter().map(|c| (c.id, c.title)).collect())
    }

    /// Interests of one category as id -> name.
    pub async fn get_interest_category_interests(
        &self,
        list_id: &str,
        category_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        let resource = format!("lists/{list_id}/interest-categories/{category_id}/interests");
        let page: InterestsPage = self.get_typed(&resource, &[("count", PAGE_SIZE)]).await?;
        Ok(page.interests.into_iter().map(|i| (i.id, i.name)).collect())
    }

    /// Every interest of a list as id -> `"Category: Interest"`.
    ///
    /// Any failing call fails the whole lookup.
    pub async fn get_interest_categories_with_interests(
        &self,
        list_id: &str,
    ) -> Result<BTreeMap<String, String>> {
        let resource = format!("lists/{list_id}/interest-categories/interests");
        self.cached_map(&resource, || async {
            let mut groups = BTreeMap::new();
            for (category_id, category_title) in self.get_interest_categories(list_id).await? {
                let interests = self
                    .get_interest_category_interests(list_id, &category_id)
                    .await?;
                for (interest_id, interest_name) in interests {
                    groups.insert(interest_id, format!("{category_title}: {interest_name}"));
                }
            }
            Ok(groups)
        })
        .await
    }

    /// Merge fields of a list as merge id -> tag.
    pub async fn get_merge_fields(&self, list_id: &str) -> Result<BTreeMap<String, String>> {
        let resource = format!("lists/{list_id}/merge-fields");
        self.cached_map(&resource, || async {
            let page: MergeFieldsPage = self.get_typed(&resource, &[("count", PAGE_SIZE)]).await?;
            Ok(page
                .merge_fields
                .into_iter()
                .map(|f| (f.merge_id.to_string(), f.tag))
                .collect())
        })
        .await
    }

    /// Tags of a list (static segments) as segment id -> name.
    pub async fn get_tags(&self, list_id: &str) -> Result<BTreeMap<String, String>> {
        let resource = format!("lists/{list_id}/segments");
        self.cached_map(&resource, || async {
            let page: SegmentsPage = self
                .get_typed(&resource, &[("type", "static"), ("count", PAGE_SIZE)])
                .await?;
            Ok(page
                .segments
                .into_iter()
                .map(|s| (s.id.to_string(), s.name))
                .collect())
        })
        .await
    }

    // =========================================================================
    // Subscribe
    // =========================================================================

    /// Add or update a list member.
    ///
    /// Issues `PUT lists/{list_id}/members/{subscriber_hash}`, so repeating the
    /// call for the same email converges on the same member record.
    pub async fn subscribe(&self, list_id: &str, member: &MemberUpsert) -> Result<Value> {
        let resource = format!(
            "lists/{}/members/{}",
            list_id,
            subscriber_hash(&member.email_address)
        );
        let body = serde_json::to_value(member)?;

        tracing::debug!(list_id, status = ?member.status, "Upserting MailChimp member");
        self.put(&resource, &body).await
    }
}

impl std::fmt::Debug for MailchimpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailchimpClient")
            .field("base_url", &self.base_url())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

/// Map a non-2xx response to [`MailchimpError::Api`].
///
/// The message prefers the problem `detail`, then `title`, then the raw body.
fn api_error(status: u16, body: &str) -> MailchimpError {
    let problem: ProblemDetail = serde_json::from_str(body).unwrap_or_default();
    let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

    let message = non_empty(problem.detail)
        .or_else(|| non_empty(problem.title))
        .or_else(|| non_empty(Some(body.trim().to_string())))
        .unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown error")
                .to_string()
        });

    MailchimpError::Api {
        status,
        code: status.to_string(),
        message,
    }
}
