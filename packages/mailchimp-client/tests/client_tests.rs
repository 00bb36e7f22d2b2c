//! Request-shape and response-mapping tests for the MailChimp client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mailchimp_client::testing::{FakeMembers, RecordingTransport};
use mailchimp_client::{
    subscriber_hash, MailchimpError, MemberUpsert, MemoryCache, Method, TRANSPORT_ERROR_CODE,
};
use serde_json::json;

#[tokio::test]
async fn test_requests_are_authenticated_json() {
    let transport = RecordingTransport::new().with_json(200, json!({"lists": []}));
    let client = transport.client("abc123-us6");

    client.get_lists().await.unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.url, "https://us6.api.mailchimp.com/3.0/lists");
    assert_eq!(request.header("Authorization"), Some("apikey abc123-us6"));
    assert_eq!(request.header("Content-Type"), Some("application/json"));
    assert_eq!(request.header("Accept"), Some("application/json"));
    assert!(request
        .header("User-Agent")
        .unwrap()
        .starts_with("mailchimp-client/"));
    assert_eq!(request.query, vec![("count".to_string(), "100".to_string())]);
    assert!(request.body.is_none());
}

#[tokio::test]
async fn test_get_lists_flattens_to_id_name() {
    let transport = RecordingTransport::new().with_json(
        200,
        json!({
            "lists": [
                {"id": "L1", "name": "Customers", "stats": {"member_count": 3}},
                {"id": "L2", "name": "Wholesale"}
            ],
            "total_items": 2
        }),
    );

    let lists = transport.client("k-us1").get_lists().await.unwrap();

    assert_eq!(
        lists,
        BTreeMap::from([
            ("L1".to_string(), "Customers".to_string()),
            ("L2".to_string(), "Wholesale".to_string()),
        ])
    );
}

#[tokio::test]
async fn test_zero_lists_is_not_an_error() {
    let transport = RecordingTransport::new().with_json(200, json!({"lists": [], "total_items": 0}));

    let lists = transport.client("k-us1").get_lists().await.unwrap();

    assert!(lists.is_empty());
}

#[tokio::test]
async fn test_interest_groups_are_labelled_by_category() {
    let transport = RecordingTransport::new()
        .with_json(
            200,
            json!({"categories": [{"id": "c1", "title": "Topics"}, {"id": "c2", "title": "Frequency"}]}),
        )
        .with_json(
            200,
            json!({"interests": [{"id": "i1", "name": "Coffee"}, {"id": "i2", "name": "Tea"}]}),
        )
        .with_json(200, json!({"interests": [{"id": "i3", "name": "Weekly"}]}));

    let groups = transport
        .client("k-us1")
        .get_interest_categories_with_interests("L1")
        .await
        .unwrap();

    assert_eq!(groups.get("i1").map(String::as_str), Some("Topics: Coffee"));
    assert_eq!(groups.get("i2").map(String::as_str), Some("Topics: Tea"));
    assert_eq!(groups.get("i3").map(String::as_str), Some("Frequency: Weekly"));

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://us1.api.mailchimp.com/3.0/lists/L1/interest-categories",
            "https://us1.api.mailchimp.com/3.0/lists/L1/interest-categories/c1/interests",
            "https://us1.api.mailchimp.com/3.0/lists/L1/interest-categories/c2/interests",
        ]
    );
}

#[tokio::test]
async fn test_interest_group_failure_fails_whole_lookup() {
    let transport = RecordingTransport::new()
        .with_json(
            200,
            json!({"categories": [{"id": "c1", "title": "Topics"}, {"id": "c2", "title": "Frequency"}]}),
        )
        .with_json(200, json!({"interests": [{"id": "i1", "name": "Coffee"}]}))
        .with_json(500, json!({"title": "Internal Server Error", "detail": "try again"}));

    let result = transport
        .client("k-us1")
        .get_interest_categories_with_interests("L1")
        .await;

    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.message(), "try again");
}

#[tokio::test]
async fn test_merge_fields_and_tags() {
    let transport = RecordingTransport::new()
        .with_json(
            200,
            json!({"merge_fields": [{"merge_id": 1, "tag": "FNAME"}, {"merge_id": 2, "tag": "LNAME"}]}),
        )
        .with_json(200, json!({"segments": [{"id": 77, "name": "woocommerce"}]}));
    let client = transport.client("k-us1");

    let fields = client.get_merge_fields("L1").await.unwrap();
    assert_eq!(fields.get("1").map(String::as_str), Some("FNAME"));
    assert_eq!(fields.get("2").map(String::as_str), Some("LNAME"));

    let tags = client.get_tags("L1").await.unwrap();
    assert_eq!(tags.get("77").map(String::as_str), Some("woocommerce"));

    let request = transport.last_request().unwrap();
    assert_eq!(request.url, "https://us1.api.mailchimp.com/3.0/lists/L1/segments");
    assert!(request
        .query
        .contains(&("type".to_string(), "static".to_string())));
}

#[tokio::test]
async fn test_subscribe_puts_member_by_hash() {
    let transport = RecordingTransport::new();
    let member = MemberUpsert::new("a@example.com", false)
        .merge_field("FNAME", "A")
        .merge_field("LNAME", "B");

    transport
        .client("k-us1")
        .subscribe("L1", &member)
        .await
        .unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Put);
    assert_eq!(
        request.url,
        format!(
            "https://us1.api.mailchimp.com/3.0/lists/L1/members/{}",
            subscriber_hash("a@example.com")
        )
    );
    assert_eq!(
        request.body,
        Some(json!({
            "email_address": "a@example.com",
            "status": "subscribed",
            "email_type": "html",
            "merge_fields": {"FNAME": "A", "LNAME": "B"}
        }))
    );
    assert!(request.query.is_empty());
}

#[tokio::test]
async fn test_subscribe_with_double_opt_in_interests_and_tags() {
    let transport = RecordingTransport::new();
    let member = MemberUpsert::new("a@example.com", true)
        .interests(BTreeMap::from([("i1".to_string(), true)]))
        .tags(vec!["woocommerce".to_string()]);

    transport
        .client("k-us1")
        .subscribe("L1", &member)
        .await
        .unwrap();

    let body = transport.last_request().unwrap().body.unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["interests"], json!({"i1": true}));
    assert_eq!(body["tags"], json!(["woocommerce"]));
}

#[tokio::test]
async fn test_subscribe_body_email_matches_member_hash() {
    let transport = RecordingTransport::new();

    transport
        .client("k-us1")
        .subscribe("L1", &MemberUpsert::new(" A@Example.COM", false))
        .await
        .unwrap();

    let request = transport.last_request().unwrap();
    assert!(request
        .url
        .ends_with(&format!("/members/{}", subscriber_hash("a@example.com"))));
    assert_eq!(request.body.unwrap()["email_address"], "a@example.com");
}

#[tokio::test]
async fn test_repeated_subscribe_converges() {
    let members = FakeMembers::new();
    let client = members.client("k-us1");
    let member = MemberUpsert::new("a@example.com", false).merge_field("FNAME", "A");

    let first = client.subscribe("L1", &member).await.unwrap();
    let second = client.subscribe("L1", &member).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(members.member_count(), 1);
    assert_eq!(
        members
            .member("L1", &subscriber_hash("a@example.com"))
            .unwrap()["status"],
        "subscribed"
    );
}

#[tokio::test]
async fn test_http_error_maps_to_api_error() {
    let transport = RecordingTransport::new().with_json(400, json!({"detail": "Invalid Resource"}));

    let err = transport
        .client("k-us1")
        .subscribe("L1", &MemberUpsert::new("a@example.com", false))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MailchimpError::Api {
            status: 400,
            code: "400".into(),
            message: "Invalid Resource".into(),
        }
    );
}

#[tokio::test]
async fn test_transport_failure_is_surfaced_once() {
    let transport = RecordingTransport::new().with_transport_error("dns error");

    let err = transport.client("k-us1").get_lists().await.unwrap_err();

    assert_eq!(err.code(), TRANSPORT_ERROR_CODE);
    assert_eq!(err.message(), "dns error");
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_malformed_success_body_is_parse_error() {
    let transport = RecordingTransport::new().with_response(200, "<html>");

    let err = transport.client("k-us1").get_lists().await.unwrap_err();

    assert!(matches!(err, MailchimpError::Parse(_)));
}

#[tokio::test]
async fn test_cached_lookups_hit_transport_once() {
    let transport = RecordingTransport::new()
        .with_json(200, json!({"lists": [{"id": "L1", "name": "Customers"}]}));
    let client = transport
        .client("k-us1")
        .with_cache(Arc::new(MemoryCache::new()), Duration::from_secs(3600));

    let first = client.get_lists().await.unwrap();
    let second = client.get_lists().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_cache_is_scoped_per_api_key() {
    let transport = RecordingTransport::new()
        .with_json(200, json!({"lists": [{"id": "L1", "name": "Customers"}]}))
        .with_json(200, json!({"lists": [{"id": "L9", "name": "Other account"}]}));
    let client = transport
        .client("k-us1")
        .with_cache(Arc::new(MemoryCache::new()), Duration::from_secs(3600));

    client.get_lists().await.unwrap();
    let other = client.with_api_key("z-us2").get_lists().await.unwrap();

    assert!(other.contains_key("L9"));
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_base_url_override() {
    let transport = RecordingTransport::new().with_json(200, json!({"account_id": "acc", "account_name": "Shop"}));
    let client = transport
        .client("k-us6")
        .with_base_url("http://localhost:8080/3.0/");

    let account = tokio_test::block_on(client.ping()).unwrap();

    assert_eq!(account.account_name, "Shop");
    assert_eq!(
        transport.last_request().unwrap().url,
        "http://localhost:8080/3.0/"
    );
}
