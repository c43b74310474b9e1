use std::sync::{Arc, Mutex};
use std::time::Duration;

use applink_bulk::bulk::{
    spawn_bulk_load, BulkJobScheduler, BulkObserver, BulkOutcome, DriverState,
};
use applink_bulk::config::BulkSettings;
use applink_bulk::registry::ConnectionRegistry;
use applink_bulk::salesforce::Session;
use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB_ID: &str = "750xx0000000042AAA";

#[derive(Default)]
struct CollectingObserver {
    outcomes: Mutex<Vec<BulkOutcome>>,
}

impl BulkObserver for CollectingObserver {
    fn on_complete(&self, outcome: &BulkOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

fn registry_for(name: &str, instance_url: &str) -> ConnectionRegistry {
    let session = Session::new(
        instance_url,
        "v62.0",
        SecretString::from("bulk-session".to_string()),
    )
    .unwrap();
    ConnectionRegistry::from_sessions([(name.to_string(), session)])
}

fn xml(status: u16, body: String) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body, "application/xml")
}

fn batch_list(state: &str) -> ResponseTemplate {
    xml(
        200,
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><batchInfoList xmlns="http://www.force.com/2009/06/asyncapi/dataload"><batchInfo><id>751xx0000000042AAA</id><jobId>{}</jobId><state>{}</state></batchInfo></batchInfoList>"#,
            JOB_ID, state
        ),
    )
}

fn settings() -> BulkSettings {
    BulkSettings {
        poll_interval: Duration::from_millis(5),
        ..BulkSettings::default()
    }
}

async fn mount_guard(org: &MockServer, total: u64, records: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/services/data/v62.0/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "totalSize": total,
            "done": true,
            "records": records
        })))
        .expect(1)
        .mount(org)
        .await;
}

#[tokio::test]
async fn existing_bulk_accounts_skip_the_load() {
    let org = MockServer::start().await;
    mount_guard(&org, 1, serde_json::json!([{ "Id": "001xx0000000001" }])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&org)
        .await;

    let observer = Arc::new(CollectingObserver::default());
    let handle = spawn_bulk_load(
        &registry_for("empty-org", &org.uri()),
        reqwest::Client::new(),
        &settings(),
        &BulkJobScheduler::single(),
        observer.clone(),
    )
    .expect("target is registered");

    let outcome = handle.await.unwrap();

    assert_eq!(outcome.state, DriverState::Skipped);
    assert_eq!(observer.outcomes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn load_submits_csv_and_polls_to_completion() {
    let org = MockServer::start().await;
    mount_guard(&org, 0, serde_json::json!([])).await;

    Mock::given(method("POST"))
        .and(path("/services/async/62.0/job"))
        .and(header("X-SFDC-Session", "bulk-session"))
        .and(body_string_contains("<object>Account</object>"))
        .respond_with(xml(
            201,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><jobInfo xmlns="http://www.force.com/2009/06/asyncapi/dataload"><id>{}</id><operation>insert</operation><object>Account</object><state>Open</state><contentType>CSV</contentType></jobInfo>"#,
                JOB_ID
            ),
        ))
        .expect(1)
        .mount(&org)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/services/async/62.0/job/{}/batch", JOB_ID)))
        .and(header("Content-Type", "text/csv"))
        .and(body_string_contains("Bulk Account 1000,123 Main St Apt 1000"))
        .respond_with(xml(
            201,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><batchInfo xmlns="http://www.force.com/2009/06/asyncapi/dataload"><id>751xx0000000042AAA</id><jobId>{}</jobId><state>Queued</state></batchInfo>"#,
                JOB_ID
            ),
        ))
        .expect(1)
        .mount(&org)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/services/async/62.0/job/{}/batch", JOB_ID)))
        .respond_with(batch_list("InProgress"))
        .up_to_n_times(2)
        .mount(&org)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/services/async/62.0/job/{}/batch", JOB_ID)))
        .respond_with(batch_list("Completed"))
        .mount(&org)
        .await;

    let observer = Arc::new(CollectingObserver::default());
    let handle = spawn_bulk_load(
        &registry_for("empty-org", &org.uri()),
        reqwest::Client::new(),
        &settings(),
        &BulkJobScheduler::single(),
        observer.clone(),
    )
    .expect("target is registered");

    let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("load finishes")
        .unwrap();

    assert_eq!(outcome.state, DriverState::Completed);
    assert_eq!(outcome.polls, 3);
    assert_eq!(outcome.job_id.as_deref(), Some(JOB_ID));
}

#[tokio::test]
async fn load_is_skipped_when_target_not_registered() {
    let org = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&org)
        .await;

    let handle = spawn_bulk_load(
        &registry_for("orgA", &org.uri()),
        reqwest::Client::new(),
        &settings(),
        &BulkJobScheduler::single(),
        Arc::new(CollectingObserver::default()),
    );

    assert!(handle.is_none());
}

#[tokio::test]
async fn second_launch_is_refused_while_slot_is_held() {
    let org = MockServer::start().await;
    let scheduler = BulkJobScheduler::single();
    let _held = scheduler.try_acquire().unwrap();

    let handle = spawn_bulk_load(
        &registry_for("empty-org", &org.uri()),
        reqwest::Client::new(),
        &settings(),
        &scheduler,
        Arc::new(CollectingObserver::default()),
    );

    assert!(handle.is_none());
}
