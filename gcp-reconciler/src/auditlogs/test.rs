use super::*;
use crate::{
    events::Event,
    gclient::iam::PUBSUB_PUBLISHER,
    reconciler::Driver,
    resources::{make_pull_subscription, make_topic},
    testing::{Action, FakeCloud, FakeRecorder, FakeRepository, Verb, TEST_PROJECT},
};
use gcp_conditions::{ConditionAccessor, ConditionStatus};
use gcp_events::apis::{
    events::v1::{CloudAuditLogsSourceCondition, CloudAuditLogsSourceSpec},
    intevents::v1::{
        PullSubscription, PullSubscriptionConditionManager, PullSubscriptionStatus, Topic, TopicCondition,
        TopicStatus,
    },
};
use gcp_duck::source_types::SinkManager;
use k8s_openapi::{api::core::v1::ServiceAccount, apimachinery::pkg::apis::meta::v1::Time};
use std::sync::Arc;

const NS: &str = "testnamespace";
const NAME: &str = "test-cal";
const UID: &str = "test-cal-uid";
const KEY: &str = "testnamespace/test-cal";
const TOPIC_ID: &str = "cre-src_testnamespace_test-cal_test-cal-uid";
const SINK_ID: &str = "cre-src_testnamespace_test-cal_test-cal-uid";
const SUBSCRIPTION_ID: &str = "subscriptionID";
const SINK_URI: &str = "http://sink.mynamespace.svc.cluster.local/";
const GSA: &str = "test123@test123.iam.gserviceaccount.com";
const FILTER: &str = r#"protoPayload.methodName="test-method" AND protoPayload.serviceName="test-service" AND protoPayload."@type"="type.googleapis.com/google.cloud.audit.AuditLog""#;
const INDUCED: &str = "create-client-induced-error";

use CloudAuditLogsSourceCondition::*;

fn source() -> CloudAuditLogsSource {
    let spec: CloudAuditLogsSourceSpec = serde_yaml::from_str(r#"
serviceName: test-service
methodName: test-method
sink:
  ref:
    apiVersion: testing.cloud.google.com/v1
    kind: Sink
    name: sink
"#).unwrap();
    let mut source = CloudAuditLogsSource::new(NAME, spec);
    source.metadata.namespace = Some(NS.into());
    source.metadata.uid = Some(UID.into());
    source.metadata.generation = Some(1);
    source
}

fn with_finalizer(mut source: CloudAuditLogsSource) -> CloudAuditLogsSource {
    source.metadata.finalizers = Some(vec![RESOURCE_GROUP.into()]);
    source
}

fn with_service_account(mut source: CloudAuditLogsSource) -> CloudAuditLogsSource {
    source.spec.pubsub.service_account_name = Some(GSA.into());
    source
}

fn ready_status() -> CloudAuditLogsSourceStatus {
    let mut status = CloudAuditLogsSourceStatus::default();
    status.mark_workload_identity_not_required();
    status.mark_topic_ready(TEST_PROJECT.into(), TOPIC_ID.into());
    status.mark_pullsubscription_ready(Some(SUBSCRIPTION_ID.into()), SINK_URI.parse().unwrap());
    status.mark_sink_ready(SINK_ID.into());
    status
}

fn terminating() -> CloudAuditLogsSource {
    let mut source = with_finalizer(source());
    source.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    source.status = Some(ready_status());
    source
}

fn args(source: &CloudAuditLogsSource) -> PubSubArgs<'_> {
    PubSubArgs {
        namespace: NS,
        name: NAME,
        spec: &source.spec.pubsub,
        owner: source.controller_owner_ref(&()).unwrap(),
        topic_id: TOPIC_ID.into(),
        adapter_type: ADAPTER_TYPE,
        resource_group: RESOURCE_GROUP,
        receive_adapter: RECEIVE_ADAPTER_NAME,
    }
}

/// The Topic of `source()`, reporting `status`.
fn topic(status: Option<TopicStatus>) -> Topic {
    let source = source();
    let mut topic = make_topic(&args(&source));
    topic.status = status;
    topic
}

fn topic_status(ready: ConditionStatus, project_id: Option<&str>, topic_id: Option<&str>) -> TopicStatus {
    let mut status = TopicStatus {
        project_id: project_id.map(Into::into),
        topic_id: topic_id.map(Into::into),
        ..Default::default()
    };
    match ready {
        ConditionStatus::True => status.manager().mark_true(TopicCondition::TopicReady),
        ConditionStatus::False => {
            status.manager().mark_false(TopicCondition::TopicReady, "TopicFailed", Some("topic failed".into()))
        }
        ConditionStatus::Unknown => {
            status.manager().mark_unknown(TopicCondition::TopicReady, "TopicUnknown", Some("topic unknown".into()))
        }
    }
    status
}

fn ready_topic() -> Topic {
    topic(Some(topic_status(ConditionStatus::True, Some(TEST_PROJECT), Some(TOPIC_ID))))
}

fn pull_subscription(status: Option<PullSubscriptionStatus>) -> PullSubscription {
    let source = source();
    let mut ps = make_pull_subscription(&args(&source));
    ps.status = status;
    ps
}

fn ready_pull_subscription() -> PullSubscription {
    let mut status = PullSubscriptionStatus {
        project_id: Some(TEST_PROJECT.into()),
        subscription_id: Some(SUBSCRIPTION_ID.into()),
        ..Default::default()
    };
    status.mark_sink(SINK_URI.parse().unwrap());
    status.mark_subscriptionready();
    status.mark_deployed();
    pull_subscription(Some(status))
}

struct Harness {
    sources: Arc<FakeRepository<CloudAuditLogsSource>>,
    topics: Arc<FakeRepository<Topic>>,
    pull_subscriptions: Arc<FakeRepository<PullSubscription>>,
    service_accounts: Arc<FakeRepository<ServiceAccount>>,
    recorder: Arc<FakeRecorder>,
    cloud: FakeCloud,
    driver: Driver<Reconciler>,
}

impl Harness {
    fn new(source: CloudAuditLogsSource, topic: Option<Topic>, ps: Option<PullSubscription>) -> Self {
        let sources = Arc::new(FakeRepository::with([source]));
        let topics = Arc::new(FakeRepository::with(topic));
        let pull_subscriptions = Arc::new(FakeRepository::with(ps));
        let service_accounts = Arc::new(FakeRepository::default());
        let recorder = Arc::new(FakeRecorder::default());
        let cloud = FakeCloud::default();

        let reconciler = Reconciler::new(
            PubSubBase::new(topics.clone(), pull_subscriptions.clone()),
            Identity::new(service_accounts.clone(), Arc::new(cloud.clone())),
            cloud.clients(),
            RECEIVE_ADAPTER_NAME,
        );
        let driver = Driver::new(reconciler, sources.clone(), recorder.clone(), RESOURCE_GROUP);

        Harness { sources, topics, pull_subscriptions, service_accounts, recorder, cloud, driver }
    }

    async fn reconcile(&self) -> Result<()> {
        self.driver.reconcile(KEY).await
    }

    fn source(&self) -> CloudAuditLogsSource {
        self.sources.stored(NS, NAME).unwrap()
    }

    fn status(&self) -> CloudAuditLogsSourceStatus {
        self.source().status.unwrap()
    }

    fn events(&self) -> Vec<Event> {
        self.recorder.events()
    }

    /// Status, reason and message of a condition of the stored source.
    fn condition(&self, type_: CloudAuditLogsSourceCondition) -> (ConditionStatus, Option<String>, Option<String>) {
        let status = self.status();
        let condition = status.pubsub.source_status.status.conditions.get(type_).unwrap().clone();
        (condition.status, condition.reason, condition.message)
    }
}

fn unknown(reason: &str, message: &str) -> (ConditionStatus, Option<String>, Option<String>) {
    (ConditionStatus::Unknown, Some(reason.into()), Some(message.into()))
}

fn failed(reason: &str, message: &str) -> (ConditionStatus, Option<String>, Option<String>) {
    (ConditionStatus::False, Some(reason.into()), Some(message.into()))
}

fn finalizer_added() -> Action {
    Action::PatchFinalizers(KEY.into(), vec![RESOURCE_GROUP.into()])
}

fn finalizer_event() -> Event {
    Event::normal("FinalizerUpdate", r#"Updated "test-cal" finalizers"#)
}

#[tokio::test]
async fn bad_workqueue_key() {
    let h = Harness::new(source(), None, None);
    h.driver.reconcile("too/many/keys").await.unwrap();
    assert!(h.sources.actions().is_empty());
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn key_not_found() {
    let h = Harness::new(source(), None, None);
    h.driver.reconcile("foo/not-found").await.unwrap();
    assert!(h.sources.actions().is_empty());
    assert!(h.topics.actions().is_empty());
}

#[tokio::test]
async fn topic_created_not_yet_reconciled() {
    let h = Harness::new(source(), None, None);
    let err = h.reconcile().await.unwrap_err();
    assert_eq!(err.to_string(), r#"Reconcile PubSub failed with: Topic "test-cal" has not yet been reconciled"#);

    assert_eq!(h.topics.actions(), [Action::Create(KEY.into())]);
    assert_eq!(h.topics.stored(NS, NAME).unwrap().spec, topic(None).spec);
    assert!(h.pull_subscriptions.actions().is_empty());
    assert_eq!(h.sources.actions(), [finalizer_added(), Action::UpdateStatus(KEY.into())]);
    assert_eq!(h.events(), [
        finalizer_event(),
        Event::warning(
            "PubSubReconcileFailed",
            r#"Reconcile PubSub failed with: Topic "test-cal" has not yet been reconciled"#,
        ),
    ]);

    let expected = unknown("TopicNotConfigured", "Topic has not yet been reconciled");
    assert_eq!(h.condition(TopicReady), expected);
    assert_eq!(h.condition(Ready), expected);
    assert_eq!(h.status().pubsub.source_status.status.observed_generation, Some(1));
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn topic_status_is_propagated() {
    let cases = [
        (ConditionStatus::Unknown, r#"the status of Topic "test-cal" is Unknown"#, unknown("TopicUnknown", "topic unknown")),
        (ConditionStatus::False, r#"the status of Topic "test-cal" is False"#, failed("TopicFailed", "topic failed")),
    ];
    for (ready, message, expected) in cases {
        let topic = topic(Some(topic_status(ready, None, None)));
        let h = Harness::new(source(), Some(topic), None);
        let err = h.reconcile().await.unwrap_err();

        assert_eq!(err.to_string(), format!("Reconcile PubSub failed with: {message}"));
        assert!(h.topics.actions().is_empty());
        assert!(h.pull_subscriptions.actions().is_empty());
        assert_eq!(h.condition(TopicReady), expected);
        assert_eq!(h.condition(Ready), expected);
    }
}

#[tokio::test]
async fn ready_topic_must_expose_its_identifiers() {
    let cases = [
        (None, Some(TOPIC_ID), r#"Topic "test-cal" did not expose projectid"#.to_string()),
        (Some(TEST_PROJECT), None, r#"Topic "test-cal" did not expose topicid"#.to_string()),
        (
            Some(TEST_PROJECT),
            Some("garbaaaaage"),
            format!(r#"Topic "test-cal" mismatch: expected "{TOPIC_ID}" got "garbaaaaage""#),
        ),
    ];
    for (project_id, topic_id, message) in cases {
        let topic = topic(Some(topic_status(ConditionStatus::True, project_id, topic_id)));
        let h = Harness::new(source(), Some(topic), None);
        let err = h.reconcile().await.unwrap_err();

        assert_eq!(err.to_string(), format!("Reconcile PubSub failed with: {message}"));
        assert_eq!(err.classification(), crate::error::Classification::InvariantViolation);
        assert_eq!(h.condition(TopicReady), failed("TopicNotReady", &message));
        assert!(h.status().pubsub.topic_id.is_none());
        assert!(h.pull_subscriptions.actions().is_empty());
        assert_eq!(h.events().last().unwrap().reason, "PubSubReconcileFailed");
    }
}

#[tokio::test]
async fn pull_subscription_created_not_yet_reconciled() {
    let h = Harness::new(source(), Some(ready_topic()), None);
    let err = h.reconcile().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"Reconcile PubSub failed with: Failed to propagate PullSubscription status: PullSubscription "test-cal" has not yet been reconciled"#
    );

    assert_eq!(h.pull_subscriptions.actions(), [Action::Create(KEY.into())]);
    let ps = h.pull_subscriptions.stored(NS, NAME).unwrap();
    assert_eq!(ps.spec.topic, TOPIC_ID);
    assert_eq!(ps.spec.adapter_type.as_deref(), Some("google.cloud.audit.log.v1"));
    assert_eq!(ps.metadata.annotations.unwrap()["metrics-resource-group"], RESOURCE_GROUP);

    let status = h.status();
    assert_eq!(status.pubsub.project_id.as_deref(), Some(TEST_PROJECT));
    assert_eq!(status.pubsub.topic_id.as_deref(), Some(TOPIC_ID));
    assert_eq!(h.condition(TopicReady).0, ConditionStatus::True);
    assert_eq!(
        h.condition(PullSubscriptionReady),
        unknown("PullSubscriptionNotConfigured", "PullSubscription has not yet been reconciled")
    );
}

#[tokio::test]
async fn pull_subscription_status_is_propagated() {
    let mut invalid_sink = PullSubscriptionStatus::default();
    invalid_sink.mark_no_sink("InvalidSink", Some(r#"sinks.testing.cloud.google.com "sink" not found"#.into()));

    let cases = [
        (
            PullSubscriptionStatus::default(),
            r#"the status of PullSubscription "test-cal" is Unknown"#,
            (ConditionStatus::Unknown, None, None),
        ),
        (
            invalid_sink,
            r#"the status of PullSubscription "test-cal" is False"#,
            failed("InvalidSink", r#"sinks.testing.cloud.google.com "sink" not found"#),
        ),
    ];
    for (ps_status, message, expected) in cases {
        let h = Harness::new(source(), Some(ready_topic()), Some(pull_subscription(Some(ps_status))));
        let err = h.reconcile().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("Reconcile PubSub failed with: Failed to propagate PullSubscription status: {message}")
        );
        assert!(h.pull_subscriptions.actions().is_empty());
        assert_eq!(h.condition(PullSubscriptionReady), expected);
        assert!(h.status().pubsub.source_status.sink_uri.is_none());
        assert!(h.cloud.calls().is_empty());
    }
}

#[tokio::test]
async fn ready_pull_subscription_must_expose_its_sink() {
    let mut status = PullSubscriptionStatus::default();
    status.mark_sink(SINK_URI.parse().unwrap());
    status.mark_subscriptionready();
    status.mark_deployed();
    status.source_status.sink_uri = None;

    let h = Harness::new(source(), Some(ready_topic()), Some(pull_subscription(Some(status))));
    let err = h.reconcile().await.unwrap_err();
    assert_eq!(err.classification(), crate::error::Classification::InvariantViolation);
    assert_eq!(
        h.condition(PullSubscriptionReady),
        failed("PullSubscriptionNotReady", r#"PullSubscription "test-cal" did not expose sinkuri"#)
    );
}

#[tokio::test]
async fn drifted_children_are_replaced() {
    let mut drifted = ready_topic();
    drifted.spec.enable_publisher = Some(true);
    let h = Harness::new(source(), Some(drifted), Some(ready_pull_subscription()));
    h.reconcile().await.unwrap();

    assert_eq!(h.topics.actions(), [Action::Replace(KEY.into())]);
    let topic = h.topics.stored(NS, NAME).unwrap();
    assert_eq!(topic.spec.enable_publisher, Some(false));
    // the status of the child is kept
    assert_eq!(topic.status.unwrap().topic_id.as_deref(), Some(TOPIC_ID));
}

#[tokio::test]
async fn child_api_failures_are_reported() {
    let h = Harness::new(source(), None, None);
    h.topics.fail(Verb::Create, "create-topic-induced-error");
    let err = h.reconcile().await.unwrap_err();

    assert_eq!(err.classification(), crate::error::Classification::ExternalCallFailed);
    let (status, reason, message) = h.condition(TopicReady);
    assert_eq!(status, ConditionStatus::False);
    assert_eq!(reason.as_deref(), Some("TopicCreateFailed"));
    assert!(message.unwrap().contains("create-topic-induced-error"));
}

#[tokio::test]
async fn sink_failures() {
    let create_failed = |e: &str| failed("SinkCreateFailed", &format!("failed to ensure creation of logging sink: {e}"));
    let not_publisher = |e: &str| {
        failed("SinkNotPublisher", &format!("failed to ensure sink has pubsub.publisher permission on source topic: {e}"))
    };

    type Inject = fn(&mut crate::testing::Faults);
    let cases: [(&str, Inject, _); 6] = [
        ("logging client create fails", |f| f.logadmin_client = Some(INDUCED.into()), create_failed(INDUCED)),
        ("get sink fails", |f| f.sink = Some(INDUCED.into()), create_failed(INDUCED)),
        ("create sink fails", |f| f.create_sink = Some(INDUCED.into()), create_failed(INDUCED)),
        ("pubsub client create fails", |f| f.pubsub_client = Some(INDUCED.into()), not_publisher(INDUCED)),
        ("get pubsub IAM policy fails", |f| f.policy = Some(INDUCED.into()), not_publisher(INDUCED)),
        ("set pubsub IAM policy fails", |f| f.set_policy = Some(INDUCED.into()), not_publisher(INDUCED)),
    ];

    for (name, inject, expected) in cases {
        let h = Harness::new(source(), Some(ready_topic()), Some(ready_pull_subscription()));
        h.cloud.fail(inject);
        let err = h.reconcile().await.unwrap_err();

        assert_eq!(err.to_string(), format!("Reconcile Sink failed with: {INDUCED}"), "{name}");
        assert_eq!(h.events(), [
            finalizer_event(),
            Event::warning("SinkReconcileFailed", format!("Reconcile Sink failed with: {INDUCED}")),
        ], "{name}");
        assert_eq!(h.condition(SinkReady), expected, "{name}");
        assert_eq!(h.condition(Ready), expected, "{name}");

        let status = h.status();
        assert_eq!(status.pubsub.subscription_id.as_deref(), Some(SUBSCRIPTION_ID), "{name}");
        assert_eq!(status.pubsub.source_status.sink_uri.as_ref().map(|u| u.as_str()), Some(SINK_URI), "{name}");
        assert!(status.stackdriver_sink.is_none(), "{name}");
    }
}

#[tokio::test]
async fn sink_created() {
    let h = Harness::new(source(), Some(ready_topic()), Some(ready_pull_subscription()));
    h.reconcile().await.unwrap();

    let sink = h.cloud.sink(TEST_PROJECT, SINK_ID).unwrap();
    assert_eq!(sink.filter, FILTER);
    assert_eq!(sink.destination, format!("pubsub.googleapis.com/projects/{TEST_PROJECT}/topics/{TOPIC_ID}"));
    assert!(h.cloud.topic_policy(TEST_PROJECT, TOPIC_ID).has(&sink.writer_identity, PUBSUB_PUBLISHER));

    assert_eq!(h.events(), [
        finalizer_event(),
        Event::normal("CloudAuditLogsSourceReconciled", r#"CloudAuditLogsSource reconciled: "testnamespace/test-cal""#),
    ]);

    let status = h.status();
    assert!(h.source().status.unwrap().is_ready());
    assert_eq!(status.stackdriver_sink.as_deref(), Some(SINK_ID));
    assert_eq!(status.pubsub.subscription_id.as_deref(), Some(SUBSCRIPTION_ID));
    assert_eq!(h.condition(WorkloadIdentityReady).1.as_deref(), Some("WorkloadIdentityNotRequired"));
}

#[tokio::test]
async fn sink_exists() {
    let h = Harness::new(source(), Some(ready_topic()), Some(ready_pull_subscription()));
    let existing = Sink {
        id: SINK_ID.into(),
        destination: format!("pubsub.googleapis.com/projects/{TEST_PROJECT}/topics/{TOPIC_ID}"),
        filter: FILTER.into(),
        writer_identity: "serviceAccount:writer@gcp-sa-logging.iam.gserviceaccount.com".into(),
    };
    h.cloud.add_sink(TEST_PROJECT, existing);
    h.reconcile().await.unwrap();

    assert_eq!(h.cloud.calls(), [format!("set_policy projects/{TEST_PROJECT}/topics/{TOPIC_ID}")]);
    assert_eq!(h.status().stackdriver_sink.as_deref(), Some(SINK_ID));
    assert_eq!(h.events().last().unwrap().reason, "CloudAuditLogsSourceReconciled");
}

#[tokio::test]
async fn reconciling_a_converged_source_is_a_no_op() {
    let h = Harness::new(source(), Some(ready_topic()), Some(ready_pull_subscription()));
    h.reconcile().await.unwrap();

    let sources = h.sources.actions();
    let calls = h.cloud.calls();
    let events = h.events();
    let status = h.status();

    h.reconcile().await.unwrap();
    assert_eq!(h.sources.actions(), sources);
    assert_eq!(h.cloud.calls(), calls);
    assert_eq!(h.events(), events);
    assert!(h.topics.actions().is_empty());
    assert!(h.pull_subscriptions.actions().is_empty());
    // transition times survive the recomputation
    assert_eq!(h.status(), status);
}

#[tokio::test]
async fn repeated_failure_is_written_once() {
    let topic = topic(Some(topic_status(ConditionStatus::Unknown, None, None)));
    let h = Harness::new(source(), Some(topic), None);
    h.reconcile().await.unwrap_err();
    h.reconcile().await.unwrap_err();

    assert_eq!(h.sources.actions(), [finalizer_added(), Action::UpdateStatus(KEY.into())]);
    assert_eq!(h.events().len(), 2);
}

#[tokio::test]
async fn workload_identity_is_bound_first() {
    let h = Harness::new(with_service_account(source()), None, None);
    h.reconcile().await.unwrap_err();

    let ksa = h.service_accounts.stored(NS, "cre-test123").unwrap();
    assert_eq!(ksa.annotations()["iam.gke.io/gcp-service-account"], GSA);
    assert_eq!(ksa.owner_references()[0].uid, UID);
    assert!(h.cloud.service_account_policy(GSA).has(
        &format!("serviceAccount:{TEST_PROJECT}.svc.id.goog[{NS}/cre-test123]"),
        crate::gclient::iam::WORKLOAD_IDENTITY_USER,
    ));

    let status = h.status();
    assert_eq!(status.pubsub.service_account_name.as_deref(), Some("cre-test123"));
    assert_eq!(h.condition(WorkloadIdentityReady).0, ConditionStatus::True);
    // the children run as the Google service account, without a secret
    let topic = h.topics.stored(NS, NAME).unwrap();
    assert_eq!(topic.spec.secret, None);
    assert_eq!(topic.spec.service_account_name.as_deref(), Some(GSA));
}

#[tokio::test]
async fn workload_identity_failure_stops_the_reconcile() {
    let h = Harness::new(with_service_account(source()), None, None);
    h.cloud.fail(|f| f.iam_client = Some("iam-induced-error".into()));
    let err = h.reconcile().await.unwrap_err();

    assert_eq!(err.to_string(), "Reconcile WorkloadIdentity failed with: iam-induced-error");
    assert_eq!(h.events().last().unwrap().reason, "WorkloadIdentityReconcileFailed");
    assert_eq!(h.condition(WorkloadIdentityReady), failed("WorkloadIdentityFailed", "iam-induced-error"));
    assert!(h.topics.actions().is_empty());
}

#[tokio::test]
async fn sink_delete_fails() {
    let h = Harness::new(terminating(), Some(ready_topic()), Some(ready_pull_subscription()));
    h.cloud.add_sink(TEST_PROJECT, Sink { id: SINK_ID.into(), ..Default::default() });
    h.cloud.fail(|f| f.delete_sink = Some("delete-sink-induced-error".into()));
    h.reconcile().await.unwrap_err();

    assert_eq!(h.events(), [
        Event::warning("SinkDeleteFailed", "Failed to delete Stackdriver sink: delete-sink-induced-error"),
    ]);
    // no status update and the finalizer stays
    assert!(h.sources.actions().is_empty());
    assert!(h.topics.actions().is_empty());
    assert!(h.pull_subscriptions.actions().is_empty());
}

#[tokio::test]
async fn sink_delete_succeeds() {
    for sink_exists in [true, false] {
        let h = Harness::new(terminating(), Some(ready_topic()), Some(ready_pull_subscription()));
        if sink_exists {
            h.cloud.add_sink(TEST_PROJECT, Sink { id: SINK_ID.into(), ..Default::default() });
        }
        h.reconcile().await.unwrap();

        assert_eq!(h.cloud.calls(), [format!("delete_sink {TEST_PROJECT}/{SINK_ID}")]);
        assert!(h.cloud.sink(TEST_PROJECT, SINK_ID).is_none());
        assert_eq!(h.pull_subscriptions.actions(), [Action::Delete(KEY.into())]);
        assert_eq!(h.topics.actions(), [Action::Delete(KEY.into())]);
        assert_eq!(h.sources.actions(), [
            Action::UpdateStatus(KEY.into()),
            Action::PatchFinalizers(KEY.into(), vec![]),
        ]);
        assert_eq!(h.events(), [finalizer_event()]);

        let status = h.status();
        assert_eq!(h.condition(TopicReady), failed("TopicDeleted", "Successfully deleted Topic: test-cal"));
        assert_eq!(
            h.condition(PullSubscriptionReady),
            failed("PullSubscriptionDeleted", "Successfully deleted PullSubscription: test-cal")
        );
        assert_eq!(h.condition(SinkReady).0, ConditionStatus::True);
        assert!(status.stackdriver_sink.is_none());
        assert!(status.pubsub.project_id.is_none());
        assert!(status.pubsub.source_status.sink_uri.is_none());
        assert!(h.source().metadata.finalizers.unwrap().is_empty());
    }
}

#[tokio::test]
async fn sink_is_deleted_after_the_status_lost_its_project() {
    let h = Harness::new(source(), Some(ready_topic()), Some(ready_pull_subscription()));
    h.reconcile().await.unwrap();
    assert!(h.cloud.sink(TEST_PROJECT, SINK_ID).is_some());

    // the Topic goes Unknown for a while, the recomputed status forgets the project
    h.topics.insert(topic(Some(topic_status(ConditionStatus::Unknown, None, None))));
    h.reconcile().await.unwrap_err();
    assert_eq!(h.status().pubsub.project_id, None);

    let mut source = h.source();
    source.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    h.sources.insert(source);
    h.reconcile().await.unwrap();

    assert!(h.cloud.sink(TEST_PROJECT, SINK_ID).is_none());
    assert_eq!(h.cloud.calls().last().unwrap(), &format!("delete_sink {TEST_PROJECT}/{SINK_ID}"));
    assert!(h.source().metadata.finalizers.unwrap().is_empty());
}

#[tokio::test]
async fn unresolvable_project_keeps_the_finalizer() {
    let mut source = terminating();
    source.status = None;
    let h = Harness::new(source, Some(ready_topic()), Some(ready_pull_subscription()));
    h.cloud.add_sink(TEST_PROJECT, Sink { id: SINK_ID.into(), ..Default::default() });
    h.cloud.fail(|f| f.metadata = Some("metadata-induced-error".into()));
    h.reconcile().await.unwrap_err();

    assert_eq!(h.events(), [
        Event::warning(
            "SinkDeleteFailed",
            "Failed to delete Stackdriver sink: failed to resolve project: metadata-induced-error",
        ),
    ]);
    assert!(h.cloud.sink(TEST_PROJECT, SINK_ID).is_some());
    assert!(h.sources.actions().is_empty());
    assert!(h.topics.actions().is_empty());
    assert!(h.pull_subscriptions.actions().is_empty());
    assert_eq!(h.source().metadata.finalizers, Some(vec![RESOURCE_GROUP.to_string()]));
}

#[tokio::test]
async fn spec_project_locates_the_sink_to_delete() {
    let mut source = terminating();
    source.spec.pubsub.project = Some("other-project".into());
    source.status = None;
    let h = Harness::new(source, Some(ready_topic()), Some(ready_pull_subscription()));
    h.cloud.add_sink("other-project", Sink { id: SINK_ID.into(), ..Default::default() });
    h.cloud.fail(|f| f.metadata = Some("metadata-induced-error".into()));
    h.reconcile().await.unwrap();

    assert_eq!(h.cloud.calls(), [format!("delete_sink other-project/{SINK_ID}")]);
    assert!(h.cloud.sink("other-project", SINK_ID).is_none());
}

#[tokio::test]
async fn existing_sink_without_writer_identity() {
    let h = Harness::new(source(), Some(ready_topic()), Some(ready_pull_subscription()));
    h.cloud.add_sink(TEST_PROJECT, Sink {
        id: SINK_ID.into(),
        destination: format!("pubsub.googleapis.com/projects/{TEST_PROJECT}/topics/{TOPIC_ID}"),
        filter: FILTER.into(),
        writer_identity: String::new(),
    });
    let err = h.reconcile().await.unwrap_err();

    assert_eq!(err.to_string(), "Reconcile Sink failed with: sink has no writer identity");
    assert_eq!(h.condition(SinkReady), failed(
        "SinkNotPublisher",
        "failed to ensure sink has pubsub.publisher permission on source topic: sink has no writer identity",
    ));
    assert!(h.cloud.calls().is_empty());
    assert_eq!(h.status().stackdriver_sink, None);
}

#[tokio::test]
async fn terminating_without_finalizer_is_left_alone() {
    let mut source = terminating();
    source.metadata.finalizers = Some(vec!["someone-else".into()]);
    let h = Harness::new(source, Some(ready_topic()), Some(ready_pull_subscription()));
    h.reconcile().await.unwrap();

    assert!(h.cloud.calls().is_empty());
    assert!(h.sources.actions().is_empty());
    assert!(h.topics.actions().is_empty());
    assert!(h.events().is_empty());
}
