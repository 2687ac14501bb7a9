//! Manager listing and catalog aggregation.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use catalog_core::{
    merge_catalog, CatalogEntry, EventType, ManagerNode, PlatformApi, PlatformError,
    PublisherRecord, SubscriberRecord,
};

/// Names of the platform collections the dashboard reads.
#[derive(Clone, Debug)]
pub struct CatalogSources {
    /// Resource holding namespace nodes.
    pub manager_resource: String,
    /// Node property that is `"true"` on manager nodes.
    pub manager_property: String,
    /// Procedure returning every event type of a manager.
    pub events_procedure: String,
    pub publishers_resource: String,
    pub subscribers_resource: String,
}

impl Default for CatalogSources {
    fn default() -> Self {
        Self {
            manager_resource: "system.nodes".into(),
            manager_property: "ars_properties.manager".into(),
            events_procedure: "Broker.getAllEvents".into(),
            publishers_resource: "ArsPublisher".into(),
            subscribers_resource: "ArsSubscriber".into(),
        }
    }
}

impl CatalogSources {
    fn manager_filter(&self) -> Value {
        let mut filter = Map::new();
        filter.insert(self.manager_property.clone(), Value::String("true".into()));
        Value::Object(filter)
    }
}

fn decode_all<T: DeserializeOwned>(records: Vec<Value>) -> Result<Vec<T>, PlatformError> {
    records
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(PlatformError::from)
}

/// List the manager nodes of the caller's namespace.
#[instrument(skip_all)]
pub async fn list_managers(
    api: &dyn PlatformApi,
    sources: &CatalogSources,
) -> Result<Vec<ManagerNode>, PlatformError> {
    let records = api
        .select(&sources.manager_resource, &sources.manager_filter())
        .await?;
    let managers: Vec<ManagerNode> = decode_all(records)?;
    debug!(count = managers.len(), "managers listed");
    Ok(managers)
}

async fn fetch_events(
    api: &dyn PlatformApi,
    procedure: &str,
    manager: &ManagerNode,
) -> Result<Vec<EventType>, PlatformError> {
    match api
        .execute(procedure, &json!({ "managerNode": manager.name }))
        .await?
    {
        Value::Array(items) => decode_all(items),
        Value::Null => Ok(Vec::new()),
        other => Err(PlatformError::Decode(format!(
            "{procedure} returned {other} instead of a list"
        ))),
    }
}

async fn fetch_records<T: DeserializeOwned>(
    api: &dyn PlatformApi,
    resource: &str,
) -> Result<Vec<T>, PlatformError> {
    let records = api.select(resource, &json!({})).await?;
    decode_all(records)
}

/// Fetch a manager's event types, publishers and subscribers concurrently
/// and join them by name.
///
/// Any failed fetch fails the whole call; the other fetches are dropped and
/// nothing partial is returned.
#[instrument(skip(api, sources), fields(manager = %manager.name))]
pub async fn fetch_catalog(
    api: &dyn PlatformApi,
    manager: &ManagerNode,
    sources: &CatalogSources,
) -> Result<Vec<CatalogEntry>, PlatformError> {
    let (events, publishers, subscribers) = tokio::try_join!(
        fetch_events(api, &sources.events_procedure, manager),
        fetch_records::<PublisherRecord>(api, &sources.publishers_resource),
        fetch_records::<SubscriberRecord>(api, &sources.subscribers_resource),
    )?;

    debug!(
        events = events.len(),
        publishers = publishers.len(),
        subscribers = subscribers.len(),
        "catalog fetched"
    );
    Ok(merge_catalog(events, publishers, subscribers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCall, MockPlatformFactory, MockTarget, MOCK_ACCESS_TOKEN};
    use catalog_core::AccessToken;
    use std::time::Duration;

    fn factory() -> MockPlatformFactory {
        MockPlatformFactory::new()
            .with_procedure("Broker.getAllEvents", json!([{"name": "E1"}, {"name": "E2"}]))
            .with_resource("ArsPublisher", vec![json!({"name": "E1", "topic": "/e1"})])
            .with_resource("ArsSubscriber", vec![json!({"name": "E2"})])
            .with_resource(
                "system.nodes",
                vec![json!({"name": "east", "ars_properties": {"manager": "true"}})],
            )
    }

    fn signed_in(factory: &MockPlatformFactory) -> crate::mock::MockPlatform {
        let platform = factory.platform();
        platform.set_access_token(AccessToken::new(MOCK_ACCESS_TOKEN));
        platform
    }

    #[tokio::test]
    async fn list_managers_uses_manager_filter() {
        let factory = factory();
        let platform = signed_in(&factory);
        let managers = list_managers(&platform, &CatalogSources::default()).await.unwrap();
        assert_eq!(managers.len(), 1);
        assert_eq!(managers[0].name, "east");
        assert_eq!(
            factory.calls(),
            vec![MockCall::Select {
                resource: "system.nodes".into(),
                filter: json!({"ars_properties.manager": "true"}),
            }]
        );
    }

    #[tokio::test]
    async fn list_managers_rejects_nameless_nodes() {
        let factory = MockPlatformFactory::new().with_resource("system.nodes", vec![json!({"uri": "x"})]);
        let platform = signed_in(&factory);
        let err = list_managers(&platform, &CatalogSources::default()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Decode(_)));
    }

    #[tokio::test]
    async fn catalog_merges_three_collections() {
        let factory = factory();
        let platform = signed_in(&factory);
        let entries = fetch_catalog(&platform, &ManagerNode::new("east"), &CatalogSources::default())
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name(), "E1");
        assert_eq!(entries[0].publisher.as_ref().unwrap().properties["topic"], "/e1");
        assert!(entries[0].subscriber.is_none());
        assert_eq!(entries[1].name(), "E2");
        assert!(entries[1].publisher.is_none());
        assert!(entries[1].subscriber.is_some());

        assert!(factory.calls().contains(&MockCall::Execute {
            procedure: "Broker.getAllEvents".into(),
            args: json!({"managerNode": "east"}),
        }));
    }

    #[tokio::test]
    async fn any_failed_fetch_fails_the_catalog() {
        let targets = [
            MockTarget::Execute("Broker.getAllEvents".into()),
            MockTarget::Select("ArsPublisher".into()),
            MockTarget::Select("ArsSubscriber".into()),
        ];
        for target in targets {
            let factory = factory();
            let platform = signed_in(&factory);
            factory.fail(target.clone(), PlatformError::NetworkError("reset".into()));

            let result =
                fetch_catalog(&platform, &ManagerNode::new("east"), &CatalogSources::default()).await;
            assert!(
                matches!(result, Err(PlatformError::NetworkError(_))),
                "{target:?} failure should fail the catalog"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_run_concurrently() {
        let delay = Duration::from_millis(200);
        let factory = factory()
            .with_delay(MockTarget::Execute("Broker.getAllEvents".into()), delay)
            .with_delay(MockTarget::Select("ArsPublisher".into()), delay)
            .with_delay(MockTarget::Select("ArsSubscriber".into()), delay);
        let platform = signed_in(&factory);

        let started = tokio::time::Instant::now();
        fetch_catalog(&platform, &ManagerNode::new("east"), &CatalogSources::default())
            .await
            .unwrap();
        assert!(started.elapsed() < delay * 2, "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn non_list_event_result_is_a_decode_error() {
        let factory = factory().with_procedure("Broker.getAllEvents", json!({"name": "E1"}));
        let platform = signed_in(&factory);
        let err = fetch_catalog(&platform, &ManagerNode::new("east"), &CatalogSources::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Decode(_)));
    }

    #[tokio::test]
    async fn null_event_result_is_an_empty_catalog() {
        let factory = factory().with_procedure("Broker.getAllEvents", Value::Null);
        let platform = signed_in(&factory);
        let entries = fetch_catalog(&platform, &ManagerNode::new("east"), &CatalogSources::default())
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_catalog_fails() {
        let factory = factory();
        let platform = factory.platform();
        let err = fetch_catalog(&platform, &ManagerNode::new("east"), &CatalogSources::default())
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
    }
}
