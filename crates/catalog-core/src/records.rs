//! Platform records and the name join that turns them into catalog entries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record identified by its `name` field.
pub trait Named {
    fn name(&self) -> &str;
}

macro_rules! named_record {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub name: String,
            /// Every other property of the remote record, kept verbatim.
            #[serde(flatten)]
            pub properties: Map<String, Value>,
        }

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    properties: Map::new(),
                }
            }

            pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
                self.properties.insert(key.into(), value);
                self
            }
        }

        impl Named for $name {
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

named_record!(
    /// A namespace acting as a catalog source of event types.
    ManagerNode
);
named_record!(
    /// A named event schema within a manager's catalog.
    EventType
);
named_record!(
    /// Registration stating that the current namespace produces an event type.
    PublisherRecord
);
named_record!(
    /// Registration stating that the current namespace consumes an event type.
    SubscriberRecord
);

/// One event type with whatever registrations matched it by name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub event: EventType,
    pub publisher: Option<PublisherRecord>,
    pub subscriber: Option<SubscriberRecord>,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.event.name
    }
}

/// Join publishers and subscribers onto events by exact name.
///
/// Output order follows `events`. When several records share a name the
/// first one in input order is attached and the rest are ignored; callers
/// must not rely on which duplicate that is across platform calls.
pub fn merge_catalog(
    events: Vec<EventType>,
    publishers: Vec<PublisherRecord>,
    subscribers: Vec<SubscriberRecord>,
) -> Vec<CatalogEntry> {
    let publishers = first_by_name(publishers);
    let subscribers = first_by_name(subscribers);

    events
        .into_iter()
        .map(|event| CatalogEntry {
            publisher: publishers.get(event.name.as_str()).cloned(),
            subscriber: subscribers.get(event.name.as_str()).cloned(),
            event,
        })
        .collect()
}

fn first_by_name<T: Named>(records: Vec<T>) -> HashMap<String, T> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        index.entry(record.name().to_owned()).or_insert(record);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publisher_attached_subscriber_unset() {
        let merged = merge_catalog(
            vec![EventType::new("E1")],
            vec![PublisherRecord::new("E1")],
            vec![],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name(), "E1");
        assert_eq!(merged[0].publisher, Some(PublisherRecord::new("E1")));
        assert!(merged[0].subscriber.is_none());
    }

    #[test]
    fn duplicate_publishers_attach_exactly_one() {
        let first = PublisherRecord::new("E1").with_property("seq", json!(1));
        let second = PublisherRecord::new("E1").with_property("seq", json!(2));
        let merged = merge_catalog(vec![EventType::new("E1")], vec![first.clone(), second], vec![]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].publisher, Some(first));
    }

    #[test]
    fn names_match_exactly() {
        let merged = merge_catalog(
            vec![EventType::new("Orders")],
            vec![PublisherRecord::new("orders")],
            vec![SubscriberRecord::new("Orders ")],
        );
        assert!(merged[0].publisher.is_none());
        assert!(merged[0].subscriber.is_none());
    }

    #[test]
    fn event_order_is_preserved() {
        let merged = merge_catalog(
            vec![EventType::new("B"), EventType::new("A"), EventType::new("C")],
            vec![PublisherRecord::new("A")],
            vec![SubscriberRecord::new("C"), SubscriberRecord::new("B")],
        );
        let names: Vec<&str> = merged.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert!(merged[0].subscriber.is_some());
        assert!(merged[1].publisher.is_some());
        assert!(merged[1].subscriber.is_none());
        assert!(merged[2].subscriber.is_some());
    }

    #[test]
    fn one_record_can_match_several_events() {
        let merged = merge_catalog(
            vec![EventType::new("E1"), EventType::new("E1")],
            vec![],
            vec![SubscriberRecord::new("E1")],
        );
        assert!(merged.iter().all(|e| e.subscriber.is_some()));
    }

    #[test]
    fn empty_events_yield_empty_catalog() {
        let merged = merge_catalog(vec![], vec![PublisherRecord::new("E1")], vec![]);
        assert!(merged.is_empty());
    }

    #[test]
    fn extra_properties_survive_deserialization() {
        let node: ManagerNode = serde_json::from_value(json!({
            "name": "catalog-east",
            "uri": "https://east.example.com",
            "ars_properties": {"manager": "true"}
        }))
        .unwrap();
        assert_eq!(node.name, "catalog-east");
        assert_eq!(node.properties["uri"], "https://east.example.com");

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["ars_properties"]["manager"], "true");
    }

    #[test]
    fn record_without_name_is_rejected() {
        let result: Result<EventType, _> = serde_json::from_value(json!({"schema": "x"}));
        assert!(result.is_err());
    }
}
