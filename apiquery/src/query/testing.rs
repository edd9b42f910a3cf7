//! Shared fixtures for query tests

use std::collections::{BTreeMap, BTreeSet};

use crate::data::{Capabilities, EntitySchema, RelationInfo, SchemaRegistry, StaticReferences};

pub fn agent_schema() -> EntitySchema {
    let names = |items: &[&str]| -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    };

    EntitySchema {
        kind: "agent".to_string(),
        class_name: r"MapasCulturais\Entities\Agent".to_string(),
        metadata_class_name: Some(r"MapasCulturais\Entities\AgentMeta".to_string()),
        properties: names(&[
            "id",
            "name",
            "createTimestamp",
            "status",
            "location",
            "publicLocation",
            "_type",
        ]),
        relations: BTreeMap::from([
            (
                "owner".to_string(),
                RelationInfo {
                    is_owning_side: true,
                },
            ),
            (
                "children".to_string(),
                RelationInfo {
                    is_owning_side: false,
                },
            ),
        ]),
        metadata_keys: names(&["site", "email"]),
        taxonomies: BTreeMap::from([("area".to_string(), 2), ("tag".to_string(), 1)]),
        capabilities: Capabilities {
            uses_metadata: true,
            uses_taxonomies: true,
            uses_owner_agent: true,
            uses_types: true,
        },
    }
}

pub fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register(agent_schema()).unwrap();
    registry
}

/// Logged-in user 7 with agent profile 3
pub fn logged_in() -> StaticReferences {
    StaticReferences::from_json(
        r#"{
            "user": { "id": 7, "profile": { "kind": "agent", "id": 3 },
                      "properties": { "email": "fulano@example.org" } },
            "entities": { "agent": [3, 10] }
        }"#,
    )
    .unwrap()
}
