//! Cross-cutting engine properties
//!
//! The invariants the rest of the platform leans on: total evaluation,
//! deterministic normalization, bounded instance counts, round-tripping
//! transformation maps, and schemas that only ever cover visible fields.

use std::sync::Arc;

use serde_json::{json, Value};

use form_flow::{
    build_form_schema, evaluate, inbound, instance_count, load_config_from_bytes, normalize,
    outbound, resolve, Condition, FormConfig, FormSession, NavOutcome, TransformMap, ValueMap,
};

fn values(pairs: &[(&str, Value)]) -> ValueMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn evaluation_is_total_over_adversarial_contexts() {
    let conditions: Vec<Condition> = [
        json!({"var": "missing"}),
        json!({"===": [{"var": "a"}, {"var": "b"}]}),
        json!({">=": [{"var": "n"}, "not-a-number"]}),
        json!({"<": [null, null]}),
        json!({"and": []}),
        json!({"or": [{"and": []}, {"or": []}]}),
        json!({"!": [{"!": [{"!": [{"var": "x"}]}]}]}),
    ]
    .iter()
    .map(|wire| serde_json::from_value(wire.clone()).unwrap())
    .collect();

    let contexts = [
        ValueMap::new(),
        values(&[("a", json!(null)), ("b", json!(null))]),
        values(&[("a", json!({"nested": [1, 2]})), ("b", json!([true]))]),
        values(&[("n", json!(f64::MAX)), ("x", json!("truthy-looking"))]),
    ];

    for condition in &conditions {
        for context in &contexts {
            // Must return a plain boolean for every combination.
            let _ = evaluate(condition, context);
        }
    }
}

fn fixture_config() -> Arc<FormConfig> {
    let raw = json!({
        "metadata": {"id": "fixture", "name": "Fixture", "version": "1"},
        "steps": [
            {
                "id": "intake", "name": "Intake", "order": 1,
                "fields": [
                    {"id": "track", "name": "track", "type": "radio", "required": true},
                    {"id": "unitCount", "name": "unitCount", "type": "dropdown",
                     "arrayController": "units"}
                ]
            },
            {
                "id": "commercial", "name": "Commercial", "order": 2,
                "conditions": [{"===": [{"var": "track"}, "commercial"]}],
                "fields": [
                    {"id": "annualRevenue", "name": "annualRevenue", "type": "currency",
                     "required": true}
                ]
            },
            {
                "id": "wrap-up", "name": "Wrap Up", "order": 3,
                "fields": [
                    {"id": "notes", "name": "notes", "type": "text"}
                ]
            }
        ],
        "arrayTemplates": {
            "units": {
                "minCount": 1, "maxCount": 5, "defaultCount": 2,
                "countField": "unitCount",
                "fieldTemplate": [
                    {"id": "rent", "name": "rent", "type": "currency", "required": true}
                ]
            }
        }
    });
    let (config, _) = load_config_from_bytes(&serde_json::to_vec(&raw).unwrap()).unwrap();
    Arc::new(config)
}

#[test]
fn normalization_and_resolution_are_idempotent() {
    let config = fixture_config();
    let ctx = values(&[("track", json!("commercial")), ("unitCount", json!(4))]);

    let norm_a = normalize(&config, &ctx);
    let norm_b = normalize(&config, &ctx);
    assert_eq!(norm_a, norm_b);

    let vis_a = resolve(&norm_a, &ctx);
    let vis_b = resolve(&norm_a, &ctx);
    let step_ids = |v: &form_flow::VisibleForm| {
        v.steps.iter().map(|s| s.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(step_ids(&vis_a), step_ids(&vis_b));
    assert_eq!(
        vis_a.all_validatable_fields().len(),
        vis_b.all_validatable_fields().len()
    );
}

#[test]
fn instance_count_is_always_in_bounds() {
    let config = fixture_config();
    let template = &config.array_templates["units"];
    let raw_inputs = [
        json!(-10),
        json!(0),
        json!(1),
        json!(5),
        json!(6),
        json!(1000000),
        json!(3.7),
        json!("4"),
        json!("4.5"),
        json!("plenty"),
        json!(""),
        json!(null),
        json!(false),
        json!([3]),
        json!({"count": 3}),
    ];
    for raw in raw_inputs {
        let count = instance_count(template, &values(&[("unitCount", raw.clone())]));
        assert!(
            (1..=5).contains(&count),
            "raw {:?} produced out-of-bounds count {}",
            raw,
            count
        );
    }
}

#[test]
fn transformation_round_trip_over_mapped_paths() {
    let map = TransformMap::from([
        ("firstName", "applicant.name.first"),
        ("lastName", "applicant.name.last"),
        ("entityType", "applicant.entity.type"),
        ("unit0Rent", "property.units[0].rent"),
        ("unit1Rent", "property.units[1].rent"),
        ("zip", "property.address.zip"),
    ]);

    let externals = [
        json!({
            "applicant": {"name": {"first": "Ada", "last": "Lovelace"},
                           "entity": {"type": "llc"}},
            "property": {"units": [{"rent": 1200}, {"rent": 1350}],
                          "address": {"zip": "78701"}}
        }),
        // Partial coverage: only some mapped paths present.
        json!({
            "applicant": {"name": {"first": "Grace"}},
            "property": {"units": [{"rent": 900}]}
        }),
    ];

    for external in &externals {
        let flat = inbound(external, &map);
        let rebuilt = outbound(&flat, &map);
        // Round trip reproduces the original restricted to mapped paths;
        // both fixtures contain nothing but mapped paths.
        assert_eq!(&rebuilt, external);
    }
}

#[test]
fn schema_never_covers_invisible_fields() {
    let config = fixture_config();
    let mut session = FormSession::new(config.clone());

    // Residential track: the commercial step is invisible.
    session.set_value("track", json!("residential"));
    let schema = build_form_schema(session.visible_form());
    assert!(!schema.contains("annualRevenue"));
    assert!(schema.contains("track"));

    // Flipping tracks swaps it in.
    session.set_value("track", json!("commercial"));
    let schema = build_form_schema(session.visible_form());
    assert!(schema.contains("annualRevenue"));

    // Instance fields appear exactly as materialized.
    session.set_value("unitCount", json!(2));
    let schema = build_form_schema(session.visible_form());
    assert!(schema.contains("units[0].rent"));
    assert!(schema.contains("units[1].rent"));
    assert!(!schema.contains("units[2].rent"));
}

#[test]
fn forward_jump_gated_backward_jump_free() {
    let mut session = FormSession::new(fixture_config());

    // Active step invalid: forward jump refused, pointer unchanged,
    // errors populated.
    match session.go_to(1) {
        NavOutcome::Blocked { failure } => {
            assert!(failure.errors.iter().any(|e| e.field == "track"));
        }
        other => panic!("expected Blocked, got {other:?}"),
    }
    assert_eq!(session.position(), 0);

    // Valid step: forward jump allowed.
    session.set_value("track", json!("residential"));
    session.set_value("unitCount", json!(1));
    assert!(matches!(session.go_to(1), NavOutcome::Moved { position: 1 }));

    // Backward is always free, valid or not.
    assert!(matches!(session.go_to(0), NavOutcome::Moved { position: 0 }));
}
