//! Registry Behaviour Tests
//!
//! End-to-end checks of the public registry surface: registration rules,
//! lookup, artifact construction, and the encode/decode round trip.

use serde_json::{json, Value};

use schematica::{
    ErrorKind, Schema, SchemaKind, SchemaRegistry, SchemaSelector, SchemaTemplate,
};

fn template(text: &str) -> SchemaTemplate {
    SchemaTemplate::from_json_str(text).unwrap()
}

fn registry_with(fixture: &str) -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry
        .add_templates(SchemaTemplate::many_from_json_str(fixture).unwrap())
        .unwrap();
    registry
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn test_unnamed_template_is_not_reachable() {
    let registry = SchemaRegistry::new();
    let templates = vec![
        json!("string"),
        json!({ "kind": "object", "fields": { "a": "integer" } }),
        json!({ "kind": "union", "variants": ["null", "boolean"] }),
    ];
    for t in templates {
        let schema = registry.create_schema(t).unwrap();
        assert_eq!(schema.name(), None);
    }
    assert!(registry.is_empty());
    assert!(registry.names().is_empty());
}

#[test]
fn test_add_then_get_returns_same_entity() {
    let registry = SchemaRegistry::new();
    for name in ["Point", "geo.Point", "point_v2", "Ünïcode"] {
        let entity = Schema::named(name, SchemaKind::Null);
        registry.add_schema(&entity).unwrap();
        assert!(registry.get_schema(name).unwrap().ptr_eq(&entity));
    }
}

#[test]
fn test_get_unregistered_is_unknown_ref() {
    let registry = registry_with(include_str!("fixtures/point.json"));
    for name in ["Nope", "point", "", "Point "] {
        assert_eq!(
            registry.get_schema(name).unwrap_err().kind(),
            ErrorKind::UnknownRef,
            "name {:?}",
            name
        );
    }
}

#[test]
fn test_whitespace_name_rejected_without_mutation() {
    let registry = registry_with(include_str!("fixtures/point.json"));
    let before = registry.len();

    let err = registry
        .add_schema(Schema::named("a b", SchemaKind::Boolean))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSchemaRef);

    let err = registry
        .add_schema(template(r#"{"name": "tab\tname", "kind": "null"}"#))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSchemaRef);

    assert_eq!(registry.len(), before);
}

#[test]
fn test_build_from_non_name_json_is_invalid_args() {
    for value in [json!(42), json!(null), json!({ "kind": "number" }), json!(["Point"])] {
        let err = SchemaSelector::try_from(&value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgs, "value {}", value);
    }

    let registry = registry_with(include_str!("fixtures/point.json"));
    let selector = SchemaSelector::try_from(json!("Point")).unwrap();
    assert!(registry.build_validator(selector).is_ok());
}

// =============================================================================
// Artifacts
// =============================================================================

#[test]
fn test_name_and_entity_validators_agree() {
    let registry = registry_with(include_str!("fixtures/catalog.json"));
    let by_name = registry.build_validator("Product").unwrap();
    let by_entity = registry
        .build_validator(registry.get_schema("Product").unwrap())
        .unwrap();

    let samples = vec![
        json!({ "sku": "ABC-1", "price": ["EUR", 100], "status": "active" }),
        json!({ "sku": "ABC-1", "price": ["GBP", 100], "status": "active" }),
        json!({ "sku": "abc", "price": ["EUR", 1], "status": "active" }),
        json!({ "sku": "ABC-1", "price": ["USD", 5], "status": "active", "tags": ["a", "b"] }),
        json!({ "sku": "ABC-1", "price": ["USD", 5], "status": "retired" }),
        json!("Product"),
    ];
    for sample in &samples {
        assert_eq!(by_name.validate(sample), by_entity.validate(sample), "{}", sample);
    }
    assert!(by_name.validate(&samples[0]));
    assert!(!by_name.validate(&samples[1]));
}

#[test]
fn test_round_trip() {
    let registry = registry_with(include_str!("fixtures/catalog.json"));
    let validator = registry.build_validator("Product").unwrap();
    let encoder = registry.build_serializer("Product").unwrap();
    let decoder = registry.build_parser("Product").unwrap();

    let values = vec![
        json!({ "sku": "ABC-1", "price": ["EUR", 100], "status": "active" }),
        json!({
            "status": "active",
            "attributes": { "weight": 1.25, "colors": ["red", "blue"], "nested": { "b": null, "a": true } },
            "tags": ["x"],
            "price": ["USD", 0],
            "sku": "XYZ-42"
        }),
    ];
    for value in values {
        assert!(validator.validate(&value));
        let text = encoder.encode(&value).unwrap();
        assert_eq!(decoder.decode(&text).unwrap(), value, "via {}", text);
    }
}

#[test]
fn test_encoding_is_deterministic() {
    let registry = registry_with(include_str!("fixtures/catalog.json"));
    let encoder = registry.build_serializer("Product").unwrap();

    let a: Value = serde_json::from_str(
        r#"{"sku":"ABC-1","price":["EUR",1],"status":"active","attributes":{"z":1,"a":2}}"#,
    )
    .unwrap();
    let b: Value = serde_json::from_str(
        r#"{"attributes":{"a":2,"z":1},"status":"active","price":["EUR",1],"sku":"ABC-1"}"#,
    )
    .unwrap();

    assert_eq!(encoder.encode(&a).unwrap(), encoder.encode(&b).unwrap());
    assert_eq!(
        encoder.encode(&a).unwrap(),
        r#"{"sku":"ABC-1","price":["EUR",1],"attributes":{"a":2,"z":1},"status":"active"}"#
    );
    assert_eq!(encoder.fingerprint(&a).unwrap(), encoder.fingerprint(&b).unwrap());
}

#[test]
fn test_encode_nonconforming_fails() {
    let registry = registry_with(include_str!("fixtures/catalog.json"));
    let encoder = registry.build_serializer("Product").unwrap();
    let err = encoder
        .encode(&json!({ "sku": "ABC-1", "price": ["EUR", -1], "status": "active" }))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncodeError);
}

#[test]
fn test_point_example() {
    let registry = SchemaRegistry::new();
    registry
        .create_schema(template(include_str!("fixtures/point.json")))
        .unwrap();

    let is_point = registry.build_validator("Point").unwrap();
    assert!(is_point.validate(&json!({ "x": 1, "y": 2 })));
    assert!(!is_point.validate(&json!({ "x": "a" })));

    let encode = registry
        .build_serializer(registry.get_schema("Point").unwrap())
        .unwrap();
    let decode = registry
        .build_parser(registry.get_schema("Point").unwrap())
        .unwrap();
    let text = encode.encode(&json!({ "x": 1, "y": 2 })).unwrap();
    assert_eq!(text, r#"{"x":1,"y":2}"#);
    assert_eq!(decode.decode(&text).unwrap(), json!({ "x": 1, "y": 2 }));
}

#[test]
fn test_artifacts_shared_across_threads() {
    let registry = registry_with(include_str!("fixtures/point.json"));
    let validate = registry.build_validator("Point").unwrap().into_fn();
    let encoder = registry.build_serializer("Point").unwrap();

    std::thread::scope(|s| {
        for i in 0..4 {
            let validate = &validate;
            let encoder = &encoder;
            s.spawn(move || {
                let value = json!({ "x": i, "y": -i });
                assert!(validate(&value));
                assert_eq!(
                    encoder.encode(&value).unwrap(),
                    format!(r#"{{"x":{},"y":{}}}"#, i, -i)
                );
            });
        }
    });
}

#[test]
fn test_edge_values_round_trip() {
    let registry = SchemaRegistry::new();

    let mut deep = json!({ "bottom": [1.5, "x", null] });
    for level in 0..125 {
        deep = if level % 2 == 0 { json!([deep]) } else { json!({ "k": deep }) };
    }

    let cases = vec![
        (json!("integer"), json!(u64::MAX)),
        (json!("integer"), json!(i64::MIN)),
        (json!("number"), json!(1e300)),
        (json!("number"), json!(-0.0)),
        (json!("number"), json!(5e-324)),
        (json!("number"), json!(0.1)),
        (json!("string"), json!("quote\" backslash\\ nul\u{0} unit\u{1f} tab\t \u{2028} 😀")),
        (json!("string"), json!("")),
        (
            json!({ "kind": "map", "values": "any" }),
            json!({ "é": { "b": [{}, []], "a": { "\n": null } }, "": [[["deep"]]] }),
        ),
        (json!("any"), deep),
        (
            json!({ "kind": "tuple", "items": ["integer", "number", "boolean"] }),
            json!([-1, 2.0, false]),
        ),
    ];

    for (template, value) in cases {
        let schema = registry.create_schema(template.clone()).unwrap();
        let validator = registry.build_validator(schema.clone()).unwrap();
        let encoder = registry.build_serializer(schema.clone()).unwrap();
        let decoder = registry.build_parser(schema).unwrap();

        assert!(validator.validate(&value), "{} under {}", value, template);
        let text = encoder.encode(&value).unwrap();
        assert_eq!(decoder.decode(&text).unwrap(), value, "{} via {}", template, text);
    }
}

#[test]
fn test_nesting_limit_agrees_across_artifacts() {
    let registry = SchemaRegistry::new();
    registry
        .create_schema(json!({
            "name": "Nest",
            "kind": "union",
            "variants": ["integer", { "kind": "array", "items": { "$ref": "Nest" } }]
        }))
        .unwrap();
    let any = registry.create_schema(json!("any")).unwrap();

    let mut value = json!(0);
    for _ in 0..127 {
        value = json!([value]);
    }
    let too_deep = json!([value.clone()]);

    for selector in [SchemaSelector::from("Nest"), SchemaSelector::from(any)] {
        let validator = registry.build_validator(selector.clone()).unwrap();
        let encoder = registry.build_serializer(selector.clone()).unwrap();
        let decoder = registry.build_parser(selector).unwrap();

        assert!(validator.validate(&value));
        assert_eq!(decoder.decode(&encoder.encode(&value).unwrap()).unwrap(), value);

        assert!(!validator.validate(&too_deep));
        assert_eq!(encoder.encode(&too_deep).unwrap_err().kind(), ErrorKind::EncodeError);
    }
}
