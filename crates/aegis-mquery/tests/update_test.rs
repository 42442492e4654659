//! Integration tests for Aegis MQuery updates
//!
//! Runs full query + update batches through the public API and checks both
//! the resulting document and the change log.

use aegis_mquery::{query, AegisError, ChangeLogEntry, MQueryConfig, MQueryEngine, Value};
use serde_json::json;

/// Helper to build a document from JSON.
fn doc(json: serde_json::Value) -> Value {
    Value::from(json)
}

/// Helper to run an update with an empty query.
fn update(obj: &mut Value, update: serde_json::Value) -> Result<Vec<ChangeLogEntry>, AegisError> {
    query(obj, &doc(json!({})), &doc(update))
}

/// Helper to render a change log as JSON.
fn log_json(log: &[ChangeLogEntry]) -> serde_json::Value {
    serde_json::to_value(log).unwrap()
}

/// Helper to assert an update fails with a message and leaves the document alone.
fn assert_rejected(mut obj: Value, up: serde_json::Value, message: &str) {
    let before = obj.to_json();
    let err = update(&mut obj, up).unwrap_err();
    assert!(
        err.to_string().contains(message),
        "expected `{}`, got `{}`",
        message,
        err
    );
    assert_eq!(obj.to_json(), before);
}

// =============================================================================
// $set
// =============================================================================

#[test]
fn test_set_simple_key() {
    let mut obj = doc(json!({ "a": "b" }));
    let log = update(&mut obj, json!({ "$set": { "a": "c" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": "c" }));
    assert_eq!(log_json(&log), json!([{ "op": "$set", "key": "a", "value": "c" }]));
}

#[test]
fn test_set_nested() {
    let mut obj = doc(json!({ "a": { "b": "c" } }));
    let log = update(&mut obj, json!({ "$set": { "a.b": "e" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": { "b": "e" } }));
    assert_eq!(log_json(&log), json!([{ "op": "$set", "key": "a.b", "value": "e" }]));
}

#[test]
fn test_set_initializes_nested() {
    let mut obj = doc(json!({}));
    update(&mut obj, json!({ "$set": { "a.b.c": "d" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": { "b": { "c": "d" } } }));
}

#[test]
fn test_set_array_members() {
    let mut obj = doc(json!({ "a": [1, 2, 3] }));
    update(&mut obj, json!({ "$set": { "a.1": "d" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": [1, "d", 3] }));

    let mut obj = doc(json!({ "a": [{ "b": "c" }, { "d": "e" }] }));
    update(&mut obj, json!({ "$set": { "a.1.d": "woot" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": [{ "b": "c" }, { "d": "woot" }] }));
}

#[test]
fn test_set_rejects_bad_parents() {
    assert_rejected(
        doc(json!({ "a": { "b": [{ "c": "d" }, { "e": "f" }] } })),
        json!({ "$set": { "a.b.d": "woot" } }),
        "can't append to array using string field name [d]",
    );
    assert_rejected(
        doc(json!({ "a": { "b": "test" } })),
        json!({ "$set": { "a.b.c": "tobi" } }),
        "only supports object not string",
    );
}

#[test]
fn test_set_is_transactional() {
    assert_rejected(
        doc(json!({ "a": "b", "c": "d" })),
        json!({ "$set": { "a": "tobi", "c.d": "tobi" } }),
        "only supports object not string",
    );
}

#[test]
fn test_set_positional() {
    let mut obj = doc(json!({
        "pets": [
            { "id": 1, "name": "tobi" },
            { "id": 2, "name": "loki" },
            { "id": 3, "name": "jane" }
        ]
    }));

    let log = query(
        &mut obj,
        &doc(json!({ "pets.id": 2 })),
        &doc(json!({ "$set": { "pets.$.name": "LOKI" } })),
    )
    .unwrap();

    assert_eq!(
        log_json(&log),
        json!([{ "op": "$set", "key": "pets.1.name", "value": "LOKI" }])
    );
    assert_eq!(
        obj.to_json(),
        json!({
            "pets": [
                { "id": 1, "name": "tobi" },
                { "id": 2, "name": "LOKI" },
                { "id": 3, "name": "jane" }
            ]
        })
    );
}

#[test]
fn test_positional_without_match_is_rejected() {
    let mut obj = doc(json!({ "pets": [{ "id": 1 }], "n": 1 }));
    let err = query(
        &mut obj,
        &doc(json!({ "n": 1 })),
        &doc(json!({ "$set": { "pets.$.id": 5 } })),
    )
    .unwrap_err();
    assert!(matches!(err, AegisError::InvalidPath(_)));
    assert_eq!(obj.to_json(), json!({ "pets": [{ "id": 1 }], "n": 1 }));
}

#[test]
fn test_set_does_not_log_noops() {
    let mut obj = doc(json!({ "a": "b" }));
    let log = update(&mut obj, json!({ "$set": { "a": "b" } })).unwrap();
    assert!(log.is_empty());
}

// =============================================================================
// $unset
// =============================================================================

#[test]
fn test_unset() {
    let mut obj = doc(json!({ "a": "b", "c": { "d": "e", "f": "g" } }));
    update(&mut obj, json!({ "$unset": { "c.d": 1 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": "b", "c": { "f": "g" } }));
    update(&mut obj, json!({ "$unset": { "c": 1 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": "b" }));
}

#[test]
fn test_unset_array_item_leaves_hole() {
    let mut obj = doc(json!({ "arr": [1, 2, 3] }));
    update(&mut obj, json!({ "$unset": { "arr.1": 1 } })).unwrap();

    assert_eq!(obj.get_path("arr.0"), Some(&Value::Int(1)));
    assert!(obj.get_path("arr.1").is_none());
    assert_eq!(obj.get_path("arr.2"), Some(&Value::Int(3)));
    assert_eq!(serde_json::to_value(&obj).unwrap(), json!({ "arr": [1, null, 3] }));
}

#[test]
fn test_unset_fails_silently() {
    for path in ["c", "c.d.e.f", "a.b.c"] {
        let mut obj = doc(json!({ "a": "b" }));
        let log = update(&mut obj, json!({ "$unset": { path: 1 } })).unwrap();
        assert!(log.is_empty());
        assert_eq!(obj.to_json(), json!({ "a": "b" }));
    }
}

#[test]
fn test_unset_is_transactional() {
    assert_rejected(
        doc(json!({ "a": "b", "c": "d" })),
        json!({ "$unset": { "a": 1 }, "$set": { "c.d": "tobi" } }),
        "only supports object not string",
    );
}

// =============================================================================
// $rename
// =============================================================================

#[test]
fn test_rename_simple_key() {
    let mut obj = doc(json!({ "a": "b" }));
    let log = update(&mut obj, json!({ "$rename": { "a": "b" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "b": "b" }));
    assert_eq!(log_json(&log), json!([{ "op": "$rename", "key": "a", "value": "b" }]));
}

#[test]
fn test_rename_nested() {
    let mut obj = doc(json!({ "a": { "b": "c" } }));
    update(&mut obj, json!({ "$rename": { "a.b": "a.c" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": { "c": "c" } }));

    let mut obj = doc(json!({ "a": { "b": "c" } }));
    update(&mut obj, json!({ "$rename": { "a.b": "d.a.b" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": {}, "d": { "a": { "b": "c" } } }));
}

#[test]
fn test_rename_invalid_target_removes_source() {
    let mut obj = doc(json!({ "a": "b", "c": "hello" }));
    update(&mut obj, json!({ "$rename": { "a": "c.d" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "c": "hello" }));
}

#[test]
fn test_rename_missing_source() {
    for path in ["c", "w.b.c"] {
        let mut obj = doc(json!({ "a": "b" }));
        let log = update(&mut obj, json!({ "$rename": { path: "b" } })).unwrap();
        assert!(log.is_empty());
        assert_eq!(obj.to_json(), json!({ "a": "b" }));
    }
}

#[test]
fn test_rename_errors() {
    let obj = doc(json!({ "a": { "b": "c" } }));
    assert_rejected(obj.clone(), json!({ "$rename": { "a": "a" } }), "$rename source must differ from target");
    assert_rejected(obj.clone(), json!({ "$rename": { "r": "r" } }), "$rename source must differ from target");
    assert_rejected(obj.clone(), json!({ "$rename": { "a.b": "a" } }), "$rename target may not be a parent of source");
    assert_rejected(obj, json!({ "$rename": { "r.r": "r" } }), "$rename target may not be a parent of source");
    assert_rejected(
        doc(json!({ "a": "b" })),
        json!({ "$rename": { "a.b.c": "b" } }),
        "$rename source field invalid",
    );
}

#[test]
fn test_rename_is_transactional() {
    assert_rejected(
        doc(json!({ "a": "b", "c": "d" })),
        json!({ "$rename": { "a": "b" }, "$set": { "c.d": "tobi" } }),
        "only supports object not string",
    );
}

// =============================================================================
// $inc
// =============================================================================

#[test]
fn test_inc() {
    let mut obj = doc(json!({ "a": 3, "n": { "b": 3 }, "arr": [3] }));
    update(&mut obj, json!({ "$inc": { "a": 1, "n.b": -3, "arr.0": -3 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": 4, "n": { "b": 0 }, "arr": [0] }));
}

#[test]
fn test_inc_initializes() {
    let mut obj = doc(json!({ "hello": "world" }));
    update(&mut obj, json!({ "$inc": { "a": 3, "b.c": -3 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "hello": "world", "a": 3, "b": { "c": -3 } }));
}

#[test]
fn test_inc_round_trip() {
    let mut obj = doc(json!({ "a": 7.5 }));
    update(&mut obj, json!({ "$inc": { "a": 4 } })).unwrap();
    update(&mut obj, json!({ "$inc": { "a": -4 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": 7.5 }));
}

#[test]
fn test_inc_errors() {
    assert_rejected(doc(json!({ "a": 5 })), json!({ "$inc": { "a": "1" } }), "Modifier $inc allowed for numbers only");
    assert_rejected(doc(json!({ "hello": "world" })), json!({ "$inc": { "hello": 1 } }), "Cannot apply $inc modifier to non-number");
    assert_rejected(
        doc(json!({ "hello": [{ "a": 1 }, { "a": 2 }] })),
        json!({ "$inc": { "hello.a": 1 } }),
        "can't append to array using string field name [a]",
    );
    assert_rejected(
        doc(json!({ "a": 1, "c": "d" })),
        json!({ "$inc": { "a": 1 }, "$set": { "c.d": "tobi" } }),
        "only supports object not string",
    );
}

// =============================================================================
// $pop
// =============================================================================

#[test]
fn test_pop() {
    let mut obj = doc(json!({ "a": [1, 2, 3], "n": { "hello": [1, 2, 3] } }));
    update(&mut obj, json!({ "$pop": { "a": 1, "n.hello": -1 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": [1, 2], "n": { "hello": [2, 3] } }));
}

#[test]
fn test_pop_noops() {
    let mut obj = doc(json!({ "a": [] }));
    assert!(update(&mut obj, json!({ "$pop": { "a": 1, "b": -1 } })).unwrap().is_empty());
    assert_eq!(obj.to_json(), json!({ "a": [] }));
}

#[test]
fn test_pop_rejects_non_array() {
    assert_rejected(doc(json!({ "a": "string" })), json!({ "$pop": { "a": 1 } }), "Cannot apply $pop modifier to non-array");
}

// =============================================================================
// $push / $pushAll
// =============================================================================

#[test]
fn test_push() {
    let mut obj = doc(json!({ "a": [], "n": { "b": [] } }));
    update(&mut obj, json!({ "$push": { "a": 1, "n.b": [{ "a": 1 }] } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": [1], "n": { "b": [[{ "a": 1 }]] } }));
}

#[test]
fn test_push_initializes() {
    let mut obj = doc(json!({}));
    update(&mut obj, json!({ "$push": { "a.b": 1 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": { "b": [1] } }));
}

#[test]
fn test_push_array_members() {
    let mut obj = doc(json!({ "a": { "b": [[]] } }));
    update(&mut obj, json!({ "$push": { "a.b.0": "test" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": { "b": [["test"]] } }));

    let mut obj = doc(json!({ "a": { "b": [] } }));
    update(&mut obj, json!({ "$push": { "a.b.1": "test" } })).unwrap();
    let items = obj.get_path("a.b").and_then(Value::as_array).unwrap();
    assert!(items[0].is_absent());
    assert_eq!(items[1].to_json(), json!(["test"]));
}

#[test]
fn test_push_errors() {
    assert_rejected(doc(json!({ "a": "hello" })), json!({ "$push": { "a": "test" } }), "Cannot apply $push/$pushAll modifier to non-array");
    assert_rejected(doc(json!({ "a": [] })), json!({ "$push": { "a.test": 1 } }), "can't append to array using string field name [test]");
    assert_rejected(doc(json!({ "a": [1, 2] })), json!({ "$push": { "a.1": "test" } }), "Cannot apply $push/$pushAll modifier to non-array");
}

#[test]
fn test_push_all() {
    let mut obj = doc(json!({ "a": [], "n": { "b": [[]] } }));
    let log = update(&mut obj, json!({ "$pushAll": { "a": [1, [{ "a": 1 }]], "n.b.0": ["hello", "world"] } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": [1, [{ "a": 1 }]], "n": { "b": [["hello", "world"]] } }));
    assert_eq!(log[0].value.to_json(), json!([1, [{ "a": 1 }]]));

    let mut obj = doc(json!({}));
    update(&mut obj, json!({ "$pushAll": { "a.b": [1] } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": { "b": [1] } }));
}

#[test]
fn test_push_all_errors() {
    assert_rejected(doc(json!({ "a": "hello" })), json!({ "$pushAll": { "a": ["a", "test"] } }), "Cannot apply $push/$pushAll modifier to non-array");
    assert_rejected(doc(json!({ "a": [] })), json!({ "$pushAll": { "a.test": [1] } }), "can't append to array using string field name [test]");
    assert_rejected(doc(json!({ "a": [] })), json!({ "$pushAll": { "a.1": "woot" } }), "Modifier $pushAll/pullAll allowed for arrays only");
}

// =============================================================================
// $pull / $pullAll
// =============================================================================

#[test]
fn test_pull_values() {
    let mut obj = doc(json!({ "arr": [1, "1", 2, 1, 1, 1] }));
    update(&mut obj, json!({ "$pull": { "arr": 1 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": ["1", 2] }));
}

#[test]
fn test_pull_treats_null_and_holes_equally() {
    let mut obj = doc(json!({ "arr": [] }));
    if let Some(Value::Array(items)) = obj.as_object_mut().and_then(|m| m.get_mut("arr")) {
        items.extend([
            Value::Null,
            Value::Absent,
            Value::Int(1),
            Value::Int(2),
            Value::Null,
            Value::Int(3),
            Value::Absent,
        ]);
    }
    update(&mut obj, json!({ "$pull": { "arr": null } })).unwrap();
    assert_eq!(serde_json::to_value(&obj).unwrap(), json!({ "arr": [1, 2, 3] }));

    let mut obj = doc(json!({ "arr": [null, 1, null] }));
    update(&mut obj, json!({ "$pullAll": { "arr": [null] } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [1] }));
}

#[test]
fn test_pull_arrays_by_exact_match() {
    let mut obj = doc(json!({ "arr": [[{ "1": 2, "3": 4 }], [true]] }));

    let log = update(&mut obj, json!({ "$pull": { "arr": [{ "1": 2 }] } })).unwrap();
    assert!(log.is_empty());
    assert_eq!(obj.to_json(), json!({ "arr": [[{ "1": 2, "3": 4 }], [true]] }));

    update(&mut obj, json!({ "$pull": { "arr": [{ "1": 2, "3": 4 }] } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [[true]] }));

    update(&mut obj, json!({ "$pullAll": { "arr": [[true]] } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [] }));
}

#[test]
fn test_pull_partial_object_matches() {
    let mut obj = doc(json!({
        "arr": [{ "hello": "world" }, { "hello": "world", "extra": "sth" }, {}, { "a": "b" }, 5]
    }));

    let log = update(&mut obj, json!({ "$pull": { "arr": { "hello": "world" } } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [{}, { "a": "b" }, 5] }));
    assert_eq!(
        log_json(&log),
        json!([{
            "op": "$pull",
            "key": "arr",
            "value": [{ "hello": "world" }, { "hello": "world", "extra": "sth" }]
        }])
    );

    update(&mut obj, json!({ "$pull": { "arr": {} } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [{ "a": "b" }, 5] }));
}

#[test]
fn test_pull_array_members() {
    let mut obj = doc(json!({
        "arr": [500, [{ "hello": "world" }, { "hello": "world", "extra": "sth" }, {}, { "a": "b" }, 5]]
    }));
    update(&mut obj, json!({ "$pullAll": { "arr.1": [{ "hello": "world" }] } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [500, [{}, { "a": "b" }, 5]] }));
    update(&mut obj, json!({ "$pull": { "arr.1": {} } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [500, [{ "a": "b" }, 5]] }));
}

#[test]
fn test_pull_null_field_matches_missing_key() {
    let mut obj = doc(json!({ "arr": [{ "a": null, "b": 2 }, { "b": 1 }, { "a": 1 }] }));
    let log = update(&mut obj, json!({ "$pull": { "arr": { "a": null } } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "arr": [{ "a": 1 }] }));
    assert_eq!(
        log_json(&log),
        json!([{ "op": "$pull", "key": "arr", "value": [{ "a": null, "b": 2 }, { "b": 1 }] }])
    );
}

#[test]
fn test_numeric_map_keys_are_not_array_positions() {
    let mut obj = doc(json!({ "counts": { "2000000": 1 } }));
    update(&mut obj, json!({ "$set": { "counts.2000000": 2 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "counts": { "2000000": 2 } }));
    update(&mut obj, json!({ "$unset": { "counts.2000000": 1 } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "counts": {} }));
}

#[test]
fn test_pull_all_logs_removed_values() {
    let mut obj = doc(json!({ "arr": [1, "1", 2, 1, 1, 1] }));
    let log = update(&mut obj, json!({ "$pullAll": { "arr": [1, "1"] } })).unwrap();
    assert_eq!(log[0].value.to_json(), json!([1, "1", 1, 1, 1]));
    assert_eq!(obj.to_json(), json!({ "arr": [2] }));
}

#[test]
fn test_pull_fails_silently_on_array_field() {
    let mut obj = doc(json!({ "a": [] }));
    assert!(update(&mut obj, json!({ "$pull": { "a.a": "test" } })).unwrap().is_empty());
    assert!(update(&mut obj, json!({ "$pullAll": { "a.a": ["test"] } })).unwrap().is_empty());
    assert_eq!(obj.to_json(), json!({ "a": [] }));
}

#[test]
fn test_pull_errors() {
    assert_rejected(doc(json!({ "hello": "world" })), json!({ "$pull": { "hello": "world" } }), "Cannot apply $pull/$pullAll modifier to non-array");
    assert_rejected(doc(json!({ "hello": "world" })), json!({ "$pullAll": { "hello": ["world"] } }), "Cannot apply $pull/$pullAll modifier to non-array");
    assert_rejected(doc(json!({ "hello": "world" })), json!({ "$pull": { "hello.a": "world" } }), "LEFT_SUBFIELD only supports Object: hello not:");
    assert_rejected(doc(json!({ "a": [] })), json!({ "$pullAll": { "a.1": "woot" } }), "Modifier $pushAll/pullAll allowed for arrays only");
    assert_rejected(
        doc(json!({ "a": ["woot", "woot"], "hello": "world" })),
        json!({ "$pull": { "a": "woot" }, "$set": { "hello.a": "asdasd" } }),
        "only supports object not string",
    );
}

// =============================================================================
// $addToSet
// =============================================================================

#[test]
fn test_add_to_set() {
    let mut obj = doc(json!({ "a": ["a", "b"] }));
    update(&mut obj, json!({ "$addToSet": { "a": "c" } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": ["a", "b", "c"] }));

    assert!(update(&mut obj, json!({ "$addToSet": { "a": "c" } })).unwrap().is_empty());
    assert!(update(&mut obj, json!({ "$addToSet": { "a": { "$each": ["a", "b"] } } })).unwrap().is_empty());

    let log = update(&mut obj, json!({ "$addToSet": { "a": { "$each": ["d", "e"] } } })).unwrap();
    assert_eq!(obj.to_json(), json!({ "a": ["a", "b", "c", "d", "e"] }));
    assert_eq!(log_json(&log), json!([{ "op": "$addToSet", "key": "a", "value": ["d", "e"] }]));
}

// =============================================================================
// Engine Configuration
// =============================================================================

#[test]
fn test_unknown_modifiers() {
    let mut obj = doc(json!({ "a": 1 }));
    let log = update(&mut obj, json!({ "$bogus": { "a": 2 }, "$set": { "b": 2 } })).unwrap();
    assert_eq!(log.len(), 1);

    let config = MQueryConfig::from_toml_str("strict_modifiers = true").unwrap();
    let engine = MQueryEngine::with_config(config);
    let err = engine
        .query(&mut obj, &doc(json!({})), &doc(json!({ "$bogus": { "a": 2 } })))
        .unwrap_err();
    assert!(matches!(err, AegisError::UnsupportedOperator(_)));
    assert_eq!(obj.to_json(), json!({ "a": 1, "b": 2 }));
}

#[test]
fn test_non_matching_query_leaves_document() {
    let mut obj = doc(json!({ "a": 1 }));
    let log = query(&mut obj, &doc(json!({ "a": { "$gt": 5 } })), &doc(json!({ "$set": { "a": 9 } }))).unwrap();
    assert!(log.is_empty());
    assert_eq!(obj.to_json(), json!({ "a": 1 }));
}
