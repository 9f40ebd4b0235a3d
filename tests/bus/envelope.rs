//! Envelope properties across the codec.

use msbus::envelope::{Envelope, Message, MessageType};
use msbus::{codec, ResponseEnvelope};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_payload() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        any::<f64>()
            .prop_filter("json numbers are finite", |f| f.is_finite())
            .prop_map(|f| json!(f)),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Command),
        Just(MessageType::Query),
        Just(MessageType::Event),
    ]
}

fn message(message_type: MessageType, value: Value) -> Message<Value> {
    match message_type {
        MessageType::Command => Message::command(value),
        MessageType::Query => Message::query(value),
        MessageType::Event => Message::event(value),
    }
}

proptest! {
    #[test]
    fn envelopes_survive_the_wire(value in arb_payload(), message_type in arb_type(), key in "[a-z0-9-]{0,12}") {
        let envelope = message(message_type, value).key(key).into_envelope("gateway");
        prop_assert!(envelope.metadata.is_complete());
        prop_assert!(!envelope.key.is_empty());

        let bytes = codec::serialize(&envelope).unwrap();
        let decoded: Envelope<Value> = codec::deserialize(&bytes).unwrap();
        prop_assert_eq!(decoded, envelope);
    }
}

#[test]
fn wire_shape_uses_camel_case_metadata() {
    let envelope = Message::query(json!({ "id": 7 }))
        .header("tenant", "acme")
        .into_envelope("gateway");
    let wire = serde_json::to_value(&envelope).unwrap();

    assert_eq!(wire["metadata"]["type"], "query");
    assert_eq!(wire["metadata"]["correlationId"], wire["metadata"]["id"]);
    assert_eq!(wire["metadata"]["source"], "gateway");
    assert!(wire["metadata"]["timestamp"].is_i64());
    assert_eq!(wire["headers"]["tenant"], "acme");
}

#[test]
fn response_error_never_carries_data() {
    let wire = json!({
        "status": "error",
        "error": { "code": "FORBIDDEN", "message": "admins only" }
    });
    let response: ResponseEnvelope = serde_json::from_value(wire).unwrap();
    assert!(response.is_well_formed());
    assert!(response.data.is_none());
}
