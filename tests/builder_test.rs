use tokenflow::definition::builder::DefinitionBuilder;
use tokenflow::definition::{ActivityType, GatewayType, NodeKind};

#[test]
fn test_builder_wires_nodes_and_conditions() {
    let definition = DefinitionBuilder::new("builder-flow")
        .name("Builder flow")
        .start("start")
        .exclusive("route")
        .service("fast", "ship")
        .user("review")
        .form_field("approved", "Approved?", "boolean", true)
        .end("end")
        .next("start", "route")
        .next_when("route", "fast", "amount < 100")
        .next_when("route", "review", "amount >= 100")
        .next("fast", "end")
        .next("review", "end")
        .build();

    assert_eq!(definition.id, "builder-flow");
    assert_eq!(definition.name, "Builder flow");
    assert_eq!(definition.start_node_id, "start");
    definition.validate().expect("Definition should validate");

    let route = definition.node("route").expect("route node missing");
    assert_eq!(route.kind, NodeKind::Gateway);
    assert_eq!(route.gateway_type(), GatewayType::Exclusive);
    assert_eq!(route.next_nodes, vec!["fast", "review"]);
    let conditions = route.conditions.as_ref().expect("conditions missing");
    assert_eq!(conditions.get("fast").unwrap(), "amount < 100");
    assert_eq!(conditions.get("review").unwrap(), "amount >= 100");

    let review = definition.node("review").expect("review node missing");
    assert_eq!(review.activity_type(), ActivityType::User);
    assert_eq!(review.form_fields.len(), 1);
    assert_eq!(review.form_fields[0].name, "approved");
    assert!(review.form_fields[0].required);

    let fast = definition.node("fast").expect("fast node missing");
    assert_eq!(fast.work_fn.as_deref(), Some("ship"));
}

#[test]
fn test_builder_definition_round_trips_through_serde() {
    let definition = DefinitionBuilder::new("roundtrip-flow")
        .start("start")
        .script("calc", "total = a + b")
        .end("end")
        .next("start", "calc")
        .next("calc", "end")
        .build();

    let serialized = serde_yaml::to_string(&definition).expect("Serialize failed");
    let parsed: tokenflow::definition::Definition =
        serde_yaml::from_str(&serialized).expect("Deserialize failed");
    assert_eq!(parsed, definition);
}

#[test]
fn test_first_start_node_wins() {
    let definition = DefinitionBuilder::new("two-starts")
        .start("alpha")
        .start("beta")
        .end("end")
        .next("alpha", "end")
        .next("beta", "end")
        .build();

    assert_eq!(definition.start_node_id, "alpha");
}
