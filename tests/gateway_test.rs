use tokenflow::definition::builder::DefinitionBuilder;
use tokenflow::runtime::engine::Engine;
use tokenflow::runtime::registry::CallableRegistry;
use tokenflow::runtime::state::{EngineSnapshot, WorkflowStatus};
use tokenflow::tracker::NoopSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use serde_json::{Value, json};

async fn run_to_completion(
    definition: tokenflow::definition::Definition,
    initial: HashMap<String, Value>,
    expected_completed: usize,
) -> EngineSnapshot {
    let engine = Engine::from_definition(
        &definition,
        Arc::new(CallableRegistry::new()),
        Arc::new(NoopSink),
    )
    .await
    .expect("Failed to build engine");

    engine.start_workflow(initial).await.expect("Failed to start workflow");
    engine
        .wait_for(&[WorkflowStatus::Completed], Duration::from_secs(2))
        .await
        .expect("Workflow did not complete");

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let state = engine.state().await.expect("Failed to read state");
            if state.completed_tokens.len() == expected_completed {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Expected {} completed tokens", expected_completed))
}

fn visited(state: &EngineSnapshot, node_id: &str) -> bool {
    state.history.iter().any(|e| e.node_id == node_id)
}

fn exclusive_amount_definition() -> tokenflow::definition::Definition {
    DefinitionBuilder::new("gateway-test-exclusive")
        .start("start")
        .exclusive("route")
        .service("small", "")
        .service("large", "")
        .end("end")
        .next("start", "route")
        .next_when("route", "small", "amount < 1000")
        .next_when("route", "large", "amount >= 1000")
        .next("small", "end")
        .next("large", "end")
        .build()
}

#[tokio::test]
async fn test_exclusive_routes_by_condition() {
    // amount below the threshold goes through "small"
    let state = run_to_completion(
        exclusive_amount_definition(),
        HashMap::from([("amount".to_string(), json!(500))]),
        1,
    )
    .await;
    assert!(visited(&state, "small"));
    assert!(!visited(&state, "large"));

    // amount above the threshold goes through "large"
    let state = run_to_completion(
        exclusive_amount_definition(),
        HashMap::from([("amount".to_string(), json!(2500))]),
        1,
    )
    .await;
    assert!(visited(&state, "large"));
    assert!(!visited(&state, "small"));
}

#[tokio::test]
async fn test_exclusive_takes_first_match_only() {
    // Both conditions hold; declaration order decides.
    let definition = DefinitionBuilder::new("gateway-test-priority")
        .start("start")
        .exclusive("route")
        .service("a", "")
        .service("b", "")
        .end("end")
        .next("start", "route")
        .next_when("route", "a", "amount > 0")
        .next_when("route", "b", "amount > 0")
        .next("a", "end")
        .next("b", "end")
        .build();

    let state = run_to_completion(
        definition,
        HashMap::from([("amount".to_string(), json!(7))]),
        1,
    )
    .await;
    assert!(visited(&state, "a"));
    assert!(!visited(&state, "b"), "Only the first match receives the token");
}

#[tokio::test]
async fn test_exclusive_falls_back_to_first_successor() {
    let definition = DefinitionBuilder::new("gateway-test-fallback")
        .start("start")
        .exclusive("route")
        .service("a", "")
        .service("b", "")
        .end("end")
        .next("start", "route")
        .next_when("route", "a", "amount > 100")
        .next_when("route", "b", "amount > 200")
        .next("a", "end")
        .next("b", "end")
        .build();

    let state = run_to_completion(
        definition,
        HashMap::from([("amount".to_string(), json!(5))]),
        1,
    )
    .await;
    assert!(visited(&state, "a"), "No match falls back to the first successor");
    assert!(!visited(&state, "b"));
}

fn inclusive_definition() -> tokenflow::definition::Definition {
    DefinitionBuilder::new("gateway-test-inclusive")
        .start("start")
        .inclusive("route")
        .service("a", "")
        .service("b", "")
        .service("c", "")
        .end("end")
        .next("start", "route")
        .next_when("route", "a", "x > 1")
        .next_when("route", "b", "x > 10")
        .next("route", "c") // no condition entry: never matches on its own
        .next("a", "end")
        .next("b", "end")
        .next("c", "end")
        .build()
}

#[tokio::test]
async fn test_inclusive_forwards_matching_subset() {
    let state = run_to_completion(
        inclusive_definition(),
        HashMap::from([("x".to_string(), json!(5))]),
        1,
    )
    .await;
    assert!(visited(&state, "a"));
    assert!(!visited(&state, "b"));
    assert!(!visited(&state, "c"));

    let state = run_to_completion(
        inclusive_definition(),
        HashMap::from([("x".to_string(), json!(20))]),
        2,
    )
    .await;
    assert!(visited(&state, "a"));
    assert!(visited(&state, "b"));
    assert!(!visited(&state, "c"));
}

#[tokio::test]
async fn test_inclusive_all_false_forwards_to_all() {
    let state = run_to_completion(
        inclusive_definition(),
        HashMap::from([("x".to_string(), json!(0))]),
        3,
    )
    .await;
    assert!(visited(&state, "a"));
    assert!(visited(&state, "b"));
    assert!(visited(&state, "c"));
}

#[tokio::test]
async fn test_parallel_ignores_conditions() {
    // Conditions on a parallel gateway are dead weight; fan-out is unconditional.
    let definition = DefinitionBuilder::new("gateway-test-parallel")
        .start("start")
        .parallel("split")
        .service("a", "")
        .service("b", "")
        .end("end")
        .next("start", "split")
        .next_when("split", "a", "x > 100")
        .next_when("split", "b", "x > 100")
        .next("a", "end")
        .next("b", "end")
        .build();

    let state = run_to_completion(
        definition,
        HashMap::from([("x".to_string(), json!(0))]),
        2,
    )
    .await;
    assert!(visited(&state, "a"));
    assert!(visited(&state, "b"));
}
