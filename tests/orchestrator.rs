//! Generation runs end to end against mock backends.

mod common;
use common::*;

use std::sync::Arc;
use std::time::Duration;

use atelier::action::Action;
use atelier::events::ChangeKind;
use atelier::node::{NodeOutput, NodeState};
use atelier::orchestrator::{GenerationOutcome, Orchestrator, OrchestratorError};
use atelier::prompt::WEB_SEARCH_KEYWORD_TEMPLATE;
use atelier::source::{ArtifactReference, Source};
use atelier::store::OperationPhase;
use serde_json::json;

fn action_labels(changes: &flume::Receiver<atelier::events::ChangeEvent>) -> Vec<String> {
    changes
        .drain()
        .filter_map(|event| match event.kind {
            ChangeKind::Action { action } => Some(action),
            ChangeKind::Operation { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn successful_run_walks_the_full_state_machine() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);
    set_prompt_output(&store, &prompt, "best pizza");

    let text = Arc::new(MockTextService::with_chunks(vec![
        chunk("thinking about pizza"),
        artifact_chunk("Pizza", "best pizza in town"),
    ]));
    let changes = store.subscribe();
    changes.drain();
    let orchestrator = Orchestrator::new(store.clone(), services_with_text(text.clone()));

    let outcome = orchestrator.generate(&generator).await.unwrap();
    assert_eq!(outcome, GenerationOutcome::Completed);

    let state = store.state();
    let node = state.node(&generator).unwrap();
    assert_eq!(node.state, NodeState::Completed);
    let NodeOutput::Generation(output) = &node.output else {
        panic!("generation output expected");
    };
    let artifact = output.artifact.as_ref().unwrap();
    assert!(artifact.completed);
    assert_eq!(artifact.title.as_deref(), Some("Pizza"));

    let stored = state.artifact_for_generator(&generator).unwrap();
    assert_eq!(stored.title, "Pizza");
    assert_eq!(stored.content, "best pizza in town");
    assert_eq!(stored.elements.len(), 1);
    assert_eq!(stored.elements[0].id, prompt);

    // idle→inProgress, streaming on first non-empty chunk, completed at end.
    let labels = action_labels(&changes);
    let state_updates = labels.iter().filter(|l| *l == "updateNodeState").count();
    assert_eq!(state_updates, 3);

    let request = text.last_request.lock().clone().unwrap();
    assert_eq!(request.user_prompt, "best pizza");
    assert_eq!(request.system_prompt, None, "no sources, no system prompt");
}

#[tokio::test]
async fn empty_stream_skips_the_streaming_state() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);

    let text = Arc::new(MockTextService::with_chunks(vec![]));
    let changes = store.subscribe();
    changes.drain();
    let orchestrator = Orchestrator::new(store.clone(), services_with_text(text));

    orchestrator.generate(&generator).await.unwrap();
    assert_eq!(store.state().node(&generator).unwrap().state, NodeState::Completed);

    // Only inProgress and completed; streaming was never entered.
    let labels = action_labels(&changes);
    let state_updates = labels.iter().filter(|l| *l == "updateNodeState").count();
    assert_eq!(state_updates, 2);
}

#[tokio::test]
async fn text_source_lands_in_the_system_prompt() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);
    store.dispatch(Action::UpdateNodeProperties {
        node: prompt.clone(),
        key: "sources".to_string(),
        value: json!([text_source("doc", "abc")]),
    });

    let text = Arc::new(MockTextService::with_chunks(vec![chunk("x")]));
    let orchestrator = Orchestrator::new(store.clone(), services_with_text(text.clone()));
    orchestrator.generate(&generator).await.unwrap();

    let request = text.last_request.lock().clone().unwrap();
    let system_prompt = request.system_prompt.unwrap();
    assert!(system_prompt.contains(r#"title="doc" type="textContent""#));
    assert!(system_prompt.contains(">abc</Source>"));
}

#[tokio::test]
async fn web_search_always_gets_the_keyword_template() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let search_node = add_web_search(&store, "Search");
    connect_instruction(&store, &prompt, &search_node);
    set_prompt_output(&store, &prompt, "health benefits of apples");

    let search = Arc::new(MockSearchService::default());
    let orchestrator = Orchestrator::new(store.clone(), services_with_search(search.clone()));
    orchestrator.generate(&search_node).await.unwrap();

    let request = search.last_request.lock().clone().unwrap();
    assert_eq!(request.user_prompt, "health benefits of apples");
    let system_prompt = request.system_prompt.unwrap();
    assert!(system_prompt.starts_with(WEB_SEARCH_KEYWORD_TEMPLATE));
}

#[tokio::test]
async fn missing_artifact_source_is_skipped_silently() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);
    store.dispatch(Action::UpdateNodeProperties {
        node: prompt.clone(),
        key: "sources".to_string(),
        value: json!([Source::ArtifactReference(ArtifactReference {
            id: atelier::ids::ArtifactId::from_raw("artf_gone"),
        })]),
    });

    let text = Arc::new(MockTextService::with_chunks(vec![chunk("x")]));
    let orchestrator = Orchestrator::new(store.clone(), services_with_text(text.clone()));
    orchestrator.generate(&generator).await.unwrap();

    let request = text.last_request.lock().clone().unwrap();
    assert_eq!(request.system_prompt, None, "dangling reference resolves to nothing");
}

#[tokio::test]
async fn regeneration_reuses_the_artifact_id() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);

    let orchestrator = Orchestrator::new(
        store.clone(),
        services_with_text(Arc::new(MockTextService::with_chunks(vec![artifact_chunk(
            "v1", "first",
        )]))),
    );
    orchestrator.generate(&generator).await.unwrap();
    let first_id = store
        .state()
        .artifact_for_generator(&generator)
        .unwrap()
        .id
        .clone();

    let orchestrator = Orchestrator::new(
        store.clone(),
        services_with_text(Arc::new(MockTextService::with_chunks(vec![artifact_chunk(
            "v2", "second",
        )]))),
    );
    orchestrator.generate(&generator).await.unwrap();

    let state = store.state();
    assert_eq!(state.artifacts.len(), 1);
    let artifact = state.artifact_for_generator(&generator).unwrap();
    assert_eq!(artifact.id, first_id);
    assert_eq!(artifact.title, "v2");
}

#[tokio::test]
async fn missing_instruction_connector_fails_the_node() {
    let store = store();
    let generator = add_text_generator(&store, "Generator");

    let orchestrator = Orchestrator::new(
        store.clone(),
        services_with_text(Arc::new(MockTextService::default())),
    );
    let error = orchestrator.generate(&generator).await.unwrap_err();
    assert!(matches!(
        error,
        OrchestratorError::MissingInstructionConnector { .. }
    ));

    match &store.state().node(&generator).unwrap().state {
        NodeState::Failed { message } => {
            assert!(message.contains("instruction connector"));
        }
        other => panic!("expected failed state, got {other:?}"),
    }
}

#[tokio::test]
async fn two_instruction_connectors_are_ambiguous() {
    let store = store();
    let prompt_a = add_prompt(&store, "A");
    let prompt_b = add_prompt(&store, "B");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt_a, &generator);
    connect_instruction(&store, &prompt_b, &generator);

    let orchestrator = Orchestrator::new(
        store.clone(),
        services_with_text(Arc::new(MockTextService::default())),
    );
    let error = orchestrator.generate(&generator).await.unwrap_err();
    assert!(matches!(
        error,
        OrchestratorError::AmbiguousInstructionConnector { count: 2, .. }
    ));
}

#[tokio::test]
async fn stream_failure_moves_the_node_to_failed() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);

    let text = Arc::new(MockTextService {
        chunks: vec![chunk("partial")],
        fail_with: Some("backend unavailable".to_string()),
        ..Default::default()
    });
    let orchestrator = Orchestrator::new(store.clone(), services_with_text(text));
    let error = orchestrator.generate(&generator).await.unwrap_err();
    assert!(matches!(error, OrchestratorError::Service(_)));

    let state = store.state();
    match &state.node(&generator).unwrap().state {
        NodeState::Failed { message } => assert!(message.contains("backend unavailable")),
        other => panic!("expected failed state, got {other:?}"),
    }
    assert!(state.artifacts.is_empty(), "no partial artifact on failure");
}

#[tokio::test]
async fn cancellation_resets_the_node_and_writes_no_artifact() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);

    let text = Arc::new(MockTextService {
        chunks: (0..200).map(|i| chunk(&format!("step {i}"))).collect(),
        chunk_delay: Duration::from_millis(5),
        ..Default::default()
    });
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), services_with_text(text)));

    let run = {
        let orchestrator = orchestrator.clone();
        let generator = generator.clone();
        tokio::spawn(async move { orchestrator.generate(&generator).await })
    };

    // Wait for the run's operation to appear, then cancel it.
    let operation = loop {
        if let Some(operation) = store.operations().into_iter().next() {
            break operation;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.cancel_operation(&operation.id));

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome, GenerationOutcome::Cancelled);

    let state = store.state();
    assert_eq!(state.node(&generator).unwrap().state, NodeState::Idle);
    assert_eq!(state.node(&generator).unwrap().output, NodeOutput::default());
    assert!(state.artifacts.is_empty());
    assert_eq!(
        store.operation(&operation.id).unwrap().phase,
        OperationPhase::Cancelled
    );
}

#[tokio::test]
async fn chunk_coalescing_preserves_last_chunk_wins() {
    let store = store();
    let prompt = add_prompt(&store, "Prompt");
    let generator = add_text_generator(&store, "Generator");
    connect_instruction(&store, &prompt, &generator);

    let text = Arc::new(MockTextService::with_chunks(
        (0..20).map(|i| chunk(&format!("step {i}"))).collect(),
    ));
    let changes = store.subscribe();
    changes.drain();
    let orchestrator = Orchestrator::new(store.clone(), services_with_text(text)).with_options(
        atelier::orchestrator::GenerationOptions {
            chunk_interval: Duration::from_secs(60),
        },
    );
    orchestrator.generate(&generator).await.unwrap();

    // One initial dispatch, the rest coalesced away, plus the final flush.
    let labels = action_labels(&changes);
    let output_updates = labels
        .iter()
        .filter(|l| *l == "setTextGenerationNodeOutput")
        .count();
    assert_eq!(output_updates, 2);

    let state = store.state();
    let NodeOutput::Generation(output) = &state.node(&generator).unwrap().output else {
        panic!("generation output expected");
    };
    assert_eq!(output.thinking.as_deref(), Some("step 19"), "last chunk wins");
}
