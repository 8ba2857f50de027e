//! End-to-end pipeline runs against a seeded embedded index

mod common;

use common::*;
use incident_oracle::models::{
    ClassificationRecord, IncidentType, PipelineEvent, SearchPlan, Severity, Stage,
    NO_EVIDENCE_CONFIDENCE_CAP,
};
use incident_oracle::pipeline::PipelineError;
use std::sync::Arc;
use tokio_stream::StreamExt;

#[tokio::test]
async fn test_connection_pool_incident_is_grounded_on_history() {
    let (_dir, store) = seeded_store().await;
    let generator = Arc::new(ScriptedGenerator::connection_pool());
    let pipeline = pipeline(generator.clone(), Arc::new(HashEmbedder), store);

    let run = pipeline.run(CONNECTION_POOL_DESCRIPTION).await.unwrap();

    assert_eq!(run.analysis.incident_type, IncidentType::Database);
    assert_eq!(run.analysis.severity, Severity::P1);
    assert!(run.errors.is_empty(), "unexpected errors: {:?}", run.errors);

    assert!(!run.search_results.is_empty());
    assert!(run
        .search_results
        .iter()
        .all(|r| r.incident_type == IncidentType::Database));
    assert!(run.search_results[0].title.contains("Connection Pool"));
    assert!(run
        .search_results
        .windows(2)
        .all(|w| w[0].similarity_score >= w[1].similarity_score));

    // INC-99999 was never retrieved
    assert_eq!(
        run.recommendation.similar_incident_references,
        vec!["INC-10000".to_string()]
    );
    assert_eq!(run.recommendation.confidence_score, 0.85);

    let stages: Vec<Stage> = run.agent_steps.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ORDER.to_vec());

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[2].contains("ID: INC-10000"));
}

#[tokio::test]
async fn test_malformed_analysis_falls_back_with_one_error() {
    let (_dir, store) = seeded_store().await;
    let generator = Arc::new(ScriptedGenerator::new(
        Reply::text("The incident looks like a database problem."),
        Reply::text(DATABASE_PLAN),
        Reply::text(CITING_RECOMMENDATION),
    ));
    let pipeline = pipeline(generator, Arc::new(HashEmbedder), store);

    let run = pipeline.run(CONNECTION_POOL_DESCRIPTION).await.unwrap();

    assert_eq!(run.analysis, ClassificationRecord::fallback());
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].stage, Stage::Extract);
    assert!(run.errors[0].to_string().starts_with("Analysis parsing error"));
    assert_eq!(run.fallback_stages(), vec![Stage::Extract]);
}

#[tokio::test]
async fn test_plan_fallback_depends_only_on_the_analysis() {
    let (_dir, store) = seeded_store().await;
    let generator = Arc::new(ScriptedGenerator::new(
        Reply::text(DATABASE_ANALYSIS),
        Reply::text(r#"{"primary_search_terms": "#),
        Reply::text(CITING_RECOMMENDATION),
    ));
    let pipeline = pipeline(generator, Arc::new(HashEmbedder), store);

    let first = pipeline.run(CONNECTION_POOL_DESCRIPTION).await.unwrap();
    let second = pipeline.run(CONNECTION_POOL_DESCRIPTION).await.unwrap();

    assert_eq!(first.search_plan, SearchPlan::fallback_for(&first.analysis));
    assert_eq!(first.search_plan, second.search_plan);
    assert_eq!(first.errors.len(), 1);
    assert_eq!(first.errors[0].stage, Stage::Plan);
}

#[tokio::test]
async fn test_store_failure_yields_empty_results_and_capped_confidence() {
    let generator = Arc::new(ScriptedGenerator::connection_pool());
    let pipeline = pipeline(generator, Arc::new(HashEmbedder), Arc::new(FailingStore));

    let run = pipeline.run(CONNECTION_POOL_DESCRIPTION).await.unwrap();

    assert!(run.search_results.is_empty());
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].stage, Stage::Retrieve);
    assert!(run.recommendation.similar_incident_references.is_empty());
    assert!(run.recommendation.confidence_score <= NO_EVIDENCE_CONFIDENCE_CAP);
    assert!(run.is_degraded());
}

#[tokio::test]
async fn test_empty_index_gives_low_confidence() {
    let (_dir, store) = empty_store().await;
    let generator = Arc::new(ScriptedGenerator::connection_pool());
    let pipeline = pipeline(generator.clone(), Arc::new(HashEmbedder), store);

    let run = pipeline.run(CONNECTION_POOL_DESCRIPTION).await.unwrap();

    assert!(run.search_results.is_empty());
    assert!(run.errors.is_empty());
    assert!(run.recommendation.is_low_confidence());
    assert!(generator.prompts()[2].contains("No similar incidents found in database."));
}

#[tokio::test]
async fn test_generation_failure_aborts_the_run() {
    let (_dir, store) = seeded_store().await;
    let generator = Arc::new(ScriptedGenerator::new(
        Reply::text(DATABASE_ANALYSIS),
        Reply::text(DATABASE_PLAN),
        Reply::Fail,
    ));
    let pipeline = pipeline(generator, Arc::new(HashEmbedder), store);

    let result = pipeline.run(CONNECTION_POOL_DESCRIPTION).await;

    assert!(matches!(
        result,
        Err(PipelineError::Generation {
            stage: Stage::Synthesize,
            ..
        })
    ));
}

#[tokio::test]
async fn test_embedding_failure_aborts_the_run() {
    let (_dir, store) = seeded_store().await;
    let generator = Arc::new(ScriptedGenerator::connection_pool());
    let pipeline = pipeline(generator, Arc::new(FailingEmbedder), store);

    let result = pipeline.run(CONNECTION_POOL_DESCRIPTION).await;

    assert!(matches!(result, Err(PipelineError::Embedding(_))));
}

#[tokio::test]
async fn test_streaming_emits_events_in_stage_order() {
    let (_dir, store) = seeded_store().await;
    let generator = Arc::new(ScriptedGenerator::connection_pool());
    let pipeline = Arc::new(pipeline(generator, Arc::new(HashEmbedder), store));

    let events: Vec<PipelineEvent> = pipeline
        .run_streaming(CONNECTION_POOL_DESCRIPTION.to_string())
        .collect()
        .await;
    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();

    assert_eq!(
        kinds,
        vec![
            "start",
            "step",
            "analysis",
            "step",
            "search_plan",
            "step",
            "search_results",
            "step",
            "recommendation",
            "complete",
        ]
    );

    match events.last() {
        Some(PipelineEvent::Completed(run)) => {
            assert_eq!(run.agent_steps.len(), 4);
            assert_eq!(
                run.recommendation.similar_incident_references,
                vec!["INC-10000".to_string()]
            );
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_streaming_failure_ends_with_error_event() {
    let (_dir, store) = seeded_store().await;
    let generator = Arc::new(ScriptedGenerator::new(
        Reply::Fail,
        Reply::text(DATABASE_PLAN),
        Reply::text(CITING_RECOMMENDATION),
    ));
    let pipeline = Arc::new(pipeline(generator, Arc::new(HashEmbedder), store));

    let events: Vec<PipelineEvent> = pipeline
        .run_streaming(CONNECTION_POOL_DESCRIPTION.to_string())
        .collect()
        .await;

    assert_eq!(events.first().map(|e| e.kind()), Some("start"));
    assert!(matches!(events.last(), Some(PipelineEvent::Failed { .. })));
    assert!(events
        .iter()
        .all(|e| !matches!(e, PipelineEvent::Completed(_))));
}
