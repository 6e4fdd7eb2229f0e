use std::sync::Arc;

use common::error::AppError;
use state_machines::core::GuardError;
use tracing::{debug, instrument};

use super::{
    context::CycleContext,
    state::{Classified, CycleMachine, Published, Ready, Reduced},
};

#[instrument(level = "trace", skip_all, fields(corpus_len = ctx.corpus_len()))]
pub async fn reduce(
    machine: CycleMachine<(), Ready>,
    ctx: &mut CycleContext<'_>,
) -> Result<CycleMachine<(), Reduced>, AppError> {
    let points = ctx.services.reduce(Arc::clone(&ctx.embeddings)).await?;
    ensure_aligned("reduction", points.len(), ctx.corpus_len())?;
    ctx.points = points;

    machine
        .reduce()
        .map_err(|(_, guard)| map_guard_error("reduce", &guard))
}

#[instrument(level = "trace", skip_all, fields(corpus_len = ctx.corpus_len()))]
pub async fn classify(
    machine: CycleMachine<(), Reduced>,
    ctx: &mut CycleContext<'_>,
) -> Result<CycleMachine<(), Classified>, AppError> {
    let labels = ctx
        .services
        .fit_topics(&ctx.texts, Arc::clone(&ctx.embeddings))
        .await?;
    ensure_aligned("topic model", labels.len(), ctx.corpus_len())?;

    debug!(
        corpus_len = ctx.corpus_len(),
        outliers = labels.iter().filter(|label| **label < 0).count(),
        "topics assigned"
    );
    ctx.labels = labels;

    machine
        .classify()
        .map_err(|(_, guard)| map_guard_error("classify", &guard))
}

#[instrument(level = "trace", skip_all, fields(corpus_len = ctx.corpus_len()))]
pub async fn publish(
    machine: CycleMachine<(), Classified>,
    ctx: &mut CycleContext<'_>,
) -> Result<CycleMachine<(), Published>, AppError> {
    let version = ctx.snapshots.publish(ctx.entities, &ctx.labels).await?;
    ctx.version = Some(version);

    machine
        .publish()
        .map_err(|(_, guard)| map_guard_error("publish", &guard))
}

fn ensure_aligned(stage: &str, produced: usize, expected: usize) -> Result<(), AppError> {
    if produced == expected {
        return Ok(());
    }
    Err(AppError::Clustering(format!(
        "{stage} returned {produced} rows for a corpus of {expected}"
    )))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid clustering cycle transition during {event}: {guard:?}"
    ))
}
