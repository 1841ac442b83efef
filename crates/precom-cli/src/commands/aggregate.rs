use precom_pipeline::aggregation::AggregationEngine;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `precom aggregate`.
pub async fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let stats = AggregationEngine::new(&ctx.db).refresh_aggregates().await?;
    output(&stats, flags.format)
}
