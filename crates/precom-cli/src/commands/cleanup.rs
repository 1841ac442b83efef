use precom_pipeline::retention::RetentionCleaner;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::CleanupArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `precom cleanup`.
pub async fn handle(args: &CleanupArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let grace_days = args
        .days
        .map_or(ctx.config.retention.soft_delete_grace_days, i64::from);
    let cleaner = RetentionCleaner::new(&ctx.db, &ctx.config);
    if args.stats {
        let stats = cleaner.statistics(grace_days).await?;
        return output(&stats, flags.format);
    }
    let report = cleaner.cleanup(grace_days, None).await;
    output(&report, flags.format)
}
