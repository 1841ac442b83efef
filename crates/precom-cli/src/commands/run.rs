use anyhow::bail;
use precom_pipeline::orchestrator::{PipelineOrchestrator, RunOptions};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RunArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `precom run`. A failed run prints its report and exits non-zero.
pub async fn handle(args: &RunArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let options = RunOptions {
        skip_backup: args.skip_backup,
        skip_cleanup: args.skip_cleanup,
        cleanup_keep_days: args.cleanup_keep_days.map(i64::from),
        description: args.description.clone(),
    };

    let report = PipelineOrchestrator::new(&ctx.db, &ctx.config)
        .run(&args.excel, args.trigger.into(), &options)
        .await?;
    output(&report, flags.format)?;

    if let Some(failure) = &report.failure {
        bail!(
            "run {} failed while {}: {}",
            report.sync_id,
            failure.phase,
            failure.message
        );
    }
    Ok(())
}
