use crate::cli::GlobalFlags;
use crate::cli::root_commands::StatusArgs;
use crate::commands::shared::limit::RowLimit;
use crate::context::AppContext;
use crate::output::output;

const DEFAULT_STATUS_LIMIT: u32 = 10;

/// Handle `precom status`: recent sync logs, newest first.
pub async fn handle(args: &StatusArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let limit = RowLimit::resolve(args.last, flags.limit, DEFAULT_STATUS_LIMIT);
    let logs = ctx.db.list_sync_logs(limit.get()).await?;
    output(&logs, flags.format)
}
