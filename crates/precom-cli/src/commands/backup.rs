use precom_pipeline::backup::BackupManager;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::BackupCommands;
use crate::commands::shared::limit::RowLimit;
use crate::context::AppContext;
use crate::output::output;

const DEFAULT_LIST_LIMIT: u32 = 20;

/// Handle `precom backup`.
pub async fn handle(
    action: &BackupCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let manager = BackupManager::new(&ctx.db, &ctx.config.backup);
    match action {
        BackupCommands::Create {
            trigger,
            description,
            tables,
        } => {
            let backup = manager
                .create_backup((*trigger).into(), tables, description.as_deref())
                .await?;
            output(&backup, flags.format)
        }
        BackupCommands::List => {
            let limit = RowLimit::resolve(None, flags.limit, DEFAULT_LIST_LIMIT);
            let backups = manager.list_backups(limit.get()).await?;
            output(&backups, flags.format)
        }
        BackupCommands::Restore { id, tables } => {
            let report = manager.restore_backup(id, tables).await?;
            output(&report, flags.format)
        }
        BackupCommands::Compare { id } => {
            let comparison = manager.compare_with_backup(id).await?;
            output(&comparison, flags.format)
        }
        BackupCommands::RestoreAt { at, tables } => {
            let report = manager.restore_to_time(*at, tables).await?;
            output(&report, flags.format)
        }
        BackupCommands::RestoreRecord { table, id } => {
            let restored = manager.restore_record(*table, id).await?;
            output(&restored, flags.format)
        }
    }
}
