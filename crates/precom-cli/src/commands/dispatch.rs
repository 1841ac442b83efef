use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => commands::run::handle(&args, ctx, flags).await,
        Commands::Backup { action } => commands::backup::handle(&action, ctx, flags).await,
        Commands::Cleanup(args) => commands::cleanup::handle(&args, ctx, flags).await,
        Commands::Aggregate => commands::aggregate::handle(ctx, flags).await,
        Commands::Status(args) => commands::status::handle(&args, ctx, flags).await,
    }
}
