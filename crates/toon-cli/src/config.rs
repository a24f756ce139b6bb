use clap::{Parser, Subcommand};

use crate::commands::{
    cleanup::CleanupCmd, create_user::CreateUserCmd, publish::PublishCmd,
    recalculate::RecalculateCmd, repair::RepairCmd,
};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "CLI for toon - maintenance of the webcomic database and object store"
)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    CreateUser(CreateUserCmd),
    Recalculate(RecalculateCmd),
    Repair(RepairCmd),
    Publish(PublishCmd),
    Cleanup(CleanupCmd),
}

impl crate::commands::Executor for Command {
    async fn run(self) -> anyhow::Result<()> {
        match self {
            Command::CreateUser(cmd) => cmd.run().await,
            Command::Recalculate(cmd) => cmd.run().await,
            Command::Repair(cmd) => cmd.run().await,
            Command::Publish(cmd) => cmd.run().await,
            Command::Cleanup(cmd) => cmd.run().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        CliConfig::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        let config = CliConfig::try_parse_from([
            "toon-cli",
            "recalculate",
            "--data-dir",
            "/tmp/toon-cli",
            "--series-id",
            "7",
        ])
        .unwrap();
        assert!(matches!(config.command, Command::Recalculate(_)));

        let config = CliConfig::try_parse_from([
            "toon-cli",
            "create-user",
            "--name",
            "Editor",
            "--email",
            "editor@example.com",
            "--roles",
            "editor;creator",
        ])
        .unwrap();
        assert!(matches!(config.command, Command::CreateUser(_)));

        assert!(CliConfig::try_parse_from(["toon-cli", "repair"]).is_err());
    }
}
