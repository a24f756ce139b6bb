use clap::Parser;
use toon_types::{claim::Role, config::BackendConfig, general::ValidEmail};

use crate::commands::{Executor, open_pool};

#[derive(Parser, Debug)]
pub struct CreateUserCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(short, long, help = "User name")]
    name: String,
    #[arg(short, long, help = "User email")]
    pub email: ValidEmail,
    #[arg(short, long, num_args=0..,
        value_delimiter = ';',help = "Roles of the user, separated by semicolon or used multiple times, admin, creator and editor roles are supported")]
    pub roles: Vec<Role>,
}

impl Executor for CreateUserCmd {
    async fn run(self) -> anyhow::Result<()> {
        let pool = open_pool(&self.backend).await?;
        let repository = toon_dal::user::UserRepository::new(pool);
        let new_user = toon_dal::user::CreateUser {
            name: self.name,
            email: self.email,
            roles: self.roles,
        };
        let user = repository.create(new_user).await?;
        println!("Created user {} with id {}", user.email, user.id);

        Ok(())
    }
}
