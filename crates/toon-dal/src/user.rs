use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use toon_types::{
    claim::{Authorization, Role, join_roles, parse_roles},
    general::ValidEmail,
};

use crate::{ChosenConnection, Error, error::Result};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateUser {
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 3, max = 255))]
    pub name: String,
    #[garde(skip)]
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, sqlx::FromRow)]
struct UserInt {
    id: i64,
    name: String,
    email: String,
    roles: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
}

impl From<UserInt> for User {
    fn from(value: UserInt) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            roles: value.roles.as_deref().map(parse_roles).unwrap_or_default(),
        }
    }
}

impl Authorization for User {
    fn roles(&self) -> &[Role] {
        &self.roles
    }
}

pub(crate) async fn load_user(conn: &mut ChosenConnection, id: i64) -> Result<Option<User>> {
    let user =
        sqlx::query_as::<_, UserInt>("SELECT id, name, email, roles FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(User::from);
    Ok(user)
}

pub type UserRepository = UserRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateUser) -> Result<User> {
        let exists: i64 = sqlx::query_scalar("SELECT count(*) FROM users WHERE email = ?")
            .bind(payload.email.as_ref())
            .fetch_one(&self.executor)
            .await?;
        if exists > 0 {
            return Err(Error::Conflict(format!(
                "user {} already exists",
                payload.email.as_ref()
            )));
        }
        let result = sqlx::query("INSERT INTO users (name, email, roles) VALUES (?, ?, ?)")
            .bind(&payload.name)
            .bind(payload.email.as_ref())
            .bind(join_roles(&payload.roles))
            .execute(&self.executor)
            .await?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, UserInt>(
            "SELECT id, name, email, roles FROM users ORDER BY id LIMIT ?",
        )
        .bind(limit as i64)
        .fetch(&self.executor)
        .map_ok(User::from)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(users)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        sqlx::query_as::<_, UserInt>("SELECT id, name, email, roles FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .map(User::from)
            .ok_or_else(|| Error::RecordNotFound("User".to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user =
            sqlx::query_as::<_, UserInt>("SELECT id, name, email, roles FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.executor)
                .await?
                .map(User::from);
        Ok(user)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("User".to_string()))
        } else {
            Ok(())
        }
    }
}
