use mongodb::bson::{doc, Document};
use mongodb::{bson, Client};
use serde::Deserialize;

use crate::database::mongodb::errors::ServerError;
use crate::database::mongodb::Outcome;
use crate::plan::{RoleGrant, UserSpec};
use crate::prelude::*;

/// Entry of the `usersInfo` response.
#[derive(Deserialize, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub user: String,
    pub db: String,

    #[serde(default)]
    pub roles: Vec<RoleGrant>,
}

#[derive(Deserialize)]
struct UsersInfo {
    #[serde(default)]
    users: Vec<UserInfo>,
}

pub fn parse_users_info(response: Document) -> Result<Option<UserInfo>> {
    let info: UsersInfo =
        bson::from_document(response).context("failed to parse the `usersInfo` response")?;
    Ok(info.users.into_iter().next())
}

#[instrument(level = "debug", skip_all, fields(user = %user))]
pub async fn retrieve(from: &Client, user: &UserSpec) -> Result<Option<UserInfo>> {
    let response = from
        .database(&user.auth_database)
        .run_command(
            doc! { "usersInfo": { "user": user.name.as_str(), "db": user.auth_database.as_str() } },
            None,
        )
        .await
        .with_context(|| format!("failed to look up the user `{}`", user))?;
    parse_users_info(response)
}

/// Creates the user unless it exists with the same roles.
/// An existing user with other roles is never altered.
#[instrument(skip_all, fields(user = %user))]
pub async fn ensure(in_: &Client, user: &UserSpec) -> Result<Outcome> {
    match retrieve(in_, user).await? {
        Some(existing) if user.has_same_roles(&existing.roles) => Ok(Outcome::AlreadyPresent),
        Some(existing) => Err(anyhow!(
            "the user `{}` already exists with roles [{}], expected [{}]",
            user,
            UserSpec::format_roles(&existing.roles),
            UserSpec::format_roles(&user.roles),
        )),
        None => {
            create(in_, user).await?;
            Ok(Outcome::Created)
        }
    }
}

async fn create(in_: &Client, user: &UserSpec) -> Result {
    debug!(roles = UserSpec::format_roles(&user.roles).as_str(), "creating…");
    let command = doc! {
        "createUser": user.name.as_str(),
        "pwd": user.password.as_str(),
        "roles": bson::to_bson(&user.roles)?,
    };
    match in_.database(&user.auth_database).run_command(command, None).await {
        Ok(_) => Ok(()),
        Err(error) if ServerError::of(&error) == Some(ServerError::UserAlreadyExists) => {
            Err(error).with_context(|| format!("the user `{}` has been created concurrently", user))
        }
        Err(error) => Err(error).with_context(|| format!("failed to create the user `{}`", user)),
    }
}
