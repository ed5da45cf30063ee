use std::fmt::{Display, Formatter};

use clap::crate_name;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential};
use mongodb::Client;
use serde::Deserialize;

use crate::opts::ConnectionOpts;
use crate::plan::UserSpec;
use crate::prelude::*;

pub mod errors;
pub mod models;
pub mod traits;
pub mod users;

/// Result of an idempotent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    AlreadyPresent,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Created => f.write_str("created"),
            Outcome::AlreadyPresent => f.write_str("already present"),
        }
    }
}

#[instrument(level = "debug", skip_all)]
pub async fn open(opts: &ConnectionOpts) -> Result<Client> {
    info!(timeout = ?opts.timeout, "connecting…");
    let client = Client::with_options(client_options(opts).await?)
        .context("failed to create the MongoDB client")?;
    ping(&client).await?;
    info!("connected");
    Ok(client)
}

/// Connects with the user's own credentials.
#[instrument(level = "debug", skip_all, fields(user = %user))]
pub async fn open_as(opts: &ConnectionOpts, user: &UserSpec) -> Result<Client> {
    let mut options = client_options(opts).await?;
    options.credential = Some(
        Credential::builder()
            .username(user.name.clone())
            .password(user.password.clone())
            .source(user.auth_database.clone())
            .build(),
    );
    let client = Client::with_options(options)
        .with_context(|| format!("failed to create the MongoDB client for `{}`", user))?;
    ping(&client).await?;
    Ok(client)
}

/// Tells whether the connection is authenticated as the user.
#[instrument(level = "debug", skip_all, fields(user = %user))]
pub async fn is_authenticated_as(client: &Client, user: &UserSpec) -> Result<bool> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ConnectionStatus {
        auth_info: AuthInfo,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AuthInfo {
        #[serde(default)]
        authenticated_users: Vec<AuthenticatedUser>,
    }

    #[derive(Deserialize)]
    struct AuthenticatedUser {
        user: String,
        db: String,
    }

    let response = client
        .database(&user.auth_database)
        .run_command(doc! { "connectionStatus": 1 }, None)
        .await
        .context("failed to retrieve the connection status")?;
    let status: ConnectionStatus = mongodb::bson::from_document(response)
        .context("failed to parse the connection status")?;
    debug!(n_authenticated_users = status.auth_info.authenticated_users.len());
    Ok(status
        .auth_info
        .authenticated_users
        .iter()
        .any(|authenticated| authenticated.user == user.name && authenticated.db == user.auth_database))
}

async fn client_options(opts: &ConnectionOpts) -> Result<ClientOptions> {
    let mut options = ClientOptions::parse(&opts.uri)
        .await
        .context("failed to parse the specified MongoDB URI")?;
    options.app_name = Some(crate_name!().to_string());
    options.connect_timeout = Some(opts.timeout);
    options.server_selection_timeout = Some(opts.timeout);
    Ok(options)
}

async fn ping(client: &Client) -> Result {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .context("failed to ping the MongoDB deployment")?;
    Ok(())
}
