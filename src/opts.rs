//! CLI options.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::prelude::*;

pub mod parsers;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Opts {
    #[command(flatten)]
    pub tracing: TracingOpts,

    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Args)]
pub struct TracingOpts {
    /// Sentry DSN
    #[arg(short, long, env = "MONGO_BOOTSTRAP_SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Sentry environment, such as `production` or `staging`
    #[arg(long, env = "MONGO_BOOTSTRAP_SENTRY_ENVIRONMENT")]
    pub sentry_environment: Option<String>,

    /// Performance monitoring sample rate for Sentry
    #[arg(long, default_value = "0", env = "MONGO_BOOTSTRAP_TRACES_SAMPLE_RATE")]
    pub traces_sample_rate: f32,
}

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Creates the user, the collection and its indexes, then seeds the data
    Provision(ProvisionOpts),

    /// Checks that the deployment matches the provisioning plan
    Verify(VerifyOpts),
}

#[derive(Args)]
pub struct ProvisionOpts {
    #[command(flatten)]
    pub connection: ConnectionOpts,

    #[command(flatten)]
    pub user: UserOpts,

    /// Seed data file: a JSON array of documents in MongoDB Extended JSON.
    /// Files are applied in the order given.
    #[arg(long = "seed", value_name = "FILE")]
    pub seeds: Vec<PathBuf>,
}

#[derive(Args)]
pub struct VerifyOpts {
    #[command(flatten)]
    pub connection: ConnectionOpts,

    #[command(flatten)]
    pub user: UserOpts,
}

#[derive(Args)]
pub struct ConnectionOpts {
    /// MongoDB connection string
    #[arg(short, long, env = "MONGO_URL", default_value = "mongodb://localhost:27017")]
    pub uri: String,

    /// Server selection and connect timeout
    #[arg(long, default_value = "30s", value_parser = parsers::non_zero_duration)]
    pub timeout: StdDuration,
}

#[derive(Args)]
pub struct UserOpts {
    /// Database in which the service user is defined
    #[arg(long, default_value = "admin")]
    pub auth_database: String,

    /// Service user password
    #[arg(long, env = "MONGO_BOOTSTRAP_USER_PASSWORD", default_value = "password", hide_env_values = true)]
    pub user_password: String,
}
