use mongodb::Client;

use crate::database::mongodb::models::Model;
use crate::database::mongodb::traits::{EnsureCollection, Indexes};
use crate::database::mongodb::{open, users};
use crate::opts::ProvisionOpts;
use crate::plan::{CollectionSpec, Plan, Step, UserSpec};
use crate::prelude::*;
use crate::seed;

#[instrument(skip_all)]
pub async fn run(opts: ProvisionOpts) -> Result {
    sentry::configure_scope(|scope| scope.set_tag("app", "provision"));

    let plan = Plan::new(
        UserSpec::mock(opts.user.auth_database, opts.user.user_password),
        CollectionSpec::of::<Model>(),
        opts.seeds,
    );
    let client = open(&opts.connection).await?;
    let start_instant = Instant::now();

    for step in plan.steps() {
        run_step(&client, step)
            .await
            .with_context(|| format!("failed to {}", step))?;
    }

    info!(elapsed = format_elapsed(start_instant).as_str(), "provisioned");
    Ok(())
}

#[instrument(skip_all, fields(step = %step))]
async fn run_step(client: &Client, step: Step<'_>) -> Result {
    match step {
        Step::CreateUser(user) => {
            let outcome = users::ensure(client, user).await?;
            info!(user = %user, roles = UserSpec::format_roles(&user.roles).as_str(), %outcome);
        }
        Step::EnsureCollection(collection) => {
            let outcome = Model::ensure_collection(client).await?;
            info!(namespace = %collection, %outcome);
        }
        Step::EnsureIndexes(collection) => {
            for (spec, outcome) in Model::ensure_indexes(client).await? {
                info!(namespace = %collection, index = %spec, %outcome);
            }
        }
        Step::Seed(path) => {
            let models = seed::load(path).await?;
            let summary = seed::seed(client, models).await?;
            info!(
                path = %path.display(),
                n_inserted = summary.n_inserted,
                n_present = summary.n_present,
                "seeded",
            );
        }
    }
    Ok(())
}

/// Run with `MONGO_URL` pointing to a disposable deployment which allows creating users:
/// `cargo test -- --ignored`.
#[cfg(test)]
#[allow(clippy::await_holding_lock)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use mongodb::bson::{doc, Document};
    use mongodb::options::IndexOptions;
    use mongodb::IndexModel;

    use super::*;
    use crate::database::mongodb::models::AuditUser;
    use crate::database::mongodb::traits::TypedDocument;
    use crate::database::mongodb::{is_authenticated_as, open_as, Outcome};
    use crate::opts::{ConnectionOpts, UserOpts};

    /// The tests share one deployment.
    static DEPLOYMENT: Mutex<()> = Mutex::new(());

    fn lock_deployment() -> MutexGuard<'static, ()> {
        DEPLOYMENT.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mock() -> UserSpec {
        UserSpec::mock("admin".to_string(), "password".to_string())
    }

    /// Drops the collection and the user.
    async fn reset(client: &Client) -> Result {
        Model::collection(client).drop(None).await?;
        let user = mock();
        if users::retrieve(client, &user).await?.is_some() {
            client
                .database(&user.auth_database)
                .run_command(doc! { "dropUser": user.name.as_str() }, None)
                .await?;
        }
        Ok(())
    }

    fn connection() -> Result<ConnectionOpts> {
        Ok(ConnectionOpts {
            uri: std::env::var("MONGO_URL").context("`MONGO_URL` is not set")?,
            timeout: StdDuration::from_secs(10),
        })
    }

    fn provision_opts(seeds: Vec<PathBuf>) -> Result<ProvisionOpts> {
        Ok(ProvisionOpts {
            connection: connection()?,
            user: UserOpts {
                auth_database: "admin".to_string(),
                user_password: "password".to_string(),
            },
            seeds,
        })
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB deployment"]
    async fn provision_twice_ok() -> Result {
        let _deployment = lock_deployment();
        reset(&open(&connection()?).await?).await?;
        let seed_path = std::env::temp_dir().join("mongo-bootstrap-seed.json");
        tokio::fs::write(&seed_path, r#"[{"_id": "seeded", "name": "first"}]"#).await?;

        run(provision_opts(vec![seed_path.clone()])?).await?;
        run(provision_opts(vec![seed_path])?).await?;

        let client = open(&connection()?).await?;
        assert!(Model::exists(&client).await?);
        assert_eq!(Model::list_indexes(&client).await?.len(), 3);
        let n_documents = Model::collection(&client)
            .clone_with_type::<Document>()
            .count_documents(doc! { "_id": "seeded" }, None)
            .await?;
        assert_eq!(n_documents, 1);

        let user = mock();
        let existing = users::retrieve(&client, &user).await?.context("the user is missing")?;
        assert!(user.has_same_roles(&existing.roles));
        let user_client = open_as(&connection()?, &user).await?;
        assert!(is_authenticated_as(&user_client, &user).await?);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB deployment"]
    async fn conflicting_index_fails() -> Result {
        let _deployment = lock_deployment();
        let client = open(&connection()?).await?;
        reset(&client).await?;
        Model::collection(&client)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "createdTs": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        let error = run(provision_opts(Vec::new())?).await.unwrap_err();
        assert!(format!("{:#}", error).contains("index conflict"), "{:#}", error);

        let indexes = Model::list_indexes(&client).await?;
        assert_eq!(indexes.len(), 2, "nothing is dropped or created: {:?}", indexes);
        reset(&client).await
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB deployment"]
    async fn conflicting_user_roles_fail() -> Result {
        let _deployment = lock_deployment();
        let client = open(&connection()?).await?;
        reset(&client).await?;
        client
            .database("admin")
            .run_command(
                doc! {
                    "createUser": "mock",
                    "pwd": "password",
                    "roles": [{ "role": "read", "db": "Unit" }],
                },
                None,
            )
            .await?;

        let error = run(provision_opts(Vec::new())?).await.unwrap_err();
        assert!(format!("{:#}", error).contains("already exists with roles [read@Unit]"), "{:#}", error);
        assert!(!Model::exists(&client).await?, "the later steps must not run");
        reset(&client).await
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB deployment"]
    async fn concurrent_seeding_ok() -> Result {
        let _deployment = lock_deployment();
        let client = open(&connection()?).await?;
        reset(&client).await?;

        let mut model = seed::parse(r#"[{"_id": "raced", "name": "first"}]"#)?
            .pop()
            .context("no document")?;
        model.stamp(Utc::now(), &AuditUser::operator())?;
        let (first, second) =
            futures::future::join(model.insert_if_absent(&client), model.insert_if_absent(&client)).await;
        let outcomes = [first?, second?];
        assert!(outcomes.contains(&Outcome::Created), "{:?}", outcomes);
        assert!(outcomes.contains(&Outcome::AlreadyPresent), "{:?}", outcomes);

        let n_documents = Model::collection(&client)
            .clone_with_type::<Document>()
            .count_documents(doc! { "_id": "raced" }, None)
            .await?;
        assert_eq!(n_documents, 1);
        reset(&client).await
    }
}
