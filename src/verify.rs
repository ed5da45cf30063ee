use itertools::Itertools;
use mongodb::IndexModel;

use crate::database::mongodb::models::Model;
use crate::database::mongodb::traits::{EnsureCollection, Indexes};
use crate::database::mongodb::{is_authenticated_as, open, open_as, users};
use crate::opts::VerifyOpts;
use crate::plan::{is_primary_key, CollectionSpec, IndexSpec, UserSpec};
use crate::prelude::*;

#[instrument(skip_all)]
pub async fn run(opts: VerifyOpts) -> Result {
    sentry::configure_scope(|scope| scope.set_tag("app", "verify"));

    let user = UserSpec::mock(opts.user.auth_database, opts.user.user_password);
    let collection = CollectionSpec::of::<Model>();
    let client = open(&opts.connection).await?;

    if !Model::exists(&client).await? {
        bail!("`{}` does not exist", collection);
    }
    check_indexes(&collection.indexes, &Model::list_indexes(&client).await?)
        .with_context(|| format!("`{}` indexes do not match", collection))?;
    info!(namespace = %collection, "collection and indexes are in place");

    let existing = users::retrieve(&client, &user)
        .await?
        .ok_or_else(|| anyhow!("the user `{}` does not exist", user))?;
    if !user.has_same_roles(&existing.roles) {
        bail!(
            "the user `{}` has roles [{}], expected [{}]",
            user,
            UserSpec::format_roles(&existing.roles),
            UserSpec::format_roles(&user.roles),
        );
    }
    let user_client = open_as(&opts.connection, &user)
        .await
        .with_context(|| format!("the user `{}` failed to authenticate", user))?;
    if !is_authenticated_as(&user_client, &user).await? {
        bail!("the connection is not authenticated as `{}`", user);
    }
    info!(user = %user, "user is in place");

    Ok(())
}

/// Expects exactly the specified indexes besides the primary key one.
pub fn check_indexes(specs: &[IndexSpec], existing: &[IndexModel]) -> Result {
    for spec in specs {
        match spec.find_in(existing) {
            Some(model) if spec.has_same_options(model) => {}
            Some(model) => bail!("expected {}, found options {:?}", spec, model.options),
            None => bail!("missing {}", spec),
        }
    }

    let unexpected = existing
        .iter()
        .filter(|model| !is_primary_key(model))
        .filter(|model| !specs.iter().any(|spec| spec.has_same_keys(model)))
        .map(|model| model.keys.to_string())
        .collect_vec();
    if !unexpected.is_empty() {
        bail!("unexpected indexes: {}", unexpected.join(", "));
    }

    Ok(())
}
