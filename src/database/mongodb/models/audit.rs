use mongodb::bson;
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Audit trail carried by every service document.
#[serde_with::serde_as]
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Audit {
    #[serde(default, rename = "createdBy", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<AuditUser>,

    #[serde(default, rename = "createdTs", skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<bson::DateTime>")]
    pub created_at: Option<DateTime>,

    #[serde(default, rename = "updatedBy", skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<AuditUser>,

    #[serde(default, rename = "updatedTs", skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<bson::DateTime>")]
    pub updated_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl AuditUser {
    pub fn operator() -> Self {
        Self {
            username: Some(clap::crate_name!().to_string()),
            ..Default::default()
        }
    }
}

impl Audit {
    pub const CREATED_BY_KEY: &'static str = "createdBy";
    pub const CREATED_AT_KEY: &'static str = "createdTs";
    pub const UPDATED_BY_KEY: &'static str = "updatedBy";
    pub const UPDATED_AT_KEY: &'static str = "updatedTs";
    pub const VERSION_KEY: &'static str = "version";

    pub const KEYS: [&'static str; 5] = [
        Self::CREATED_BY_KEY,
        Self::CREATED_AT_KEY,
        Self::UPDATED_BY_KEY,
        Self::UPDATED_AT_KEY,
        Self::VERSION_KEY,
    ];

    /// Fills in the missing fields, keeps the present ones.
    pub fn stamp(&mut self, now: DateTime, operator: &AuditUser) {
        self.created_by.get_or_insert_with(|| operator.clone());
        self.created_at.get_or_insert(now);
        self.updated_by.get_or_insert_with(|| operator.clone());
        self.updated_at.get_or_insert(now);
        self.version.get_or_insert(1);
    }
}
