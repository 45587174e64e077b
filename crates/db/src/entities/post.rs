//! Post entity (one meal entry with one or more photos).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owner
    pub user_id: String,

    #[sea_orm(nullable)]
    pub title: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Public image URLs (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub image_urls: Json,

    /// Storage keys of the images, same order as `image_urls`
    #[sea_orm(column_type = "JsonBinary")]
    pub image_keys: Json,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Image URLs as strings.
    #[must_use]
    pub fn image_url_list(&self) -> Vec<String> {
        json_string_list(&self.image_urls)
    }

    /// Storage keys as strings.
    #[must_use]
    pub fn image_key_list(&self) -> Vec<String> {
        json_string_list(&self.image_keys)
    }
}

/// Read a JSON array of strings, skipping anything that is not a string.
#[must_use]
pub fn json_string_list(value: &Json) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::vote::Entity")]
    Votes,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
