//! Read-only entity over the `active_loans` view.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::loan::LoanStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "active_loans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub loan_id: i32,
    pub book_id: i32,
    pub title: String,
    pub member_id: i32,
    pub member_name: String,
    pub loan_date: String,
    pub due_date: String,
    pub status: LoanStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
