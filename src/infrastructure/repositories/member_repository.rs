//! SeaORM implementation of MemberRepository

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::domain::{DomainError, MemberRepository, MemberUpdate, NewMember};
use crate::models::member::{ActiveModel, Column, Entity as MemberEntity};
use crate::models::{DATE_FORMAT, Member};
use crate::services::loan_service;

/// SeaORM-based implementation of MemberRepository
pub struct SeaOrmMemberRepository {
    db: DatabaseConnection,
}

impl SeaOrmMemberRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn normalize_email(email: &str) -> Result<String, DomainError> {
    let email = required("email", email)?.to_lowercase();
    if !email.contains('@') {
        return Err(DomainError::Validation(format!(
            "'{}' is not an email address",
            email
        )));
    }
    Ok(email)
}

#[async_trait]
impl MemberRepository for SeaOrmMemberRepository {
    async fn find_all(&self) -> Result<Vec<Member>, DomainError> {
        let members = MemberEntity::find()
            .order_by_asc(Column::LastName)
            .order_by_asc(Column::FirstName)
            .all(&self.db)
            .await?;

        Ok(members.into_iter().map(Member::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Member>, DomainError> {
        let member = MemberEntity::find_by_id(id).one(&self.db).await?;
        Ok(member.map(Member::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Member>, DomainError> {
        let member = MemberEntity::find()
            .filter(Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await?;
        Ok(member.map(Member::from))
    }

    async fn create(&self, member: NewMember) -> Result<Member, DomainError> {
        let membership_date = match member.membership_date {
            Some(date) => NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
                .map_err(|_| {
                    DomainError::Validation(format!(
                        "membership_date must be a YYYY-MM-DD date, got '{}'",
                        date
                    ))
                })?,
            None => chrono::Local::now().date_naive(),
        };
        let now = chrono::Utc::now().to_rfc3339();

        let new_member = ActiveModel {
            first_name: Set(required("first_name", &member.first_name)?),
            last_name: Set(required("last_name", &member.last_name)?),
            email: Set(normalize_email(&member.email)?),
            phone: Set(member.phone),
            membership_date: Set(membership_date.format(DATE_FORMAT).to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = new_member.insert(&self.db).await?;
        tracing::info!(member_id = result.id, "Member registered");
        Ok(Member::from(result))
    }

    async fn update(&self, id: i32, update: MemberUpdate) -> Result<Member, DomainError> {
        let existing = MemberEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        if let Some(first_name) = update.first_name {
            active.first_name = Set(required("first_name", &first_name)?);
        }
        if let Some(last_name) = update.last_name {
            active.last_name = Set(required("last_name", &last_name)?);
        }
        if let Some(email) = update.email {
            active.email = Set(normalize_email(&email)?);
        }
        if let Some(phone) = update.phone {
            active.phone = Set(phone);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let result = active.update(&self.db).await?;
        Ok(Member::from(result))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let txn = self.db.begin().await?;

        // The cascade removes loan rows without going through the loan
        // service, so hand their copies back first.
        let released = loan_service::release_member_loans(&txn, id).await?;

        let result = MemberEntity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        txn.commit().await?;

        tracing::info!(member_id = id, released, "Member deleted");
        Ok(())
    }
}
