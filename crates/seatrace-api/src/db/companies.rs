//! Company and user lookups.
//!
//! Both tables are administered outside this service; only reads live here.

use sqlx::PgPool;

use seatrace_core::{CompanyId, CompanyType, UserId};

use crate::auth::Role;
use crate::model::{Company, User};
use crate::repository::RepoError;

/// Fetch a company by surrogate key.
pub async fn get_company(pool: &PgPool, id: CompanyId) -> Result<Option<Company>, RepoError> {
    let row = sqlx::query_as::<_, CompanyRow>(
        "SELECT id, company_name, company_type, contact_person, contact_phone, blockchain_address
         FROM companies WHERE id = $1",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await?;

    row.map(CompanyRow::into_company).transpose()
}

/// Fetch a user by surrogate key.
pub async fn get_user(pool: &PgPool, id: UserId) -> Result<Option<User>, RepoError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, real_name, role, company_id FROM users WHERE id = $1",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await?;

    row.map(UserRow::into_user).transpose()
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: i64,
    company_name: String,
    company_type: i16,
    contact_person: String,
    contact_phone: String,
    blockchain_address: String,
}

impl CompanyRow {
    fn into_company(self) -> Result<Company, RepoError> {
        let company_type = CompanyType::from_code(i64::from(self.company_type)).map_err(|e| {
            tracing::warn!(company_id = self.id, error = %e, "company row has invalid type");
            RepoError::Corrupt(e.to_string())
        })?;
        Ok(Company {
            id: CompanyId(self.id),
            name: self.company_name,
            company_type,
            contact_person: self.contact_person,
            contact_phone: self.contact_phone,
            blockchain_address: self.blockchain_address,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    real_name: String,
    role: String,
    company_id: Option<i64>,
}

impl UserRow {
    fn into_user(self) -> Result<User, RepoError> {
        let role: Role = self.role.parse().map_err(|e: String| {
            tracing::warn!(user_id = self.id, error = %e, "user row has invalid role");
            RepoError::Corrupt(e)
        })?;
        Ok(User {
            id: UserId(self.id),
            username: self.username,
            real_name: self.real_name,
            role,
            company_id: self.company_id.map(CompanyId),
        })
    }
}
