use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_domain::repository::UserStore;
use ridepool_domain::user::UserRef;
use ridepool_domain::DomainResult;

use crate::storage_err;

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    avatar: Option<String>,
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get(&self, id: Uuid) -> DomainResult<Option<UserRef>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, first_name, last_name, avatar FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        Ok(row.map(|r| UserRef {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            avatar: r.avatar,
        }))
    }
}
