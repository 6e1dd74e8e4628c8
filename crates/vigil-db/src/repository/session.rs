//! SurrealDB implementation of [`SessionRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::session::{CreateSession, Session};
use vigil_core::repository::SessionRepository;

use super::{CountRow, parse_uuid, write_error};
use crate::error::DbError;

const SELECT_SESSION: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('session', $id)";

#[derive(Debug, SurrealValue)]
struct SessionRow {
    record_id: String,
    user_id: String,
    device_id: String,
    token_hash: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, DbError> {
        Ok(Session {
            id: parse_uuid("session", &self.record_id)?,
            user_id: parse_uuid("session", &self.user_id)?,
            device_id: parse_uuid("session", &self.device_id)?,
            token_hash: self.token_hash,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}

fn first_session(rows: Vec<SessionRow>, id: String) -> Result<Session, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id,
        })?
        .try_into_session()
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> VigilResult<Session> {
        let id_str = Uuid::new_v4().to_string();

        let query = format!(
            "CREATE type::record('session', $id) SET \
             user_id = $user_id, \
             device_id = $device_id, \
             token_hash = $token_hash, \
             ip_address = $ip_address, \
             user_agent = $user_agent, \
             expires_at = $expires_at; \
             {SELECT_SESSION};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("device_id", input.device_id.to_string()))
            .bind(("token_hash", input.token_hash))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| write_error("session", e))?;

        let rows: Vec<SessionRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_session(rows, id_str)?)
    }

    async fn get_by_id(&self, id: Uuid) -> VigilResult<Session> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_SESSION)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_session(rows, id_str)?)
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> VigilResult<Session> {
        let token_hash_owned = token_hash.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM session \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_session(rows, format!("token_hash={token_hash_owned}"))?)
    }

    async fn invalidate(&self, id: Uuid) -> VigilResult<()> {
        self.db
            .query("DELETE type::record('session', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn invalidate_user_sessions(&self, user_id: Uuid) -> VigilResult<()> {
        self.db
            .query("DELETE session WHERE user_id = $user_id")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn invalidate_device_sessions(&self, device_id: Uuid) -> VigilResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE device_id = $device_id GROUP ALL; \
                 DELETE session WHERE device_id = $device_id;",
            )
            .bind(("device_id", device_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn cleanup_expired(&self) -> VigilResult<u64> {
        // Count expired sessions first, then delete.
        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE expires_at < time::now() GROUP ALL",
            )
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        self.db
            .query("DELETE session WHERE expires_at < time::now()")
            .await
            .map_err(DbError::from)?;

        Ok(total)
    }
}
