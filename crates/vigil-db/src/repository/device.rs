//! SurrealDB implementation of [`DeviceRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vigil_core::error::VigilResult;
use vigil_core::models::device::{CreateDeviceRecord, DeviceFingerprint, DeviceInfo, DeviceRecord};
use vigil_core::repository::DeviceRepository;

use super::{CountRow, parse_uuid, write_error};
use crate::error::DbError;

const SELECT_DEVICE: &str = "SELECT meta::id(id) AS record_id, * FROM type::record('device', $id)";

#[derive(Debug, SurrealValue)]
struct DeviceRow {
    record_id: String,
    user_id: String,
    fingerprint: String,
    label: String,
    device_info: serde_json::Value,
    is_active: bool,
    is_primary: bool,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    login_count: i64,
    notes: Option<String>,
}

impl DeviceRow {
    fn try_into_device(self) -> Result<DeviceRecord, DbError> {
        let device_info: DeviceInfo = serde_json::from_value(self.device_info)
            .map_err(|e| DbError::decode("device", format!("device_info: {e}")))?;
        Ok(DeviceRecord {
            id: parse_uuid("device", &self.record_id)?,
            user_id: parse_uuid("device", &self.user_id)?,
            fingerprint: DeviceFingerprint::new(self.fingerprint),
            label: self.label,
            device_info,
            is_active: self.is_active,
            is_primary: self.is_primary,
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            login_count: self.login_count.max(0) as u64,
            notes: self.notes,
        })
    }
}

fn first_device(rows: Vec<DeviceRow>, id: impl Into<String>) -> Result<DeviceRecord, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "device".into(),
            id: id.into(),
        })?
        .try_into_device()
}

pub(crate) fn device_info_value(info: &DeviceInfo) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(info).map_err(|e| DbError::decode("device", format!("device_info: {e}")))
}

/// SurrealDB implementation of the device registry table.
#[derive(Clone)]
pub struct SurrealDeviceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDeviceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> DeviceRepository for SurrealDeviceRepository<C> {
    async fn create(&self, input: CreateDeviceRecord) -> VigilResult<DeviceRecord> {
        let id_str = Uuid::new_v4().to_string();
        let device_info = device_info_value(&input.device_info)?;

        let query = format!(
            "CREATE type::record('device', $id) SET \
             user_id = $user_id, fingerprint = $fingerprint, \
             label = $label, device_info = $device_info, \
             is_active = true, is_primary = $is_primary, \
             first_seen_at = time::now(), last_seen_at = time::now(), \
             login_count = 1, notes = $notes; \
             {SELECT_DEVICE};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("fingerprint", input.fingerprint.as_str().to_string()))
            .bind(("label", input.label))
            .bind(("device_info", device_info))
            .bind(("is_primary", input.is_primary))
            .bind(("notes", input.notes))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| write_error("device", e))?;

        let rows: Vec<DeviceRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_device(rows, id_str)?)
    }

    async fn get_by_id(&self, id: Uuid) -> VigilResult<DeviceRecord> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_DEVICE)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DeviceRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_device(rows, id_str)?)
    }

    async fn find_by_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> VigilResult<Option<DeviceRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM device \
                 WHERE user_id = $user_id AND fingerprint = $fingerprint",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("fingerprint", fingerprint.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DeviceRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(DeviceRow::try_into_device)
            .transpose()?)
    }

    async fn list_by_user(&self, user_id: Uuid) -> VigilResult<Vec<DeviceRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM device \
                 WHERE user_id = $user_id ORDER BY first_seen_at ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DeviceRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(DeviceRow::try_into_device)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn count_active(&self, user_id: Uuid) -> VigilResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM device \
                 WHERE user_id = $user_id AND is_active = true GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn touch(&self, id: Uuid, seen_at: DateTime<Utc>) -> VigilResult<DeviceRecord> {
        let id_str = id.to_string();

        // Concurrent tabs may race here; last write wins on the timestamp.
        let query = format!(
            "UPDATE type::record('device', $id) SET \
             login_count += 1, \
             last_seen_at = IF last_seen_at > $seen_at \
                 THEN last_seen_at ELSE $seen_at END; \
             {SELECT_DEVICE};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("seen_at", seen_at))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| write_error("device", e))?;

        let rows: Vec<DeviceRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_device(rows, id_str)?)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> VigilResult<DeviceRecord> {
        let id_str = id.to_string();

        let query = format!(
            "UPDATE type::record('device', $id) SET is_active = $is_active; \
             {SELECT_DEVICE};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("is_active", is_active))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| write_error("device", e))?;

        let rows: Vec<DeviceRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_device(rows, id_str)?)
    }

    async fn set_primary(&self, user_id: Uuid, id: Uuid) -> VigilResult<DeviceRecord> {
        let device = self.get_by_id(id).await?;
        if device.user_id != user_id {
            return Err(DbError::NotFound {
                entity: "device".into(),
                id: id.to_string(),
            }
            .into());
        }

        let id_str = id.to_string();

        // A single statement flips every record of the user so at most one
        // primary exists afterwards.
        let query = format!(
            "UPDATE device SET is_primary = (meta::id(id) = $id) \
             WHERE user_id = $user_id; \
             {SELECT_DEVICE};"
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| write_error("device", e))?;

        let rows: Vec<DeviceRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_device(rows, id_str)?)
    }

    async fn delete(&self, id: Uuid) -> VigilResult<()> {
        self.db
            .query("DELETE type::record('device', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}
