//! Device registry: known devices per user, the device ceiling and the
//! owner/admin mutations on device records.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use vigil_core::error::{VigilError, VigilResult};
use vigil_core::models::audit::{AuditAction, AuditOutcome};
use vigil_core::models::device::{CreateDeviceRecord, DeviceFingerprint, DeviceInfo, DeviceRecord};
use vigil_core::models::user::{DeviceCeiling, User};
use vigil_core::repository::{
    BlockedAttemptRepository, DeviceRepository, SessionRepository, TrustStore, UserRepository,
};

use crate::access::{is_admin, require_admin};
use crate::audit::{self, Actor};
use crate::events::{SecurityEvent, SecurityEventBus};

/// Reason attached to [`VigilError::DeviceBlocked`] for a blacklisted
/// fingerprint.
pub const BLACKLISTED: &str = "device is blacklisted";
/// Reason attached to [`VigilError::DeviceBlocked`] for a deactivated record.
pub const DISABLED: &str = "device is disabled";
/// Reason attached to [`VigilError::DeviceBlocked`] when a known device is
/// required and the fingerprint has no record.
pub const UNRECOGNIZED: &str = "device is not registered";

pub struct DeviceRegistry<T: TrustStore> {
    store: Arc<T>,
    events: SecurityEventBus,
}

impl<T: TrustStore> DeviceRegistry<T> {
    pub fn new(store: Arc<T>, events: SecurityEventBus) -> Self {
        Self { store, events }
    }

    async fn require_owner_or_admin(&self, actor: Uuid, owner: Uuid) -> VigilResult<()> {
        if actor == owner {
            return Ok(());
        }
        require_admin(self.store.as_ref(), actor).await
    }

    pub async fn find_by_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> VigilResult<Option<DeviceRecord>> {
        self.store
            .devices()
            .find_by_fingerprint(user_id, fingerprint)
            .await
    }

    pub async fn get(&self, actor: Uuid, device_id: Uuid) -> VigilResult<DeviceRecord> {
        let device = self.store.devices().get_by_id(device_id).await?;
        self.require_owner_or_admin(actor, device.user_id).await?;
        Ok(device)
    }

    pub async fn list_for_user(&self, actor: Uuid, user_id: Uuid) -> VigilResult<Vec<DeviceRecord>> {
        self.require_owner_or_admin(actor, user_id).await?;
        self.store.devices().list_by_user(user_id).await
    }

    /// Admit a login from `fingerprint`.
    ///
    /// Known active devices are touched. Unknown devices are registered
    /// while the user is under their ceiling; otherwise this fails with
    /// [`VigilError::DeviceLimitExceeded`] and nothing is written.
    /// Blacklisted fingerprints and deactivated records fail with
    /// [`VigilError::DeviceBlocked`] regardless of the ceiling.
    pub async fn record_login(
        &self,
        user: &User,
        fingerprint: &DeviceFingerprint,
        device_info: &DeviceInfo,
    ) -> VigilResult<DeviceRecord> {
        if let Some(existing) = self.touch_existing(user, fingerprint).await? {
            return Ok(existing);
        }

        let active = self.store.devices().count_active(user.id).await?;
        if !user.max_devices.admits(active) {
            info!(
                user_id = %user.id,
                active,
                ceiling = user.max_devices.to_raw(),
                "Device ceiling reached"
            );
            return Err(VigilError::DeviceLimitExceeded {
                user_id: user.id,
                ceiling: user.max_devices.limit(),
            });
        }

        self.register(
            user.id,
            fingerprint,
            device_info,
            Some(user.max_devices),
            Actor::System,
        )
        .await
    }

    /// Admit a login only from a device already registered and active for
    /// the user. Unknown fingerprints fail with [`VigilError::DeviceBlocked`]
    /// and nothing is created.
    pub async fn record_known_login(
        &self,
        user: &User,
        fingerprint: &DeviceFingerprint,
    ) -> VigilResult<DeviceRecord> {
        match self.touch_existing(user, fingerprint).await? {
            Some(device) => Ok(device),
            None => {
                warn!(user_id = %user.id, fingerprint = %fingerprint.short(), "Unregistered device refused");
                Err(VigilError::DeviceBlocked {
                    reason: UNRECOGNIZED.into(),
                })
            }
        }
    }

    /// Blacklist and status checks shared by both admission paths. Returns
    /// the touched record, or `None` when the fingerprint is unknown.
    async fn touch_existing(
        &self,
        user: &User,
        fingerprint: &DeviceFingerprint,
    ) -> VigilResult<Option<DeviceRecord>> {
        if self
            .store
            .blocked_attempts()
            .is_blacklisted(user.id, fingerprint)
            .await?
        {
            warn!(user_id = %user.id, fingerprint = %fingerprint.short(), "Blacklisted device refused");
            return Err(VigilError::DeviceBlocked {
                reason: BLACKLISTED.into(),
            });
        }

        let devices = self.store.devices();
        let Some(existing) = devices.find_by_fingerprint(user.id, fingerprint).await? else {
            return Ok(None);
        };
        if !existing.is_active {
            return Err(VigilError::DeviceBlocked {
                reason: DISABLED.into(),
            });
        }
        devices.touch(existing.id, Utc::now()).await.map(Some)
    }

    /// Insert a device record. A racing insert of the same fingerprint
    /// resolves to the record that won. With `ceiling` set, the insert is
    /// re-checked against it afterwards and withdrawn if a concurrent
    /// registration took the last slot.
    async fn register(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
        device_info: &DeviceInfo,
        ceiling: Option<DeviceCeiling>,
        actor: Actor,
    ) -> VigilResult<DeviceRecord> {
        let devices = self.store.devices();
        let is_primary = devices.list_by_user(user_id).await?.is_empty();

        let created = devices
            .create(CreateDeviceRecord {
                user_id,
                fingerprint: fingerprint.clone(),
                label: device_info.label(),
                device_info: device_info.clone(),
                is_primary,
                notes: None,
            })
            .await;

        let device = match created {
            Ok(device) => device,
            Err(VigilError::AlreadyExists { .. }) => {
                let existing = devices
                    .find_by_fingerprint(user_id, fingerprint)
                    .await?
                    .ok_or_else(|| VigilError::not_found("device", fingerprint.short()))?;
                return devices.touch(existing.id, Utc::now()).await;
            }
            Err(e) => return Err(e),
        };

        if let Some(DeviceCeiling::Limited(limit)) = ceiling {
            self.withdraw_if_over_ceiling(&device, limit).await?;
        }
        let device = self.settle_primary(user_id, device).await?;
        let is_primary = device.is_primary;

        info!(
            user_id = %user_id,
            device_id = %device.id,
            fingerprint = %fingerprint.short(),
            is_primary,
            "Device registered"
        );
        audit::record(
            self.store.as_ref(),
            actor,
            AuditAction::DeviceRegistered,
            Some(device.id),
            AuditOutcome::Success,
            json!({ "user_id": user_id, "fingerprint": fingerprint, "label": device.label }),
        )
        .await;

        Ok(device)
    }

    /// Two first logins can both read a free slot before either insert
    /// lands. Every racer ranks the user's active records by
    /// `(first_seen_at, id)` once its own insert is visible; a record ranked
    /// past the ceiling is deleted again and reported as over the limit.
    async fn withdraw_if_over_ceiling(&self, device: &DeviceRecord, limit: u32) -> VigilResult<()> {
        let devices = self.store.devices();
        let mut active: Vec<DeviceRecord> = devices
            .list_by_user(device.user_id)
            .await?
            .into_iter()
            .filter(|d| d.is_active)
            .collect();
        if active.len() <= limit as usize {
            return Ok(());
        }

        active.sort_by_key(|d| (d.first_seen_at, d.id));
        if active.iter().take(limit as usize).any(|d| d.id == device.id) {
            return Ok(());
        }

        devices.delete(device.id).await?;
        warn!(
            user_id = %device.user_id,
            device_id = %device.id,
            limit,
            "Concurrent registration exceeded the ceiling; record withdrawn"
        );
        if device.is_primary {
            self.settle_primary_for(device.user_id).await?;
        }
        Err(VigilError::DeviceLimitExceeded {
            user_id: device.user_id,
            ceiling: limit,
        })
    }

    /// Re-read `device` after making sure its user has exactly one primary.
    async fn settle_primary(&self, user_id: Uuid, device: DeviceRecord) -> VigilResult<DeviceRecord> {
        if self.settle_primary_for(user_id).await? {
            self.store.devices().get_by_id(device.id).await
        } else {
            Ok(device)
        }
    }

    /// Concurrent first registrations may each mark themselves primary, and
    /// a withdrawn record may take the only primary flag with it. The
    /// earliest primary wins, or the earliest record if none is primary.
    /// Returns whether anything changed.
    async fn settle_primary_for(&self, user_id: Uuid) -> VigilResult<bool> {
        let devices = self.store.devices();
        let records = devices.list_by_user(user_id).await?;
        let primaries = records.iter().filter(|d| d.is_primary).count();
        if primaries == 1 || records.is_empty() {
            return Ok(false);
        }

        let candidates = records.iter().filter(|d| primaries == 0 || d.is_primary);
        let Some(keep) = candidates.min_by_key(|d| (d.first_seen_at, d.id)) else {
            return Ok(false);
        };
        devices.set_primary(user_id, keep.id).await?;
        info!(user_id = %user_id, device_id = %keep.id, primaries, "Primary device settled");
        Ok(true)
    }

    /// Admit a device an administrator approved: reactivate an existing
    /// record for the fingerprint or register a new one past the ceiling.
    pub(crate) async fn admit_approved(
        &self,
        actor: Uuid,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
        device_info: &DeviceInfo,
    ) -> VigilResult<DeviceRecord> {
        let devices = self.store.devices();
        match devices.find_by_fingerprint(user_id, fingerprint).await? {
            Some(existing) if existing.is_active => Ok(existing),
            Some(existing) => devices.set_active(existing.id, true).await,
            None => {
                self.register(user_id, fingerprint, device_info, None, Actor::User(actor))
                    .await
            }
        }
    }

    /// Deactivate any record for a blacklisted fingerprint and drop its
    /// sessions.
    pub(crate) async fn revoke_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
        reason: &str,
    ) -> VigilResult<Option<DeviceRecord>> {
        let devices = self.store.devices();
        let Some(existing) = devices.find_by_fingerprint(user_id, fingerprint).await? else {
            return Ok(None);
        };

        let device = if existing.is_active {
            devices.set_active(existing.id, false).await?
        } else {
            existing
        };
        self.revoke_device_sessions(&device, reason).await?;
        Ok(Some(device))
    }

    async fn revoke_device_sessions(&self, device: &DeviceRecord, reason: &str) -> VigilResult<()> {
        let revoked = self
            .store
            .sessions()
            .invalidate_device_sessions(device.id)
            .await?;
        if revoked > 0 {
            info!(device_id = %device.id, revoked, reason, "Device sessions revoked");
            self.events.publish(SecurityEvent::SessionsRevoked {
                user_id: device.user_id,
                device_id: Some(device.id),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    /// Flip `is_active`. Deactivation ends every session bound to the
    /// device so the next gate check forces re-authentication.
    pub async fn toggle_active(&self, actor: Uuid, device_id: Uuid) -> VigilResult<DeviceRecord> {
        let device = self.store.devices().get_by_id(device_id).await?;
        self.require_owner_or_admin(actor, device.user_id).await?;

        // Owners reactivating a record are held to the ceiling like a new
        // login; administrators may exceed it as with an approval.
        if !device.is_active && !is_admin(self.store.as_ref(), actor).await? {
            let user = self.store.users().get_by_id(device.user_id).await?;
            let active = self.store.devices().count_active(user.id).await?;
            if !user.max_devices.admits(active) {
                info!(
                    user_id = %user.id,
                    device_id = %device_id,
                    active,
                    "Reactivation refused at the device ceiling"
                );
                return Err(VigilError::DeviceLimitExceeded {
                    user_id: user.id,
                    ceiling: user.max_devices.limit(),
                });
            }
        }

        let updated = self
            .store
            .devices()
            .set_active(device_id, !device.is_active)
            .await?;
        if !updated.is_active {
            self.revoke_device_sessions(&updated, "device deactivated")
                .await?;
        }

        audit::record(
            self.store.as_ref(),
            Actor::User(actor),
            if updated.is_active {
                AuditAction::DeviceActivated
            } else {
                AuditAction::DeviceDeactivated
            },
            Some(device_id),
            AuditOutcome::Success,
            json!({ "user_id": updated.user_id }),
        )
        .await;

        Ok(updated)
    }

    /// Hard-delete a device record. Blocked-attempt history is untouched.
    pub async fn delete(&self, actor: Uuid, device_id: Uuid) -> VigilResult<()> {
        require_admin(self.store.as_ref(), actor).await?;
        let device = self.store.devices().get_by_id(device_id).await?;

        self.revoke_device_sessions(&device, "device deleted").await?;
        self.store.devices().delete(device_id).await?;

        info!(device_id = %device_id, user_id = %device.user_id, "Device deleted");
        audit::record(
            self.store.as_ref(),
            Actor::User(actor),
            AuditAction::DeviceDeleted,
            Some(device_id),
            AuditOutcome::Success,
            json!({ "user_id": device.user_id, "fingerprint": device.fingerprint }),
        )
        .await;
        Ok(())
    }

    /// Make `device_id` the user's only primary device.
    pub async fn set_primary(&self, actor: Uuid, device_id: Uuid) -> VigilResult<DeviceRecord> {
        let device = self.store.devices().get_by_id(device_id).await?;
        self.require_owner_or_admin(actor, device.user_id).await?;

        let updated = self
            .store
            .devices()
            .set_primary(device.user_id, device_id)
            .await?;

        audit::record(
            self.store.as_ref(),
            Actor::User(actor),
            AuditAction::DevicePrimarySet,
            Some(device_id),
            AuditOutcome::Success,
            json!({ "user_id": device.user_id }),
        )
        .await;
        Ok(updated)
    }

    /// Change a user's device ceiling. `raw` uses the wire form: `1..=999`,
    /// or `-1` for unlimited.
    pub async fn set_max_devices(&self, actor: Uuid, user_id: Uuid, raw: i64) -> VigilResult<User> {
        if let Err(e) = require_admin(self.store.as_ref(), actor).await {
            audit::record(
                self.store.as_ref(),
                Actor::User(actor),
                AuditAction::MaxDevicesUpdated,
                Some(user_id),
                AuditOutcome::Denied,
                json!({ "requested": raw }),
            )
            .await;
            return Err(e);
        }
        let ceiling = DeviceCeiling::from_raw(raw)?;

        let user = self
            .store
            .users()
            .set_max_devices(user_id, ceiling)
            .await?;

        info!(user_id = %user_id, max_devices = raw, "Device ceiling updated");
        audit::record(
            self.store.as_ref(),
            Actor::User(actor),
            AuditAction::MaxDevicesUpdated,
            Some(user_id),
            AuditOutcome::Success,
            json!({ "max_devices": raw }),
        )
        .await;
        Ok(user)
    }
}
