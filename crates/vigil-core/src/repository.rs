//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. The trust layer is generic over
//! [`TrustStore`], which bundles one implementation of each repository.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::VigilResult;
use crate::models::{
    audit::{AuditAction, AuditLogEntry, CreateAuditLogEntry},
    blocked_attempt::{AttemptStatus, BlockedAttempt, CreateBlockedAttempt, ResolveBlockedAttempt},
    device::{CreateDeviceRecord, DeviceFingerprint, DeviceRecord},
    permission::PagePermission,
    role::{CreateDepartmentGrant, DepartmentGrant, RoleTag},
    session::{CreateSession, Session},
    suspicious_login::{CreateSuspiciousLogin, ResolutionStatus, SuspiciousLoginAttempt},
    user::{CreateUser, DeviceCeiling, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Users, roles and page overrides
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = VigilResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = VigilResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = VigilResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = VigilResult<User>> + Send;
    fn set_max_devices(
        &self,
        id: Uuid,
        ceiling: DeviceCeiling,
    ) -> impl Future<Output = VigilResult<User>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = VigilResult<PaginatedResult<User>>> + Send;
}

pub trait RoleRepository: Send + Sync {
    /// Attach a role tag to a user. Assigning an already-held tag is a no-op.
    fn assign(&self, user_id: Uuid, role: RoleTag)
    -> impl Future<Output = VigilResult<()>> + Send;
    fn unassign(
        &self,
        user_id: Uuid,
        role: RoleTag,
    ) -> impl Future<Output = VigilResult<()>> + Send;
    fn get_user_roles(&self, user_id: Uuid)
    -> impl Future<Output = VigilResult<Vec<RoleTag>>> + Send;
}

pub trait DepartmentGrantRepository: Send + Sync {
    fn create(
        &self,
        input: CreateDepartmentGrant,
    ) -> impl Future<Output = VigilResult<DepartmentGrant>> + Send;
    fn set_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> impl Future<Output = VigilResult<DepartmentGrant>> + Send;
    fn list_for_user(
        &self,
        user_id: Uuid,
        department: RoleTag,
    ) -> impl Future<Output = VigilResult<Vec<DepartmentGrant>>> + Send;
}

pub trait PagePermissionRepository: Send + Sync {
    /// Upsert the override for `(user_id, page_path)`.
    fn set(
        &self,
        user_id: Uuid,
        page_path: &str,
        can_access: bool,
    ) -> impl Future<Output = VigilResult<PagePermission>> + Send;
    fn get(
        &self,
        user_id: Uuid,
        page_path: &str,
    ) -> impl Future<Output = VigilResult<Option<PagePermission>>> + Send;
    fn remove(
        &self,
        user_id: Uuid,
        page_path: &str,
    ) -> impl Future<Output = VigilResult<()>> + Send;
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = VigilResult<Vec<PagePermission>>> + Send;
}

// ---------------------------------------------------------------------------
// Device trust
// ---------------------------------------------------------------------------

pub trait DeviceRepository: Send + Sync {
    /// Insert a new active record with `login_count = 1`.
    fn create(
        &self,
        input: CreateDeviceRecord,
    ) -> impl Future<Output = VigilResult<DeviceRecord>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = VigilResult<DeviceRecord>> + Send;
    fn find_by_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> impl Future<Output = VigilResult<Option<DeviceRecord>>> + Send;
    fn list_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = VigilResult<Vec<DeviceRecord>>> + Send;
    fn count_active(&self, user_id: Uuid) -> impl Future<Output = VigilResult<u64>> + Send;
    /// Increment `login_count` and move `last_seen_at` forward to `seen_at`
    /// (never backwards).
    fn touch(
        &self,
        id: Uuid,
        seen_at: DateTime<Utc>,
    ) -> impl Future<Output = VigilResult<DeviceRecord>> + Send;
    fn set_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> impl Future<Output = VigilResult<DeviceRecord>> + Send;
    /// Make `id` the user's only primary device.
    fn set_primary(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VigilResult<DeviceRecord>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = VigilResult<()>> + Send;
}

pub trait BlockedAttemptRepository: Send + Sync {
    fn create(
        &self,
        input: CreateBlockedAttempt,
    ) -> impl Future<Output = VigilResult<BlockedAttempt>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = VigilResult<BlockedAttempt>> + Send;
    /// Most recent attempt for `(user_id, fingerprint)` in `status`.
    fn find_by_fingerprint(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
        status: AttemptStatus,
    ) -> impl Future<Output = VigilResult<Option<BlockedAttempt>>> + Send;
    fn is_blacklisted(
        &self,
        user_id: Uuid,
        fingerprint: &DeviceFingerprint,
    ) -> impl Future<Output = VigilResult<bool>> + Send;
    fn resolve(
        &self,
        id: Uuid,
        input: ResolveBlockedAttempt,
    ) -> impl Future<Output = VigilResult<BlockedAttempt>> + Send;
    fn list_by_status(
        &self,
        status: AttemptStatus,
        pagination: Pagination,
    ) -> impl Future<Output = VigilResult<PaginatedResult<BlockedAttempt>>> + Send;
}

pub trait SuspiciousLoginRepository: Send + Sync {
    fn create(
        &self,
        input: CreateSuspiciousLogin,
    ) -> impl Future<Output = VigilResult<SuspiciousLoginAttempt>> + Send;
    fn get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = VigilResult<SuspiciousLoginAttempt>> + Send;
    fn update_status(
        &self,
        id: Uuid,
        status: ResolutionStatus,
        notes: Option<String>,
    ) -> impl Future<Output = VigilResult<SuspiciousLoginAttempt>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = VigilResult<PaginatedResult<SuspiciousLoginAttempt>>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions & audit
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = VigilResult<Session>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = VigilResult<Session>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = VigilResult<Session>> + Send;
    fn invalidate(&self, id: Uuid) -> impl Future<Output = VigilResult<()>> + Send;
    fn invalidate_user_sessions(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = VigilResult<()>> + Send;
    /// Revoke every session admitted on `device_id`; returns how many.
    fn invalidate_device_sessions(
        &self,
        device_id: Uuid,
    ) -> impl Future<Output = VigilResult<u64>> + Send;
    fn cleanup_expired(&self) -> impl Future<Output = VigilResult<u64>> + Send;
}

/// Filter parameters for audit log queries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub subject_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = VigilResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = VigilResult<PaginatedResult<AuditLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Every repository the trust layer consults, behind one handle.
pub trait TrustStore: Send + Sync + 'static {
    type Users: UserRepository;
    type Roles: RoleRepository;
    type Grants: DepartmentGrantRepository;
    type Pages: PagePermissionRepository;
    type Devices: DeviceRepository;
    type BlockedAttempts: BlockedAttemptRepository;
    type SuspiciousLogins: SuspiciousLoginRepository;
    type Sessions: SessionRepository;
    type Audit: AuditLogRepository;

    fn users(&self) -> &Self::Users;
    fn roles(&self) -> &Self::Roles;
    fn grants(&self) -> &Self::Grants;
    fn pages(&self) -> &Self::Pages;
    fn devices(&self) -> &Self::Devices;
    fn blocked_attempts(&self) -> &Self::BlockedAttempts;
    fn suspicious_logins(&self) -> &Self::SuspiciousLogins;
    fn sessions(&self) -> &Self::Sessions;
    fn audit(&self) -> &Self::Audit;
}
