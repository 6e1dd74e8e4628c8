//! Bundles every SurrealDB repository behind a single [`TrustStore`].

use surrealdb::{Connection, Surreal};
use vigil_core::repository::TrustStore;

use crate::repository::{
    SurrealAuditLogRepository, SurrealBlockedAttemptRepository, SurrealDepartmentGrantRepository,
    SurrealDeviceRepository, SurrealPagePermissionRepository, SurrealRoleRepository,
    SurrealSessionRepository, SurrealSuspiciousLoginRepository, SurrealUserRepository,
};

/// All repositories sharing one SurrealDB handle.
#[derive(Clone)]
pub struct SurrealStore<C: Connection> {
    users: SurrealUserRepository<C>,
    roles: SurrealRoleRepository<C>,
    grants: SurrealDepartmentGrantRepository<C>,
    pages: SurrealPagePermissionRepository<C>,
    devices: SurrealDeviceRepository<C>,
    blocked_attempts: SurrealBlockedAttemptRepository<C>,
    suspicious_logins: SurrealSuspiciousLoginRepository<C>,
    sessions: SurrealSessionRepository<C>,
    audit: SurrealAuditLogRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            users: SurrealUserRepository::new(db.clone()),
            roles: SurrealRoleRepository::new(db.clone()),
            grants: SurrealDepartmentGrantRepository::new(db.clone()),
            pages: SurrealPagePermissionRepository::new(db.clone()),
            devices: SurrealDeviceRepository::new(db.clone()),
            blocked_attempts: SurrealBlockedAttemptRepository::new(db.clone()),
            suspicious_logins: SurrealSuspiciousLoginRepository::new(db.clone()),
            sessions: SurrealSessionRepository::new(db.clone()),
            audit: SurrealAuditLogRepository::new(db),
        }
    }
}

impl<C: Connection> TrustStore for SurrealStore<C> {
    type Users = SurrealUserRepository<C>;
    type Roles = SurrealRoleRepository<C>;
    type Grants = SurrealDepartmentGrantRepository<C>;
    type Pages = SurrealPagePermissionRepository<C>;
    type Devices = SurrealDeviceRepository<C>;
    type BlockedAttempts = SurrealBlockedAttemptRepository<C>;
    type SuspiciousLogins = SurrealSuspiciousLoginRepository<C>;
    type Sessions = SurrealSessionRepository<C>;
    type Audit = SurrealAuditLogRepository<C>;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn roles(&self) -> &Self::Roles {
        &self.roles
    }

    fn grants(&self) -> &Self::Grants {
        &self.grants
    }

    fn pages(&self) -> &Self::Pages {
        &self.pages
    }

    fn devices(&self) -> &Self::Devices {
        &self.devices
    }

    fn blocked_attempts(&self) -> &Self::BlockedAttempts {
        &self.blocked_attempts
    }

    fn suspicious_logins(&self) -> &Self::SuspiciousLogins {
        &self.suspicious_logins
    }

    fn sessions(&self) -> &Self::Sessions {
        &self.sessions
    }

    fn audit(&self) -> &Self::Audit {
        &self.audit
    }
}
