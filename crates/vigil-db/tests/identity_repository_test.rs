//! Integration tests for users, role tags, department grants and page
//! overrides using in-memory SurrealDB.

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use vigil_core::error::VigilError;
use vigil_core::models::role::{CreateDepartmentGrant, RoleTag};
use vigil_core::models::user::{CreateUser, DeviceCeiling, UpdateUser, UserStatus};
use vigil_core::repository::{
    DepartmentGrantRepository, PagePermissionRepository, Pagination, RoleRepository,
    UserRepository,
};
use vigil_db::repository::{
    SurrealDepartmentGrantRepository, SurrealPagePermissionRepository, SurrealRoleRepository,
    SurrealUserRepository,
};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vigil_db::run_migrations(&db).await.unwrap();
    db
}

fn officer(email: &str) -> CreateUser {
    CreateUser {
        email: email.into(),
        full_name: "Asha Verma".into(),
        badge_number: Some("KP-1042".into()),
        password_hash: "$argon2id$placeholder".into(),
        max_devices: DeviceCeiling::Limited(3),
    }
}

#[tokio::test]
async fn create_and_get_user() {
    let repo = SurrealUserRepository::new(setup().await);

    let user = repo.create(officer("Asha@Police.example")).await.unwrap();
    assert_eq!(user.email, "asha@police.example");
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.max_devices, DeviceCeiling::Limited(3));
    assert!(!user.biometric_enabled);

    let fetched = repo.get_by_id(user.id).await.unwrap();
    assert_eq!(fetched.id, user.id);
    assert_eq!(fetched.badge_number.as_deref(), Some("KP-1042"));

    let by_email = repo.get_by_email("ASHA@police.example").await.unwrap();
    assert_eq!(by_email.id, user.id);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let repo = SurrealUserRepository::new(setup().await);

    repo.create(officer("dup@police.example")).await.unwrap();
    let err = repo.create(officer("dup@police.example")).await.unwrap_err();
    assert!(matches!(err, VigilError::AlreadyExists { .. }), "got {err:?}");
}

#[tokio::test]
async fn missing_user_is_not_found() {
    let repo = SurrealUserRepository::new(setup().await);
    let err = repo.get_by_id(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, VigilError::NotFound { .. }));
}

#[tokio::test]
async fn update_and_ceiling_changes_persist() {
    let repo = SurrealUserRepository::new(setup().await);
    let user = repo.create(officer("upd@police.example")).await.unwrap();

    let updated = repo
        .update(
            user.id,
            UpdateUser {
                status: Some(UserStatus::Suspended),
                biometric_enabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, UserStatus::Suspended);
    assert!(updated.biometric_enabled);
    assert_eq!(updated.full_name, "Asha Verma");

    let unlimited = repo
        .set_max_devices(user.id, DeviceCeiling::Unlimited)
        .await
        .unwrap();
    assert_eq!(unlimited.max_devices, DeviceCeiling::Unlimited);

    let listed = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.items[0].max_devices, DeviceCeiling::Unlimited);
}

#[tokio::test]
async fn role_assignment_is_idempotent() {
    let db = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db);
    let user = users.create(officer("roles@police.example")).await.unwrap();

    roles.assign(user.id, RoleTag::Officer).await.unwrap();
    roles.assign(user.id, RoleTag::Officer).await.unwrap();
    roles.assign(user.id, RoleTag::Cid).await.unwrap();

    let mut held = roles.get_user_roles(user.id).await.unwrap();
    held.sort_by_key(|r| r.as_str());
    assert_eq!(held, vec![RoleTag::Cid, RoleTag::Officer]);

    roles.unassign(user.id, RoleTag::Cid).await.unwrap();
    assert_eq!(
        roles.get_user_roles(user.id).await.unwrap(),
        vec![RoleTag::Officer]
    );
}

#[tokio::test]
async fn department_grants_can_be_revoked() {
    let db = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let grants = SurrealDepartmentGrantRepository::new(db);
    let user = users.create(officer("grant@police.example")).await.unwrap();

    let grant = grants
        .create(CreateDepartmentGrant {
            user_id: user.id,
            department: RoleTag::Forensics,
            granted_by: None,
            expires_at: Some(Utc::now() + Duration::days(7)),
        })
        .await
        .unwrap();
    assert!(grant.is_active);
    assert!(grant.is_effective(Utc::now()));

    let revoked = grants.set_active(grant.id, false).await.unwrap();
    assert!(!revoked.is_effective(Utc::now()));

    let listed = grants
        .list_for_user(user.id, RoleTag::Forensics)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].is_active);

    let other = grants.list_for_user(user.id, RoleTag::Cid).await.unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn page_overrides_upsert_on_normalized_path() {
    let db = setup().await;
    let users = SurrealUserRepository::new(db.clone());
    let pages = SurrealPagePermissionRepository::new(db);
    let user = users.create(officer("pages@police.example")).await.unwrap();

    let first = pages.set(user.id, "/Reports/", true).await.unwrap();
    assert_eq!(first.page_path, "/reports");
    assert!(first.can_access);

    let second = pages.set(user.id, "/reports?tab=2", false).await.unwrap();
    assert_eq!(second.id, first.id);
    assert!(!second.can_access);

    let fetched = pages.get(user.id, "/reports").await.unwrap().unwrap();
    assert!(!fetched.can_access);
    assert_eq!(pages.list_for_user(user.id).await.unwrap().len(), 1);

    pages.remove(user.id, "/reports").await.unwrap();
    assert!(pages.get(user.id, "/reports").await.unwrap().is_none());
}
