//! Route access resolution against role tags, page overrides and
//! department grants stored in SurrealDB.

use std::sync::Arc;

use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use vigil_auth::access::{AccessDecision, AccessPolicy, DenyReason, RouteAccessResolver};
use vigil_auth::config::AuthConfig;
use vigil_core::models::role::{CreateDepartmentGrant, RoleLevel, RoleTag};
use vigil_core::models::session::SessionContext;
use vigil_core::models::user::{CreateUser, DeviceCeiling};
use vigil_core::repository::{
    DepartmentGrantRepository, PagePermissionRepository, RoleRepository, TrustStore,
    UserRepository,
};
use vigil_db::SurrealStore;

type Store = SurrealStore<Db>;

async fn setup() -> (RouteAccessResolver<Store>, Arc<Store>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vigil_db::run_migrations(&db).await.unwrap();

    let store = Arc::new(SurrealStore::new(db));
    let resolver = RouteAccessResolver::new(
        store.clone(),
        AccessPolicy::police_portal(),
        Arc::new(AuthConfig::default()),
    );
    (resolver, store)
}

async fn user_with_roles(store: &Store, email: &str, roles: &[RoleTag]) -> SessionContext {
    let user = store
        .users()
        .create(CreateUser {
            email: email.into(),
            full_name: email.into(),
            badge_number: None,
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            max_devices: DeviceCeiling::Limited(3),
        })
        .await
        .unwrap();
    for role in roles {
        store.roles().assign(user.id, *role).await.unwrap();
    }
    SessionContext {
        user_id: user.id,
        session_id: Uuid::new_v4(),
        device_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn admin_is_allowed_everywhere_despite_overrides() {
    let (resolver, store) = setup().await;
    let admin = user_with_roles(&store, "admin@police.example", &[RoleTag::Admin]).await;
    store
        .pages()
        .set(admin.user_id, "/cybercrime", false)
        .await
        .unwrap();

    for page in ["/admin", "/cybercrime", "/cid/case/7", "/traffic", "/news"] {
        let decision = resolver.resolve(&admin, page).await.unwrap();
        assert!(decision.is_allowed(), "{page}");
    }
}

#[tokio::test]
async fn page_override_denies_qualified_user() {
    let (resolver, store) = setup().await;
    let officer = user_with_roles(&store, "officer@police.example", &[RoleTag::Officer]).await;

    assert!(resolver.resolve(&officer, "/cases").await.unwrap().is_allowed());

    store
        .pages()
        .set(officer.user_id, "/cases/", false)
        .await
        .unwrap();
    let decision = resolver.resolve(&officer, "/Cases").await.unwrap();
    assert_eq!(decision, AccessDecision::Deny(DenyReason::PageOverride));

    // An explicit allow does not lift a role requirement.
    let plain = user_with_roles(&store, "plain@police.example", &[RoleTag::User]).await;
    store.pages().set(plain.user_id, "/admin", true).await.unwrap();
    let decision = resolver.resolve(&plain, "/admin").await.unwrap();
    assert_eq!(
        decision,
        AccessDecision::Deny(DenyReason::InsufficientRole {
            required: RoleLevel::Admin
        })
    );
}

#[tokio::test]
async fn role_hierarchy_gates_officer_pages() {
    let (resolver, store) = setup().await;
    let plain = user_with_roles(&store, "plain@police.example", &[RoleTag::User]).await;
    let officer = user_with_roles(&store, "officer@police.example", &[RoleTag::Officer]).await;

    assert!(
        !resolver
            .resolve(&plain, "/citizen-lookup")
            .await
            .unwrap()
            .is_allowed()
    );
    assert!(
        resolver
            .resolve(&officer, "/citizen-lookup")
            .await
            .unwrap()
            .is_allowed()
    );
    assert!(!resolver.resolve(&officer, "/admin").await.unwrap().is_allowed());
}

#[tokio::test]
async fn department_pages_need_their_tag() {
    let (resolver, store) = setup().await;
    let traffic = user_with_roles(
        &store,
        "traffic@police.example",
        &[RoleTag::Officer, RoleTag::TrafficPolice],
    )
    .await;
    let cid = user_with_roles(&store, "cid@police.example", &[RoleTag::Cid]).await;

    assert!(resolver.resolve(&traffic, "/traffic/challans").await.unwrap().is_allowed());
    let decision = resolver.resolve(&traffic, "/cid").await.unwrap();
    assert_eq!(
        decision,
        AccessDecision::Deny(DenyReason::MissingDepartment {
            required: vec![RoleTag::Cid]
        })
    );

    assert!(resolver.resolve(&cid, "/crime-records").await.unwrap().is_allowed());
    assert!(!resolver.resolve(&traffic, "/crime-records").await.unwrap().is_allowed());
}

#[tokio::test]
async fn cybercrime_accepts_tag_or_active_grant() {
    let (resolver, store) = setup().await;
    let tagged = user_with_roles(&store, "cyber@police.example", &[RoleTag::Cybercrime]).await;
    let analyst = user_with_roles(&store, "analyst@police.example", &[RoleTag::Officer]).await;

    assert!(resolver.resolve(&tagged, "/cybercrime").await.unwrap().is_allowed());

    let decision = resolver.resolve(&analyst, "/cybercrime/cases").await.unwrap();
    assert_eq!(
        decision,
        AccessDecision::Deny(DenyReason::NoActiveGrant {
            department: RoleTag::Cybercrime
        })
    );

    // An expired grant does not count.
    store
        .grants()
        .create(CreateDepartmentGrant {
            user_id: analyst.user_id,
            department: RoleTag::Cybercrime,
            granted_by: None,
            expires_at: Some(Utc::now() - Duration::hours(1)),
        })
        .await
        .unwrap();
    assert!(!resolver.resolve(&analyst, "/cybercrime").await.unwrap().is_allowed());

    let grant = store
        .grants()
        .create(CreateDepartmentGrant {
            user_id: analyst.user_id,
            department: RoleTag::Cybercrime,
            granted_by: None,
            expires_at: Some(Utc::now() + Duration::days(7)),
        })
        .await
        .unwrap();
    assert!(resolver.resolve(&analyst, "/cybercrime").await.unwrap().is_allowed());

    store.grants().set_active(grant.id, false).await.unwrap();
    assert!(!resolver.resolve(&analyst, "/cybercrime").await.unwrap().is_allowed());
}

#[tokio::test]
async fn pages_without_rules_are_open() {
    let (resolver, store) = setup().await;
    let plain = user_with_roles(&store, "plain@police.example", &[]).await;

    assert_eq!(
        resolver.resolve(&plain, "/news").await.unwrap(),
        AccessDecision::Allow
    );
    assert_eq!(
        resolver.resolve(&plain, "/profile?tab=devices").await.unwrap(),
        AccessDecision::Allow
    );
}

#[tokio::test]
async fn disguised_paths_hit_the_same_rule() {
    let (resolver, store) = setup().await;
    let officer = user_with_roles(&store, "officer@police.example", &[RoleTag::Officer]).await;

    for page in ["//admin", "/news/../admin", "/./admin/", "/ADMIN//users"] {
        assert!(
            !resolver.resolve(&officer, page).await.unwrap().is_allowed(),
            "{page} should be gated like /admin"
        );
    }
}
