//! End-to-end checks through the `Core` facade: scoping, record checks, and the
//! notify → store → push → live connection path.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use dealflow_auth::{AuthzError, EntityKind, Permission, Role};
use dealflow_core::{CompanyId, TeamId, UserId};
use dealflow_infra::{CoreConfig, DirectoryUser, InMemoryRecordStore, RecordQuery, RecordRow, UserDirectory};
use dealflow_notify::{EntityEvent, InMemoryNotificationStore, PushEnvelope};
use dealflow_service::{Core, CoreError};

struct World {
    company: CompanyId,
    directory: Arc<UserDirectory>,
    admin: DirectoryUser,
    manager: DirectoryUser,
    rep: DirectoryUser,
    loner: DirectoryUser,
    root: DirectoryUser,
}

fn world() -> World {
    let company = CompanyId::new();
    let team = TeamId::new();
    let directory = Arc::new(UserDirectory::new());

    let admin = DirectoryUser::new(company, Role::CompanyAdmin);
    let manager = DirectoryUser::new(company, Role::SalesManager).with_team(team);
    let rep = DirectoryUser::new(company, Role::SalesRep).with_team(team);
    let loner = DirectoryUser::new(company, Role::SalesRep);
    let root = DirectoryUser::new(CompanyId::new(), Role::SuperAdmin);
    for u in [&admin, &manager, &rep, &loner, &root] {
        directory.upsert(u.clone()).unwrap();
    }

    World {
        company,
        directory,
        admin,
        manager,
        rep,
        loner,
        root,
    }
}

fn config() -> CoreConfig {
    CoreConfig {
        push_poll_interval: Duration::from_millis(10),
        push_worker_name: "e2e-push".to_string(),
        ..CoreConfig::default()
    }
}

fn start(w: &World) -> Core<UserDirectory> {
    Core::start(&config(), w.directory.clone(), Arc::new(InMemoryNotificationStore::new())).unwrap()
}

#[test]
fn list_queries_follow_the_role_tiers() {
    let w = world();
    let core = start(&w);
    let records = InMemoryRecordStore::new();
    for owner in [&w.admin, &w.manager, &w.rep, &w.loner] {
        records.insert(RecordRow::new(EntityKind::Deal, w.company, owner.id, "deal")).unwrap();
    }
    records.insert(RecordRow::new(EntityKind::Deal, CompanyId::new(), UserId::new(), "foreign")).unwrap();

    let visible = |user: &DirectoryUser| -> usize {
        let q = core
            .scope_query(&user.actor(), EntityKind::Deal, RecordQuery::new(EntityKind::Deal))
            .unwrap();
        records.fetch(&q).len()
    };

    assert_eq!(visible(&w.root), 5);
    assert_eq!(visible(&w.admin), 4);
    assert_eq!(visible(&w.manager), 2);
    assert_eq!(visible(&w.rep), 1);
    assert_eq!(visible(&w.loner), 1);

    core.shutdown();
}

#[test]
fn out_of_scope_record_is_refused() {
    let w = world();
    let core = start(&w);
    let theirs = RecordRow::new(EntityKind::Contact, w.company, w.admin.id, "not yours");
    let mine = RecordRow::new(EntityKind::Contact, w.company, w.loner.id, "yours");

    assert!(core.scope_record(&w.loner.actor(), EntityKind::Contact, &mine).is_ok());
    match core.scope_record(&w.loner.actor(), EntityKind::Contact, &theirs) {
        Err(CoreError::Authz(AuthzError::RecordOutOfScope { entity })) => assert_eq!(entity, EntityKind::Contact),
        other => panic!("expected RecordOutOfScope, got {other:?}"),
    }

    assert!(core.authorize(&w.loner.actor(), Permission::CreateRecords).is_ok());
    assert!(core.authorize(&w.loner.actor(), Permission::DeleteRecords).is_err());
    core.shutdown();
}

#[test]
fn notify_persists_and_pushes() {
    let w = world();
    let core = start(&w);
    let live = core.connect(w.company).unwrap();

    let report = core.notify(&w.admin.actor(), w.company, &EntityEvent::created(EntityKind::Deal));
    // Everyone in the company plus the super-admin from another company.
    assert_eq!(report.recipients, 5);
    assert_eq!(report.persisted.len(), 5);

    let mut seen = BTreeSet::new();
    for _ in 0..4 {
        let msg = live.recv_timeout(Duration::from_secs(2)).unwrap();
        let PushEnvelope::NewNotification { notification } = serde_json::from_value(msg.payload).unwrap();
        assert_eq!(notification.company_id, w.company);
        seen.insert(notification.recipient_id);
    }
    let expected: BTreeSet<UserId> = [w.admin.id, w.manager.id, w.rep.id, w.loner.id].into_iter().collect();
    assert_eq!(seen, expected);

    let root_rows = core.notifications().list_for_recipient(w.root.company_id, w.root.id, false).unwrap();
    assert_eq!(root_rows.len(), 1);

    let stats = core.shutdown();
    assert_eq!(stats.delivered, 5);
}

#[test]
fn retention_purges_only_old_read_rows() {
    let w = world();
    let core = start(&w);
    core.notify(&w.rep.actor(), w.company, &EntityEvent::created(EntityKind::Contact));

    let store = core.notifications();
    let rows = store.list_for_recipient(w.company, w.admin.id, false).unwrap();
    assert_eq!(rows.len(), 1);
    store.mark_read(w.company, w.admin.id, rows[0].id, Utc::now()).unwrap();

    assert_eq!(core.purge_expired(Utc::now()), 0);
    let far_future = Utc::now() + chrono::Duration::days(365);
    assert_eq!(core.purge_expired(far_future), 1);
    assert!(store.list_for_recipient(w.company, w.admin.id, false).unwrap().is_empty());

    core.shutdown();
}

#[test]
fn shutdown_closes_live_connections() {
    let w = world();
    let core = start(&w);
    let live = core.connect(w.company).unwrap();
    core.shutdown();
    assert!(live.recv_timeout(Duration::from_millis(100)).is_err());
}
