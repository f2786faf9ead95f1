//! Account lifecycle: login, restore-on-startup, pause/re-login, logout.

use super::test_utils::*;
use followlog::error::{EngineError, SourceError};
use followlog::journal::{EventFilter, EventKind};
use followlog::types::{AccountId, Relation};

#[tokio::test]
async fn test_restore_after_restart_serves_persisted_state() {
    let h = harness();
    h.source
        .set_members(Relation::Followers, vec![member(1), member(2)]);
    h.api.login(ACCOUNT, &credentials()).await.unwrap();
    let events_before = h.api.events(ACCOUNT, EventFilter::default()).unwrap();

    let h = reopen(h);
    assert_eq!(h.api.restore_accounts().await.unwrap(), 1);

    let followers = h.api.members(ACCOUNT, Relation::Followers).unwrap();
    assert_eq!(sorted_ids(&followers), vec![1, 2]);
    assert_eq!(
        h.api.events(ACCOUNT, EventFilter::default()).unwrap(),
        events_before
    );
}

#[tokio::test]
async fn test_restore_with_invalid_session_pauses_account() {
    let h = harness();
    h.source.set_members(Relation::Followers, vec![member(1)]);
    h.api.login(ACCOUNT, &credentials()).await.unwrap();

    h.source.set_session_valid(false);
    let h = reopen(h);
    h.api.restore_accounts().await.unwrap();

    // Queries still serve persisted state.
    assert_eq!(
        sorted_ids(&h.api.members(ACCOUNT, Relation::Followers).unwrap()),
        vec![1]
    );
    // But reconciliation is paused until re-login.
    let err = h.api.trigger_reconcile(ACCOUNT).await.unwrap_err();
    assert!(matches!(err, EngineError::AccountPaused(_)));
}

#[tokio::test]
async fn test_relogin_resumes_paused_account() {
    let h = harness();
    h.source.set_members(Relation::Followers, vec![member(1)]);
    h.api.login(ACCOUNT, &credentials()).await.unwrap();

    // A terminal failure mid-cycle pauses the account.
    h.source
        .fail_next_list(SourceError::Terminal("session revoked".into()));
    h.api.trigger_reconcile(ACCOUNT).await.unwrap_err();
    let err = h.api.trigger_reconcile(ACCOUNT).await.unwrap_err();
    assert!(matches!(err, EngineError::AccountPaused(_)));

    h.api.relogin(ACCOUNT, &credentials()).await.unwrap();
    h.api.trigger_reconcile(ACCOUNT).await.unwrap();
}

#[tokio::test]
async fn test_rejected_credentials_surface_terminal_error() {
    let h = harness();
    h.source.set_reject_auth(true);
    let err = h.api.login(ACCOUNT, &credentials()).await.unwrap_err();
    assert!(matches!(err, EngineError::Source(SourceError::Terminal(_))));
    // Failed login leaves nothing registered.
    assert!(matches!(
        h.api.members(ACCOUNT, Relation::Followers),
        Err(EngineError::UnknownAccount(_))
    ));
}

#[tokio::test]
async fn test_double_login_rejected() {
    let h = harness();
    h.api.login(ACCOUNT, &credentials()).await.unwrap();
    let err = h.api.login(ACCOUNT, &credentials()).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRegistered(_)));
}

#[tokio::test]
async fn test_logout_removes_all_persisted_state() {
    let h = harness();
    h.source.set_members(Relation::Followers, vec![member(1)]);
    h.api.login(ACCOUNT, &credentials()).await.unwrap();

    h.api.logout(ACCOUNT).await.unwrap();
    assert!(matches!(
        h.api.members(ACCOUNT, Relation::Followers),
        Err(EngineError::UnknownAccount(_))
    ));

    // Nothing to restore after a restart.
    let h = reopen(h);
    assert_eq!(h.api.restore_accounts().await.unwrap(), 0);
}

#[tokio::test]
async fn test_logout_waits_for_in_flight_cycle() {
    let h = harness();
    h.source.set_members(Relation::Followers, vec![member(1)]);
    h.api.login(ACCOUNT, &credentials()).await.unwrap();

    // A cycle is in flight, blocked inside its fetch with the gate held.
    h.source
        .set_members(Relation::Followers, vec![member(1), member(2)]);
    let (entered, release) = h.source.block_next_list();
    let reconciler = h.api.reconciler();
    let context = h.api.registry().get(ACCOUNT).unwrap();
    let cycle = tokio::spawn(async move { reconciler.reconcile(&context).await });
    entered.notified().await;

    // Logout must wait for that cycle; its persist lands before the wipe.
    {
        let logout = h.api.logout(ACCOUNT);
        tokio::pin!(logout);
        assert!(futures::poll!(logout.as_mut()).is_pending());
        release.notify_one();
        cycle.await.unwrap().unwrap();
        logout.await.unwrap();
    }

    // Nothing survives the wipe: no restorable account, and a fresh login
    // starts from an empty history with a full bootstrap burst.
    let h = reopen(h);
    assert_eq!(h.api.restore_accounts().await.unwrap(), 0);
    h.api.login(ACCOUNT, &credentials()).await.unwrap();
    let events = h.api.events(ACCOUNT, EventFilter::default()).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.kind == EventKind::Gained));
}

#[tokio::test]
async fn test_accounts_are_isolated() {
    let h = harness();
    h.source.set_members(Relation::Followers, vec![member(1)]);
    h.api.login(AccountId(1), &credentials()).await.unwrap();

    h.source.set_members(Relation::Followers, vec![member(2)]);
    h.api.login(AccountId(2), &credentials()).await.unwrap();

    // Logging account 2 out leaves account 1's state untouched.
    h.api.logout(AccountId(2)).await.unwrap();
    assert_eq!(
        sorted_ids(&h.api.members(AccountId(1), Relation::Followers).unwrap()),
        vec![1]
    );

    let h = reopen(h);
    assert_eq!(h.api.restore_accounts().await.unwrap(), 1);
}
