mod support;

use knot_client::testing::ProviderCall;
use knot_client::{ClientError, SessionManager, SessionState};
use knot_provider::ProviderEvent;
use knot_types::{NetworkId, Session};
use std::rc::Rc;
use support::{ALICE, BOB, run_local, settle, wait_until, wallet};

fn manager(wallet: &Rc<knot_client::testing::FakeWallet>) -> SessionManager {
    SessionManager::new(wallet.clone(), NetworkId::LOCALHOST)
}

fn switch_requests(calls: &[ProviderCall]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, ProviderCall::SwitchNetwork(_)))
        .count()
}

#[tokio::test]
async fn connect_establishes_session() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);

    let session = manager.connect("metaMask").await?;
    assert_eq!(
        session,
        Session::Connected {
            connector: "metaMask".to_owned(),
            account: ALICE,
            network: NetworkId::LOCALHOST,
        }
    );
    assert_eq!(manager.session().account(), Some(ALICE));
    assert_eq!(manager.state().connect_error, None);
    Ok(())
}

#[tokio::test]
async fn connect_while_connected_is_a_noop() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);

    let first = manager.connect("metaMask").await?;
    let second = manager.connect("metaMask").await?;
    assert_eq!(first, second);

    let connects = wallet
        .calls()
        .iter()
        .filter(|call| matches!(call, ProviderCall::Connect(_)))
        .count();
    assert_eq!(connects, 1);
    Ok(())
}

#[tokio::test]
async fn unsupported_connector_never_reaches_the_wallet() {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);

    let err = manager.connect("walletConnect").await.unwrap_err();
    assert_eq!(err, ClientError::ConnectorUnavailable("walletConnect".to_owned()));
    assert!(wallet.calls().is_empty());

    let state = manager.state();
    assert_eq!(state.session, Session::Disconnected);
    assert_eq!(state.connect_error, Some(err));

    let err = manager.connect("ledger").await.unwrap_err();
    assert_eq!(err, ClientError::ConnectorUnavailable("ledger".to_owned()));
}

#[tokio::test]
async fn rejected_connect_is_surfaced_and_retryable() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);

    wallet.set_reject_connect(true);
    let err = manager.connect("metaMask").await.unwrap_err();
    assert_eq!(err, ClientError::UserRejected);
    assert_eq!(manager.state().session, Session::Disconnected);
    assert_eq!(manager.state().connect_error, Some(ClientError::UserRejected));

    wallet.set_reject_connect(false);
    manager.connect("metaMask").await?;
    assert!(manager.session().is_connected());
    assert_eq!(manager.state().connect_error, None);
    Ok(())
}

#[tokio::test]
async fn disconnect_is_idempotent() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);

    manager.disconnect().await;
    assert!(wallet.calls().is_empty());

    manager.connect("metaMask").await?;
    manager.disconnect().await;
    manager.disconnect().await;

    assert_eq!(manager.state(), SessionState::default());
    let disconnects = wallet
        .calls()
        .iter()
        .filter(|call| matches!(call, ProviderCall::Disconnect))
        .count();
    assert_eq!(disconnects, 1);
    Ok(())
}

#[tokio::test]
async fn restore_reuses_prior_authorization_without_prompting() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);

    assert_eq!(manager.restore().await, None);
    assert_eq!(manager.session(), Session::Disconnected);

    wallet.authorize("metaMask");
    let restored = manager.restore().await;
    assert_eq!(restored.as_ref().and_then(Session::account), Some(ALICE));
    assert!(
        !wallet
            .calls()
            .iter()
            .any(|call| matches!(call, ProviderCall::Connect(_)))
    );
    Ok(())
}

#[tokio::test]
async fn ensure_network_on_target_makes_no_request() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);
    manager.connect("metaMask").await?;

    for _ in 0..3 {
        assert!(!manager.ensure_network(NetworkId::LOCALHOST).await?);
    }
    assert_eq!(switch_requests(&wallet.calls()), 0);
    Ok(())
}

#[tokio::test]
async fn ensure_network_switches_when_mismatched() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);
    manager.connect("metaMask").await?;

    manager.handle_event(&ProviderEvent::ChainChanged(NetworkId(4)));
    assert!(manager.state().network_mismatch(NetworkId::LOCALHOST));

    assert!(manager.ensure_network(NetworkId::LOCALHOST).await?);
    assert_eq!(manager.session().network(), Some(NetworkId::LOCALHOST));
    assert!(!manager.state().network_mismatch(NetworkId::LOCALHOST));
    assert_eq!(wallet.calls().last(), Some(&ProviderCall::SwitchNetwork(NetworkId::LOCALHOST)));
    Ok(())
}

#[tokio::test]
async fn rejected_switch_keeps_session_on_wrong_network() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);
    manager.connect("metaMask").await?;
    manager.handle_event(&ProviderEvent::ChainChanged(NetworkId(4)));

    wallet.set_reject_switch(true);
    let err = manager.ensure_network(NetworkId::LOCALHOST).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::SwitchRejected {
            network: NetworkId::LOCALHOST,
            reason: "rejected by the user".to_owned(),
        }
    );

    let state = manager.state();
    assert!(state.session.is_connected());
    assert_eq!(state.session.network(), Some(NetworkId(4)));
    assert_eq!(state.switch_error, Some(err));

    // The wallet moving back on its own clears the message.
    manager.handle_event(&ProviderEvent::ChainChanged(NetworkId::LOCALHOST));
    assert_eq!(manager.state().switch_error, None);
    Ok(())
}

#[tokio::test]
async fn unconfigured_target_network_is_reported() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = SessionManager::new(wallet.clone(), NetworkId(31337));
    manager.connect("metaMask").await?;

    let err = manager.ensure_network(NetworkId(31337)).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::SwitchRejected {
            network: NetworkId(31337),
            reason: "network is not configured in the wallet".to_owned(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn wallet_events_update_the_session() -> anyhow::Result<()> {
    let wallet = wallet(ALICE);
    let manager = manager(&wallet);
    let mut updates = manager.subscribe();

    // Ignored while disconnected.
    manager.handle_event(&ProviderEvent::AccountsChanged(Some(BOB)));
    assert!(!updates.has_changed()?);

    manager.connect("metaMask").await?;
    manager.handle_event(&ProviderEvent::AccountsChanged(Some(BOB)));
    assert_eq!(manager.session().account(), Some(BOB));

    updates.borrow_and_update();
    manager.handle_event(&ProviderEvent::AccountsChanged(Some(BOB)));
    assert!(!updates.has_changed()?);

    manager.handle_event(&ProviderEvent::AccountsChanged(None));
    assert_eq!(manager.session(), Session::Disconnected);
    assert_eq!(manager.session().account(), None);
    Ok(())
}

#[tokio::test]
async fn network_guard_corrects_each_mismatch_once() -> anyhow::Result<()> {
    run_local(async {
        let wallet = wallet(ALICE);
        wallet.add_network(NetworkId(4));
        let manager = Rc::new(manager(&wallet));
        tokio::task::spawn_local(Rc::clone(&manager).guard_network());

        manager.connect("metaMask").await?;
        manager.handle_event(&ProviderEvent::ChainChanged(NetworkId(4)));

        let mut updates = manager.subscribe();
        wait_until(&mut updates, |state| {
            state.session.network() == Some(NetworkId::LOCALHOST)
        })
        .await?;
        assert_eq!(switch_requests(&wallet.calls()), 1);

        wallet.set_reject_switch(true);
        manager.handle_event(&ProviderEvent::ChainChanged(NetworkId(4)));
        wait_until(&mut updates, |state| state.switch_error.is_some()).await?;
        settle().await;
        assert_eq!(switch_requests(&wallet.calls()), 2);
        assert_eq!(manager.session().network(), Some(NetworkId(4)));

        manager.handle_event(&ProviderEvent::ChainChanged(NetworkId(5)));
        settle().await;
        assert_eq!(switch_requests(&wallet.calls()), 3);
        Ok::<_, anyhow::Error>(())
    })
    .await
}
