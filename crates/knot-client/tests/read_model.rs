mod support;

use alloy_primitives::U256;
use knot_client::contract::Contract;
use knot_client::testing::{FakeWallet, ProviderCall};
use knot_client::{ReadModel, SessionState};
use knot_types::{Fact, NetworkId, Session, Snapshot};
use std::rc::Rc;
use support::{ALICE, BOB, CONTRACT, OWNER, PRICE, run_local, wait_until, wallet};
use tokio::sync::watch;

fn read_model(wallet: &Rc<FakeWallet>) -> Rc<ReadModel> {
    Rc::new(ReadModel::new(wallet.clone(), Contract::new(CONTRACT)))
}

fn connected(account: alloy_primitives::Address) -> SessionState {
    SessionState {
        session: Session::Connected {
            connector: "metaMask".to_owned(),
            account,
            network: NetworkId::LOCALHOST,
        },
        ..SessionState::default()
    }
}

fn reads(wallet: &FakeWallet) -> usize {
    wallet
        .calls()
        .iter()
        .filter(|call| matches!(call, ProviderCall::Call(_)))
        .count()
}

#[test]
fn facts_are_unknown_until_loaded() {
    let wallet = wallet(ALICE);
    let model = read_model(&wallet);
    assert_eq!(model.snapshot(), Snapshot::default());
    assert_eq!(model.account(), None);
    assert_eq!(reads(&wallet), 0);
}

#[tokio::test]
async fn load_reads_every_fact_for_the_account() {
    let wallet = wallet(ALICE);
    wallet.contract().whitelist.insert(ALICE);
    wallet.contract().total_supply = 3;
    let model = read_model(&wallet);

    model.set_account(Some(ALICE)).await;
    model.load().await;

    let snapshot = model.snapshot();
    assert_eq!(snapshot.total_supply, Some(U256::from(3)));
    assert_eq!(snapshot.max_mint_count, Some(U256::from(10)));
    assert_eq!(snapshot.mintable_count, Some(U256::from(7)));
    assert_eq!(snapshot.account_balance, Some(U256::ZERO));
    assert_eq!(snapshot.sell_price, Some(PRICE));
    assert_eq!(snapshot.owner, Some(OWNER));
    assert_eq!(snapshot.account_whitelisted, Some(true));
}

#[tokio::test]
async fn account_scoped_facts_are_not_queried_without_an_account() {
    let wallet = wallet(ALICE);
    let model = read_model(&wallet);

    model.load().await;
    assert_eq!(reads(&wallet), Fact::ALL.len() - 2);

    let snapshot = model.snapshot();
    assert_eq!(snapshot.account_balance, None);
    assert_eq!(snapshot.account_whitelisted, None);
    assert!(snapshot.is_loaded(Fact::TotalSupply));
}

#[tokio::test]
async fn clearing_the_account_drops_its_values() {
    let wallet = wallet(ALICE);
    wallet.contract().whitelist.insert(ALICE);
    wallet.contract().balances.insert(ALICE, 2);
    let model = read_model(&wallet);

    model.set_account(Some(ALICE)).await;
    assert_eq!(model.snapshot().account_balance, Some(U256::from(2)));
    assert_eq!(model.snapshot().account_whitelisted, Some(true));

    wallet.clear_calls();
    model.set_account(None).await;
    assert_eq!(reads(&wallet), 0);
    assert_eq!(model.snapshot().account_balance, None);
    assert_eq!(model.snapshot().account_whitelisted, None);

    // Refreshing a scoped fact without an account keeps it absent.
    assert!(!model.refresh(Fact::AccountBalance).await);
    assert_eq!(model.snapshot().account_balance, None);
}

#[tokio::test]
async fn switching_accounts_never_shows_the_previous_value() {
    let wallet = wallet(ALICE);
    wallet.contract().whitelist.insert(ALICE);
    let model = read_model(&wallet);
    let mut updates = model.subscribe();

    model.set_account(Some(ALICE)).await;
    assert_eq!(model.snapshot().account_whitelisted, Some(true));

    updates.borrow_and_update();
    wallet.set_fail_calls(true);
    model.set_account(Some(BOB)).await;

    // The new account's reads failed: unknown, not Alice's answer.
    assert!(updates.has_changed().unwrap());
    assert_eq!(model.account(), Some(BOB));
    assert_eq!(model.snapshot().account_whitelisted, None);
    assert_eq!(model.snapshot().account_balance, None);
}

#[tokio::test]
async fn failed_reads_keep_the_stale_value() {
    let wallet = wallet(ALICE);
    let model = read_model(&wallet);
    model.load().await;
    assert_eq!(model.snapshot().total_supply, Some(U256::ZERO));

    wallet.set_fail_calls(true);
    wallet.contract().total_supply = 4;
    assert!(!model.refresh(Fact::TotalSupply).await);
    assert_eq!(model.snapshot().total_supply, Some(U256::ZERO));

    wallet.set_fail_calls(false);
    assert!(model.refresh(Fact::TotalSupply).await);
    assert_eq!(model.snapshot().total_supply, Some(U256::from(4)));
}

#[tokio::test]
async fn unchanged_reads_do_not_notify() {
    let wallet = wallet(ALICE);
    let model = read_model(&wallet);
    model.load().await;

    let updates = model.subscribe();
    assert!(!model.refresh(Fact::TotalSupply).await);
    assert!(!updates.has_changed().unwrap());
}

#[tokio::test]
async fn new_blocks_refresh_watched_facts_only() {
    let wallet = wallet(ALICE);
    let model = read_model(&wallet);
    model.set_account(Some(ALICE)).await;
    model.load().await;

    {
        let mut contract = wallet.contract();
        contract.total_supply = 2;
        contract.balances.insert(ALICE, 1);
        contract.sell_price = U256::from(1);
        contract.max_mint_count = 50;
    }
    model.on_new_block(2).await;

    let snapshot = model.snapshot();
    assert_eq!(snapshot.total_supply, Some(U256::from(2)));
    assert_eq!(snapshot.account_balance, Some(U256::from(1)));
    assert_eq!(snapshot.mintable_count, Some(U256::from(48)));
    // Read once and cached.
    assert_eq!(snapshot.sell_price, Some(PRICE));
    assert_eq!(snapshot.max_mint_count, Some(U256::from(10)));
}

#[tokio::test]
async fn new_blocks_retry_facts_that_never_loaded() {
    let wallet = wallet(ALICE);
    let model = read_model(&wallet);

    wallet.set_fail_calls(true);
    model.load().await;
    assert_eq!(model.snapshot(), Snapshot::default());

    wallet.set_fail_calls(false);
    model.on_new_block(2).await;
    assert_eq!(model.snapshot().sell_price, Some(PRICE));
    assert_eq!(model.snapshot().owner, Some(OWNER));
}

#[tokio::test]
async fn run_follows_blocks_and_session() -> anyhow::Result<()> {
    run_local(async {
        let wallet = wallet(ALICE);
        wallet.contract().whitelist.insert(BOB);
        let model = read_model(&wallet);
        let heads = watch::channel(1u64).0;
        let session = watch::channel(connected(ALICE)).0;
        tokio::task::spawn_local(Rc::clone(&model).run(heads.subscribe(), session.subscribe()));

        let mut updates = model.subscribe();
        wait_until(&mut updates, |snapshot| {
            snapshot.owner.is_some() && snapshot.account_whitelisted == Some(false)
        })
        .await?;

        wallet.contract().total_supply = 1;
        heads.send_replace(2);
        wait_until(&mut updates, |snapshot| snapshot.total_supply == Some(U256::from(1))).await?;

        session.send_replace(connected(BOB));
        wait_until(&mut updates, |snapshot| snapshot.account_whitelisted == Some(true)).await?;
        assert_eq!(model.account(), Some(BOB));

        session.send_replace(SessionState::default());
        let snapshot = wait_until(&mut updates, |snapshot| snapshot.account_whitelisted.is_none()).await?;
        assert_eq!(snapshot.account_balance, None);
        assert_eq!(snapshot.total_supply, Some(U256::from(1)));
        Ok::<_, anyhow::Error>(())
    })
    .await
}
