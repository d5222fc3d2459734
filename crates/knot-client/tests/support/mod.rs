#![allow(dead_code)]

use alloy_primitives::{Address, U256, address};
use knot_client::testing::{FakeContract, FakeWallet};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::LocalSet;

pub const CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const OWNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const ALICE: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const BOB: Address = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

/// 0.1 ether.
pub const PRICE: U256 = U256::from_limbs([100_000_000_000_000_000, 0, 0, 0]);

pub fn wallet(account: Address) -> Rc<FakeWallet> {
    Rc::new(FakeWallet::new(
        CONTRACT,
        account,
        FakeContract::new(OWNER, 10, PRICE),
    ))
}

pub async fn run_local<F>(test: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    LocalSet::new().run_until(test).await
}

/// Wait for `rx` to hold a value matching `predicate`, failing after two
/// seconds.
pub async fn wait_until<T: Clone>(
    rx: &mut watch::Receiver<T>,
    predicate: impl FnMut(&T) -> bool,
) -> anyhow::Result<T> {
    let value = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate)).await??;
    Ok(T::clone(&value))
}

/// Let spawned local tasks run until they are all parked.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
