//! Conservation and exclusivity under concurrent writers.

mod common;

use common::{company, holder, kernel, major, ScriptedCeo};
use holdco::config::KernelConfig;
use holdco::error::KernelError;
use holdco::ledger::{Ledger, Transaction, TransactionKind};
use holdco::orchestrator::Orchestrator;
use holdco::types::{AccountId, Amount, CompanyId, LifecycleState, OwnerId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

#[tokio::test]
async fn test_transactions_built_from_one_snapshot_conflict() {
    let ledger = Ledger::new();
    let a = ledger
        .open_account(OwnerId::Company(CompanyId(1)), major(500_000))
        .await
        .unwrap();
    let b = ledger
        .open_account(OwnerId::Company(CompanyId(2)), Amount::ZERO)
        .await
        .unwrap();
    let snapshot = ledger.accounts(&[a, b]).await.unwrap();

    let first = Transaction::builder(TransactionKind::Transfer)
        .debit(&snapshot[0], major(400_000))
        .credit(&snapshot[1], major(400_000))
        .build();
    let second = Transaction::builder(TransactionKind::Transfer)
        .debit(&snapshot[0], major(400_000))
        .credit(&snapshot[1], major(400_000))
        .build();

    ledger.submit(first).await.unwrap();
    let err = ledger.submit(second).await.unwrap_err();

    assert!(matches!(err, KernelError::Conflict { account, .. } if account == a));
    assert_eq!(ledger.balance(a).await.unwrap(), major(100_000));
    assert_eq!(ledger.balance(b).await.unwrap(), major(400_000));
    assert_eq!(ledger.total_balance().await, major(500_000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_concurrent_transfers_conserve_capital() {
    let ledger = Arc::new(Ledger::new());
    let mut rng = StdRng::seed_from_u64(42);

    let mut accounts: Vec<AccountId> = Vec::new();
    for n in 0..8 {
        let opening = Amount::from_minor(rng.gen_range(0..5_000_000));
        let id = ledger
            .open_account(OwnerId::Company(CompanyId(n)), opening)
            .await
            .unwrap();
        accounts.push(id);
    }
    let initial = ledger.total_balance().await;
    let accounts = Arc::new(accounts);

    let mut handles = Vec::new();
    for worker in 0..16u64 {
        let ledger = ledger.clone();
        let accounts = accounts.clone();
        handles.push(tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(1_000 + worker);
            let mut applied = 0usize;
            for _ in 0..50 {
                let from = accounts[rng.gen_range(0..accounts.len())];
                let to = accounts[rng.gen_range(0..accounts.len())];
                if from == to {
                    continue;
                }
                let snaps = ledger.accounts(&[from, to]).await.unwrap();
                // Sometimes ask for more than is there.
                let ceiling = snaps[0].balance.minor().max(1) * 11 / 10 + 1;
                let amount = Amount::from_minor(rng.gen_range(1..=ceiling));
                let tx = Transaction::builder(TransactionKind::Transfer)
                    .debit(&snaps[0], amount)
                    .credit(&snaps[1], amount)
                    .build();
                match ledger.submit(tx).await {
                    Ok(_) => applied += 1,
                    Err(KernelError::Conflict { .. }) | Err(KernelError::InsufficientFunds { .. }) => {}
                    Err(e) => panic!("unexpected rejection: {}", e),
                }
                tokio::task::yield_now().await;
            }
            applied
        }));
    }

    let mut applied = 0;
    for handle in handles {
        applied += handle.await.unwrap();
    }

    assert_eq!(ledger.total_balance().await, initial);
    assert_eq!(ledger.boundary_net().await, initial);
    ledger.verify().await.unwrap();
    for id in accounts.iter() {
        assert!(!ledger.balance(*id).await.unwrap().is_negative());
    }
    let openings = ledger
        .audit_log()
        .await
        .iter()
        .filter(|r| r.transaction.kind() == TransactionKind::Opening)
        .count();
    assert_eq!(ledger.audit_log().await.len(), openings + applied);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bids_lock_the_target_once() {
    let (kernel, valuation) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;
    let target = company(&kernel, "Target", Amount::ZERO, owners, ScriptedCeo::quiet("t")).await;
    let first = company(&kernel, "First", major(500_000), owners, ScriptedCeo::quiet("a")).await;
    let second = company(&kernel, "Second", major(500_000), owners, ScriptedCeo::quiet("b")).await;
    valuation.set(target, major(100_000)).await;
    valuation.set(first, major(500_000)).await;
    valuation.set(second, major(500_000)).await;

    let (one, two) = {
        let (k1, k2) = (kernel.clone(), kernel.clone());
        let a = tokio::spawn(async move { k1.mna().propose_acquisition(first, target, None).await });
        let b = tokio::spawn(async move { k2.mna().propose_acquisition(second, target, None).await });
        (a.await.unwrap(), b.await.unwrap())
    };

    let (winner, loser) = match (one, two) {
        (Ok(deal), Err(e)) | (Err(e), Ok(deal)) => (deal, e),
        other => panic!("expected exactly one lock, got {:?}", other),
    };
    assert_eq!(loser, KernelError::TargetLocked(target));
    assert_eq!(
        kernel.registry().state_of(target).await.unwrap(),
        LifecycleState::MergeNegotiating
    );

    let deal = kernel.mna().run_deal(winner).await.unwrap();
    assert_eq!(
        kernel.registry().state_of(target).await.unwrap(),
        LifecycleState::Acquired
    );
    assert_eq!(
        kernel.registry().get(target).await.unwrap().cap_table.owners().collect::<Vec<_>>(),
        vec![OwnerId::Company(deal.acquirer)]
    );
    common::assert_invariants(&kernel).await;
}

#[tokio::test]
async fn test_rejected_deal_frees_the_target_for_the_next_bid() {
    let (kernel, valuation) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;
    let target = company(&kernel, "Target", Amount::ZERO, owners, ScriptedCeo::quiet("t")).await;
    let broke = company(&kernel, "Broke", major(10), owners, ScriptedCeo::quiet("a")).await;
    let rich = company(&kernel, "Rich", major(500_000), owners, ScriptedCeo::quiet("b")).await;
    valuation.set(target, major(100_000)).await;
    valuation.set(broke, major(10)).await;
    valuation.set(rich, major(500_000)).await;

    let err = kernel.mna().acquire(broke, target, None).await.unwrap_err();
    assert!(matches!(err, KernelError::Rejected(_)));
    assert_eq!(
        kernel.registry().state_of(target).await.unwrap(),
        LifecycleState::Active
    );

    kernel.mna().acquire(rich, target, None).await.unwrap();
    assert_eq!(kernel.mna().deals().await.len(), 2);
    common::assert_invariants(&kernel).await;
}

/// Reference CEOs on the seeded feed, many ticks: whatever they do, capital
/// is conserved and every cap table stays whole.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reference_portfolio_keeps_invariants_every_tick() {
    let config = KernelConfig {
        liquidation_floor: 50_000.0,
        market_seed: 11,
        ..KernelConfig::default()
    };
    let kernel = Arc::new(Orchestrator::from_config(config));
    let founded = kernel.bootstrap().await.unwrap();
    assert_eq!(founded.len(), 3);

    for _ in 0..40 {
        let report = kernel.tick().await.unwrap();
        assert!(report.failed.is_empty());
        common::assert_invariants(&kernel).await;
        assert!(kernel.registry().live_count().await <= kernel.config().max_companies);
    }

    let snapshot = kernel.view().snapshot(kernel.current_tick()).await.unwrap();
    assert_eq!(snapshot.total_capital, snapshot.boundary_net);
    assert!(snapshot.companies.len() >= 3);
}
