//! End-to-end kernel scenarios driven through scheduler ticks.

mod common;

use common::{cash, company, holder, kernel, major, ScriptedCeo};
use holdco::error::KernelError;
use holdco::orchestrator::Effect;
use holdco::types::{
    Amount, Fraction, LifecycleState, OwnerId, PositionChange, ProposalKind, ProposalPayload, Venue,
};

#[tokio::test]
async fn test_replication_splits_capital_and_equity() {
    let (kernel, _) = kernel(common::config());
    let founder = holder(&kernel, "Founder").await;
    let ceo = ScriptedCeo::new("parent")
        .then(vec![ProposalPayload::Replicate {
            seed: major(300_000),
        }])
        .build();
    let parent = company(&kernel, "Parent", major(1_000_000), founder, ceo).await;

    let report = kernel.tick().await.unwrap();

    let clone_id = match &report.outcomes[0].result {
        Ok(Effect::Replicated { clone, seed }) => {
            assert_eq!(*seed, major(300_000));
            *clone
        }
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(cash(&kernel, OwnerId::Company(parent)).await, major(700_000));
    assert_eq!(cash(&kernel, OwnerId::Company(clone_id)).await, major(300_000));

    let clone = kernel.registry().get(clone_id).await.unwrap();
    assert_eq!(clone.state, LifecycleState::Forming);
    assert_eq!(clone.parent, Some(parent));
    assert_eq!(
        clone.cap_table.stake_of(OwnerId::Company(parent)),
        Fraction::from_f64(0.6).unwrap()
    );
    assert_eq!(
        clone.cap_table.stake_of(OwnerId::Holder(founder)),
        Fraction::from_f64(0.4).unwrap()
    );
    assert!(kernel.has_loop(clone_id).await);
    common::assert_invariants(&kernel).await;

    // The clone's first successful activation promotes it.
    let report = kernel.tick().await.unwrap();
    assert_eq!(report.promoted, vec![clone_id]);
    assert_eq!(
        kernel.registry().state_of(clone_id).await.unwrap(),
        LifecycleState::Active
    );
}

#[tokio::test]
async fn test_replication_below_reserve_changes_nothing() {
    let (kernel, _) = kernel(common::config());
    let founder = holder(&kernel, "Founder").await;
    let ceo = ScriptedCeo::new("parent")
        .then(vec![ProposalPayload::Replicate {
            seed: major(300_000),
        }])
        .build();
    let parent = company(&kernel, "Parent", major(350_000), founder, ceo).await;

    let report = kernel.tick().await.unwrap();

    assert!(matches!(
        report.outcomes[0].result,
        Err(KernelError::InsufficientFunds { .. })
    ));
    assert_eq!(cash(&kernel, OwnerId::Company(parent)).await, major(350_000));
    assert_eq!(kernel.registry().list().await.len(), 1);
    assert_eq!(
        kernel.registry().state_of(parent).await.unwrap(),
        LifecycleState::Active
    );
    common::assert_invariants(&kernel).await;
}

#[tokio::test]
async fn test_acquisition_pays_stakeholders_and_transfers_equity() {
    let (kernel, valuation) = kernel(common::config());
    let owner_a = holder(&kernel, "A owners").await;
    let seller = holder(&kernel, "S").await;

    let target = company(&kernel, "Target", Amount::ZERO, seller, ScriptedCeo::quiet("t")).await;
    let ceo = ScriptedCeo::new("acquirer")
        .then(vec![ProposalPayload::OfferAcquisition { target }])
        .build();
    let acquirer = company(&kernel, "Acquirer", major(500_000), owner_a, ceo).await;
    valuation.set(acquirer, major(500_000)).await;
    valuation.set(target, major(400_000)).await;

    let report = kernel.tick().await.unwrap();

    assert!(matches!(
        report.outcomes[0].result,
        Ok(Effect::Acquired {
            terminal: LifecycleState::Acquired,
            ..
        })
    ));
    assert_eq!(cash(&kernel, OwnerId::Company(acquirer)).await, major(100_000));
    assert_eq!(cash(&kernel, OwnerId::Holder(seller)).await, major(400_000));
    assert_eq!(
        kernel.registry().state_of(target).await.unwrap(),
        LifecycleState::Acquired
    );
    assert_eq!(
        kernel
            .registry()
            .holdings_of(OwnerId::Company(acquirer))
            .await,
        vec![(target, Fraction::ONE)]
    );
    assert!(!kernel.has_loop(target).await);
    common::assert_invariants(&kernel).await;
}

#[tokio::test]
async fn test_listed_company_is_merged() {
    let (kernel, valuation) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;

    let seller_ceo = ScriptedCeo::new("seller")
        .then(vec![ProposalPayload::SeekAcquirer])
        .build();
    let target = company(&kernel, "Seller", major(50_000), owners, seller_ceo).await;
    let buyer_ceo = ScriptedCeo::new("buyer")
        .then(vec![])
        .then(vec![ProposalPayload::OfferAcquisition { target }])
        .build();
    let buyer = company(&kernel, "Buyer", major(900_000), owners, buyer_ceo).await;
    valuation.set(buyer, major(900_000)).await;
    valuation.set(target, major(50_000)).await;

    let first = kernel.tick().await.unwrap();
    assert!(matches!(first.outcomes[0].result, Ok(Effect::Listed)));
    assert!(kernel.registry().get(target).await.unwrap().listed);

    let second = kernel.tick().await.unwrap();
    assert!(second.outcomes[0].applied());
    let merged = kernel.registry().get(target).await.unwrap();
    assert_eq!(merged.state, LifecycleState::Merged);
    assert!(!merged.listed);
    common::assert_invariants(&kernel).await;
}

#[tokio::test]
async fn test_property_is_bought_then_sold() {
    let (kernel, _) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;
    let ceo = ScriptedCeo::new("realty")
        .then(vec![ProposalPayload::Invest {
            change: PositionChange {
                venue: Venue::RealEstate,
                capital_delta: major(-400_000),
                exposure_delta: major(400_000),
            },
        }])
        .then(vec![ProposalPayload::SellProperty {
            change: PositionChange {
                venue: Venue::RealEstate,
                capital_delta: major(432_000),
                exposure_delta: major(-400_000),
            },
        }])
        .build();
    let id = company(&kernel, "Realty", major(1_000_000), owners, ceo).await;

    kernel.tick().await.unwrap();
    assert_eq!(cash(&kernel, OwnerId::Company(id)).await, major(600_000));
    assert_eq!(
        kernel.registry().get(id).await.unwrap().book.real_estate,
        major(400_000)
    );

    kernel.tick().await.unwrap();
    assert_eq!(cash(&kernel, OwnerId::Company(id)).await, major(1_032_000));
    assert!(kernel.registry().get(id).await.unwrap().book.real_estate.is_zero());
    common::assert_invariants(&kernel).await;
}

#[tokio::test]
async fn test_selling_more_than_booked_is_rejected() {
    let (kernel, _) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;
    let ceo = ScriptedCeo::new("realty")
        .then(vec![ProposalPayload::SellProperty {
            change: PositionChange {
                venue: Venue::RealEstate,
                capital_delta: major(10_000),
                exposure_delta: major(-10_000),
            },
        }])
        .build();
    let id = company(&kernel, "Realty", major(1_000), owners, ceo).await;

    let report = kernel.tick().await.unwrap();

    assert!(matches!(report.outcomes[0].result, Err(KernelError::Rejected(_))));
    assert_eq!(cash(&kernel, OwnerId::Company(id)).await, major(1_000));
}

fn position(venue: Venue, capital: i64, exposure: i64) -> PositionChange {
    PositionChange {
        venue,
        capital_delta: major(capital),
        exposure_delta: major(exposure),
    }
}

#[tokio::test]
async fn test_exposure_must_be_paid_for() {
    let (kernel, _) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;
    let ceo = ScriptedCeo::new("inflater")
        .then(vec![
            ProposalPayload::Invest {
                change: position(Venue::Trading, 0, 10_000_000),
            },
            ProposalPayload::Invest {
                change: position(Venue::RealEstate, -100, 200),
            },
            ProposalPayload::Trade {
                change: position(Venue::Trading, 500, 500),
            },
        ])
        .build();
    let id = company(&kernel, "Inflater", major(10), owners, ceo).await;

    let report = kernel.tick().await.unwrap();

    assert_eq!(report.outcomes.len(), 3);
    for outcome in &report.outcomes {
        assert!(matches!(outcome.result, Err(KernelError::Rejected(_))));
    }
    let record = kernel.registry().get(id).await.unwrap();
    assert!(record.book.total().is_zero());
    assert_eq!(cash(&kernel, OwnerId::Company(id)).await, major(10));
    common::assert_invariants(&kernel).await;
}

#[tokio::test]
async fn test_paid_trade_exposure_is_booked() {
    let (kernel, _) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;
    let ceo = ScriptedCeo::new("trader")
        .then(vec![ProposalPayload::Trade {
            change: position(Venue::Trading, -400, 400),
        }])
        .build();
    let id = company(&kernel, "Trader", major(1_000), owners, ceo).await;

    let report = kernel.tick().await.unwrap();

    assert!(report.outcomes[0].applied());
    assert_eq!(kernel.registry().get(id).await.unwrap().book.trading, major(400));
    assert_eq!(cash(&kernel, OwnerId::Company(id)).await, major(600));
}

#[tokio::test]
async fn test_trading_loss_cannot_overdraw() {
    let (kernel, _) = kernel(common::config());
    let owners = holder(&kernel, "owners").await;
    let ceo = ScriptedCeo::new("trader")
        .then(vec![ProposalPayload::Trade {
            change: PositionChange {
                venue: Venue::Trading,
                capital_delta: major(-2_000),
                exposure_delta: Amount::ZERO,
            },
        }])
        .build();
    let id = company(&kernel, "Trader", major(1_000), owners, ceo).await;

    let report = kernel.tick().await.unwrap();

    assert_eq!(report.outcomes[0].kind, ProposalKind::Trade);
    assert!(matches!(
        report.outcomes[0].result,
        Err(KernelError::InsufficientFunds { .. })
    ));
    assert_eq!(cash(&kernel, OwnerId::Company(id)).await, major(1_000));
}

#[tokio::test]
async fn test_liquidation_pays_out_pro_rata_with_residue_to_largest_holder() {
    let (kernel, _) = kernel(common::config());
    let first = holder(&kernel, "first").await;
    let second = holder(&kernel, "second").await;
    let half = Fraction::from_f64(0.5).unwrap();
    let cap_table = holdco::company::CapTable::from_stakes([
        (OwnerId::Holder(first), half),
        (OwnerId::Holder(second), half),
    ])
    .unwrap();
    let ceo = ScriptedCeo::new("closer")
        .then(vec![ProposalPayload::Liquidate])
        .build();
    let id = kernel
        .found_company("Closing", Amount::from_minor(100_001), cap_table, ceo)
        .await
        .unwrap();

    let report = kernel.tick().await.unwrap();

    assert!(matches!(
        report.outcomes[0].result,
        Ok(Effect::Liquidated { paid_out }) if paid_out == Amount::from_minor(100_001)
    ));
    assert_eq!(cash(&kernel, OwnerId::Holder(first)).await, Amount::from_minor(50_001));
    assert_eq!(cash(&kernel, OwnerId::Holder(second)).await, Amount::from_minor(50_000));
    assert_eq!(cash(&kernel, OwnerId::Company(id)).await, Amount::ZERO);
    assert_eq!(
        kernel.registry().state_of(id).await.unwrap(),
        LifecycleState::Liquidated
    );
    assert!(!kernel.has_loop(id).await);

    // Terminal companies are no longer scheduled.
    let next = kernel.tick().await.unwrap();
    assert!(next.activated.is_empty());
    common::assert_invariants(&kernel).await;
}

#[tokio::test]
async fn test_companies_below_floor_are_liquidated() {
    let config = holdco::config::KernelConfig {
        liquidation_floor: 1_000.0,
        ..common::config()
    };
    let (kernel, _) = kernel(config);
    let owners = holder(&kernel, "owners").await;
    let poor = company(&kernel, "Poor", major(500), owners, ScriptedCeo::quiet("p")).await;
    let rich = company(&kernel, "Rich", major(5_000), owners, ScriptedCeo::quiet("r")).await;

    let report = kernel.tick().await.unwrap();

    assert_eq!(report.liquidated, vec![poor]);
    assert_eq!(cash(&kernel, OwnerId::Holder(owners)).await, major(500));
    assert_eq!(
        kernel.registry().state_of(rich).await.unwrap(),
        LifecycleState::Active
    );
    common::assert_invariants(&kernel).await;
}
