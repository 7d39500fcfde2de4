use async_trait::async_trait;
use mockall::mock;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use sportsbook::config::BettingConfig;
use sportsbook::engine::placement::PlaceBet;
use sportsbook::engine::Services;
use sportsbook::storage::{BetStore, Stores};
use sportsbook::types::{
    Bet, BetType, Page, Payout, SportsbookError, SportsbookResult, TransactionType,
};

use crate::fixtures::World;

mock! {
    pub Bets {}

    #[async_trait]
    impl BetStore for Bets {
        async fn create(&self, bet: &Bet) -> SportsbookResult<()>;
        async fn save(&self, bet: &Bet) -> SportsbookResult<()>;
        async fn find_by_id(&self, id: Uuid) -> SportsbookResult<Option<Bet>>;
        async fn find_by_user_id(&self, user_id: Uuid) -> SportsbookResult<Vec<Bet>>;
        async fn find_by_game_id(&self, game_id: Uuid) -> SportsbookResult<Vec<Bet>>;
        async fn settle(&self, bet: &Bet, payout: Option<Payout>) -> SportsbookResult<bool>;
    }
}

#[tokio::test]
async fn test_single_bet_debits_stake() {
    let world = World::in_memory();
    let game = world.game().await;
    let home = world.option(&game, "North", dec!(1.8)).await;
    let user = world.user_with(dec!(1000)).await;

    let bet = world.bet(user, &[&home], dec!(200)).await;

    assert_eq!(bet.total_odds.value(), dec!(1.8));
    assert_eq!(bet.potential_return.amount(), dec!(360.00));
    assert_eq!(world.balance(user).await, dec!(800.00));
    assert_eq!(world.services.bets.bets_for_user(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_combo_total_odds_are_exact_product() {
    let world = World::in_memory();
    let game = world.game().await;
    let legs = [
        world.option(&game, "a", dec!(1.1)).await,
        world.option(&game, "b", dec!(1.1)).await,
        world.option(&game, "c", dec!(1.1)).await,
    ];
    let user = world.user_with(dec!(1000)).await;

    let bet = world.bet(user, &[&legs[0], &legs[1], &legs[2]], dec!(1000)).await;

    assert_eq!(bet.total_odds.value(), dec!(1.331));
    assert_eq!(bet.potential_return.amount(), dec!(1331));
    assert_eq!(world.balance(user).await, dec!(0));
}

#[tokio::test]
async fn test_deactivated_option_cannot_be_bet() {
    let world = World::in_memory();
    let game = world.game().await;
    let home = world.option(&game, "North", dec!(1.8)).await;
    world.services.catalog.deactivate(home.id).await.unwrap();
    let user = world.user_with(dec!(100)).await;

    let err = world
        .services
        .bets
        .place_bet(PlaceBet { user_id: user, selections: vec![home.id], amount: dec!(10), bet_type: BetType::Single })
        .await
        .unwrap_err();

    assert!(matches!(err, SportsbookError::Validation(_)));
    assert_eq!(world.balance(user).await, dec!(100));
}

#[tokio::test]
async fn test_concurrent_bets_never_overdraw() {
    let world = Arc::new(World::in_memory());
    let game = world.game().await;
    let home = world.option(&game, "North", dec!(2)).await;
    let user = world.user_with(dec!(100)).await;

    let mut handles = Vec::new();
    for _ in 0..6 {
        let world = world.clone();
        let option_id = home.id;
        handles.push(tokio::spawn(async move {
            world
                .services
                .bets
                .place_bet(PlaceBet { user_id: user, selections: vec![option_id], amount: dec!(25), bet_type: BetType::Single })
                .await
        }));
    }
    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            placed += 1;
        }
    }

    assert_eq!(placed, 4);
    assert_eq!(world.balance(user).await, dec!(0));
}

#[tokio::test]
async fn test_failed_persist_is_refunded() {
    let stores = Stores::in_memory();
    let mut bets = MockBets::new();
    bets.expect_create()
        .returning(|_| Err(SportsbookError::Storage("constraint failed".into())));
    bets.expect_find_by_user_id().returning(|_| Ok(Vec::new()));

    let failing = Stores { bets: Arc::new(bets), ..stores.clone() };
    let world = World {
        services: Services::new(failing.clone(), &BettingConfig::default()),
        stores: failing,
    };
    let game = world.game().await;
    let home = world.option(&game, "North", dec!(3)).await;
    let user = world.user_with(dec!(60)).await;

    let err = world
        .services
        .bets
        .place_bet(PlaceBet { user_id: user, selections: vec![home.id], amount: dec!(60), bet_type: BetType::Single })
        .await
        .unwrap_err();

    assert!(matches!(err, SportsbookError::Storage(_)));
    assert_eq!(world.balance(user).await, dec!(60));
    assert!(world.services.bets.bets_for_user(user).await.unwrap().is_empty());

    let journal = world.services.ledger.transactions(user, Page::default()).await.unwrap();
    let kinds: Vec<TransactionType> = journal.items.iter().map(|t| t.transaction_type).collect();
    assert_eq!(kinds, vec![TransactionType::Refund, TransactionType::Bet, TransactionType::Deposit]);
}
