use rust_decimal_macros::dec;
use std::sync::Arc;

use sportsbook::storage::{SqliteStore, Stores};
use sportsbook::types::BetStatus;

use crate::fixtures::World;

async fn sqlite_world() -> World {
    let store = SqliteStore::connect("sqlite::memory:", 1).await.unwrap();
    World::over(Stores::from_backend(Arc::new(store)))
}

#[tokio::test]
async fn test_place_and_settle_on_sqlite() {
    let world = sqlite_world().await;
    let game = world.game().await;
    let x = world.option(&game, "X", dec!(1.5)).await;
    let y = world.option(&game, "Y", dec!(2.0)).await;
    let user = world.user_with(dec!(1000)).await;

    let bet = world.bet(user, &[&x, &y], dec!(100)).await;
    assert_eq!(bet.total_odds.value(), dec!(3.0));
    assert_eq!(world.balance(user).await, dec!(900));

    let report = world.services.settlement.settle_game(game.id, &[x.id, y.id]).await.unwrap();
    assert_eq!(report.bets_won, 1);

    let stored = world.services.bets.get_bet(user, bet.id).await.unwrap();
    assert_eq!(stored.status, BetStatus::Win);
    assert_eq!(stored.slips.len(), 2);
    assert_eq!(world.balance(user).await, dec!(1200.00));
}

#[tokio::test]
async fn test_odds_change_does_not_touch_placed_slips() {
    let world = sqlite_world().await;
    let game = world.game().await;
    let x = world.option(&game, "X", dec!(1.8)).await;
    let user = world.user_with(dec!(100)).await;
    let bet = world.bet(user, &[&x], dec!(10)).await;

    world.services.catalog.update_odds(x.id, dec!(1.2)).await.unwrap();

    let stored = world.services.bets.get_bet(user, bet.id).await.unwrap();
    assert_eq!(stored.slips[0].odds.value(), dec!(1.8));
    assert_eq!(stored.potential_return.amount(), dec!(18));
}
