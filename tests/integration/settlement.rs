use rust_decimal_macros::dec;

use sportsbook::types::{BetStatus, Page, SlipResult, TransactionType};

use crate::fixtures::World;

#[tokio::test]
async fn test_settlement_pays_only_full_combos() {
    let world = World::in_memory();
    let game = world.game().await;
    let x = world.option(&game, "X", dec!(1.5)).await;
    let y = world.option(&game, "Y", dec!(2.0)).await;
    let z = world.option(&game, "Z", dec!(4.0)).await;

    let a_user = world.user_with(dec!(100)).await;
    let b_user = world.user_with(dec!(100)).await;
    let a = world.bet(a_user, &[&x, &y], dec!(100)).await;
    let b = world.bet(b_user, &[&x, &z], dec!(100)).await;

    let report = world.services.settlement.settle_game(game.id, &[x.id, y.id]).await.unwrap();
    assert_eq!(report.bets_settled, 2);
    assert_eq!(report.total_paid.amount(), dec!(300.00));

    let a = world.services.bets.get_bet(a_user, a.id).await.unwrap();
    let b = world.services.bets.get_bet(b_user, b.id).await.unwrap();
    assert_eq!(a.status, BetStatus::Win);
    assert!(a.slips.iter().all(|s| s.result == SlipResult::Win));
    assert_eq!(b.status, BetStatus::Loss);
    assert_eq!(world.balance(a_user).await, dec!(300.00));
    assert_eq!(world.balance(b_user).await, dec!(0));

    let journal = world.services.ledger.transactions(a_user, Page::default()).await.unwrap();
    assert_eq!(journal.items[0].transaction_type, TransactionType::Payout);
    assert_eq!(journal.items[0].balance_after.amount(), dec!(300));
}

#[tokio::test]
async fn test_resettling_is_a_no_op() {
    let world = World::in_memory();
    let game = world.game().await;
    let x = world.option(&game, "X", dec!(2.5)).await;
    let user = world.user_with(dec!(40)).await;
    world.bet(user, &[&x], dec!(40)).await;

    world.services.settlement.settle_game(game.id, &[x.id]).await.unwrap();
    assert_eq!(world.balance(user).await, dec!(100));

    let again = world.services.settlement.settle_game(game.id, &[x.id]).await.unwrap();
    assert_eq!(again.bets_skipped, 1);
    assert_eq!(world.balance(user).await, dec!(100));
}

#[tokio::test]
async fn test_losing_single_is_not_credited() {
    let world = World::in_memory();
    let game = world.game().await;
    let home = world.option(&game, "Home", dec!(1.9)).await;
    let away = world.option(&game, "Away", dec!(3.4)).await;
    let user = world.user_with(dec!(50)).await;
    let bet = world.bet(user, &[&home], dec!(50)).await;

    world.services.settlement.settle_game(game.id, &[away.id]).await.unwrap();

    let bet = world.services.bets.get_bet(user, bet.id).await.unwrap();
    assert_eq!(bet.status, BetStatus::Loss);
    assert!(bet.settled_at.is_some());
    assert_eq!(world.balance(user).await, dec!(0));
}
