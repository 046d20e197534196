//! Combat engagement integration tests.
//!
//! Verify the lock → tick loop → clear lifecycle against a scripted
//! session: weapon choice, mocking messages, pursuit vs. attack decisions,
//! and the teardown paths.

mod common;

use common::{Action, FakeConnector, settle, spawn_fleet, test_config};
use craft_fleet::fleet::actor::FleetHandle;
use craft_fleet::session::{AttackerInfo, MoveDirection, SessionEvent};
use std::sync::Arc;
use tokio::time::{Duration, sleep};

async fn online_fleet() -> (FleetHandle, Arc<FakeConnector>) {
    let (handle, conn) = spawn_fleet(test_config());
    handle.add_slots(1).await.unwrap();
    settle().await;
    conn.emit(0, SessionEvent::Spawned).await;
    settle().await;
    (handle, conn)
}

fn player_attack(name: &str) -> SessionEvent {
    SessionEvent::SelfDamaged {
        attacker: Some(AttackerInfo {
            name: name.to_string(),
            is_player: true,
        }),
    }
}

#[tokio::test(start_paused = true)]
async fn damage_from_player_locks_equips_and_mocks() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_inventory(&["bread", "stone_sword", "diamond_sword"]);
    session.set_target("Hunter", 20.0, 6.0);

    conn.emit(0, player_attack("Hunter")).await;
    settle().await;

    // Best-damage melee weapon equipped immediately on lock
    assert!(
        session
            .actions()
            .contains(&Action::Equip("diamond_sword".to_string()))
    );

    // First mocking message lands about a second after the lock
    assert!(session.chats().is_empty());
    sleep(Duration::from_millis(1100)).await;
    let chats = session.chats();
    assert_eq!(chats.len(), 1);
    assert!(chats[0].contains("Hunter"));

    // Out of range, so ticks issue pursuit directives
    assert!(
        session
            .actions()
            .contains(&Action::Pursue("Hunter".to_string(), 3.0))
    );
    assert!(
        !session
            .actions()
            .iter()
            .any(|action| matches!(action, Action::Attack(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn close_target_gets_attacked_with_a_dodge() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_target("Hunter", 20.0, 2.0);

    conn.emit(0, player_attack("Hunter")).await;
    sleep(Duration::from_millis(1600)).await;

    let actions = session.actions();
    assert!(actions.contains(&Action::Attack("Hunter".to_string())));

    // The dodge holds a random sidestep briefly, then releases it
    let sidestep = actions.iter().find_map(|action| match action {
        Action::Move(direction, true) => Some(*direction),
        _ => None,
    });
    let direction = sidestep.expect("attack should come with a sidestep");
    assert!(matches!(
        direction,
        MoveDirection::Left | MoveDirection::Right
    ));
    assert!(actions.contains(&Action::Move(direction, false)));
}

#[tokio::test(start_paused = true)]
async fn dead_target_is_announced_and_engagement_clears() {
    let (handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_target("Hunter", 20.0, 2.0);

    conn.emit(0, player_attack("Hunter")).await;
    sleep(Duration::from_millis(1600)).await;
    assert!(
        session
            .actions()
            .contains(&Action::Attack("Hunter".to_string()))
    );

    session.set_target("Hunter", 0.0, 2.0);
    sleep(Duration::from_millis(600)).await;

    assert!(
        session
            .chats()
            .contains(&"Hunter has been dealt with!".to_string())
    );
    assert!(session.actions().contains(&Action::StopAttack));

    let logs = handle.logs(100).await.unwrap();
    assert!(logs.iter().any(|line| line.contains("Target eliminated")));

    // Tick loop torn down: nothing further happens, even with a live target
    session.set_target("Hunter", 20.0, 2.0);
    let before = session.actions().len();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(session.actions().len(), before);
}

#[tokio::test(start_paused = true)]
async fn vanished_target_also_clears_the_engagement() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_target("Hunter", 20.0, 6.0);

    conn.emit(0, player_attack("Hunter")).await;
    sleep(Duration::from_millis(600)).await;

    session.clear_target("Hunter");
    sleep(Duration::from_millis(600)).await;

    assert!(
        session
            .chats()
            .contains(&"Hunter has been dealt with!".to_string())
    );

    let before = session.actions().len();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(session.actions().len(), before);
}

#[tokio::test(start_paused = true)]
async fn own_death_clears_engagement_and_stops_attacking() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_target("Hunter", 20.0, 2.0);

    conn.emit(0, player_attack("Hunter")).await;
    sleep(Duration::from_millis(600)).await;

    conn.emit(0, SessionEvent::Died).await;
    settle().await;
    assert!(session.actions().contains(&Action::StopAttack));

    // Let the in-flight dodge release land before measuring stability
    sleep(Duration::from_millis(400)).await;
    let before = session.actions().len();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(session.actions().len(), before);
}

#[tokio::test(start_paused = true)]
async fn non_player_attackers_are_ignored() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_inventory(&["iron_sword"]);
    session.set_target("Zombie", 20.0, 2.0);

    conn.emit(
        0,
        SessionEvent::SelfDamaged {
            attacker: Some(AttackerInfo {
                name: "Zombie".to_string(),
                is_player: false,
            }),
        },
    )
    .await;
    conn.emit(0, SessionEvent::SelfDamaged { attacker: None }).await;
    sleep(Duration::from_secs(2)).await;

    assert!(session.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_attacker_does_not_steal_the_lock() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_target("Hunter", 20.0, 6.0);
    session.set_target("Bandit", 20.0, 1.0);

    conn.emit(0, player_attack("Hunter")).await;
    settle().await;
    conn.emit(0, player_attack("Bandit")).await;
    sleep(Duration::from_secs(2)).await;

    // Still pursuing the original target; the closer newcomer is ignored
    assert!(
        session
            .actions()
            .contains(&Action::Pursue("Hunter".to_string(), 3.0))
    );
    assert!(
        !session
            .actions()
            .iter()
            .any(|action| matches!(action, Action::Attack(name) if name == "Bandit"))
    );
}

#[tokio::test(start_paused = true)]
async fn periodic_mocks_repeat_while_locked() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_target("Hunter", 20.0, 6.0);

    conn.emit(0, player_attack("Hunter")).await;
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(session.chats().len(), 1);

    // The re-mock gap is randomized between 10 and 20 seconds
    sleep(Duration::from_secs(9)).await;
    assert_eq!(session.chats().len(), 1);

    // By 20.5s the first re-mock has fired, and a second cannot have yet
    sleep(Duration::from_millis(10_500)).await;
    let chats = session.chats();
    assert_eq!(chats.len(), 2);
    assert!(chats[1].contains("Hunter"));
}

#[tokio::test(start_paused = true)]
async fn session_end_tears_the_tick_loop_down() {
    let (_handle, conn) = online_fleet().await;
    let session = conn.link(0).session;
    session.set_target("Hunter", 20.0, 6.0);

    conn.emit(0, player_attack("Hunter")).await;
    sleep(Duration::from_millis(600)).await;
    assert!(
        session
            .actions()
            .contains(&Action::Pursue("Hunter".to_string(), 3.0))
    );

    conn.emit(0, SessionEvent::Ended).await;
    settle().await;

    let before = session.actions().len();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(session.actions().len(), before);
}
