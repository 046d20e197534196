//! Combat engagement engine: target locking, weapon choice, and the
//! periodic decision tick.
//!
//! A slot only ever fights back. The engagement locks when the bot's own
//! entity takes damage from an identifiable player, runs a decision tick
//! until the target dies or becomes invalid, and clears unconditionally on
//! the bot's own death.

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Decision tick cadence while an engagement is locked
pub const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Distance at which the bot attacks instead of pursuing
pub const ATTACK_RANGE: f64 = 4.0;

/// Follow distance handed to the movement collaborator while pursuing
pub const PURSUE_DISTANCE: f64 = 3.0;

/// How long a sidestep dodge is held
pub const DODGE_HOLD: Duration = Duration::from_millis(300);

/// Delay before the first mocking message after locking on
pub const FIRST_MOCK_DELAY: Duration = Duration::from_secs(1);

/// A locked combat target for one slot.
///
/// At most one engagement exists per slot; it owns the tick task driving
/// the decision loop.
pub struct Engagement {
    /// Name of the locked target
    pub target: String,

    /// When a mocking message was last sent
    pub last_mock: Instant,

    /// Randomized gap until the next mocking message
    pub mock_gap: Duration,

    /// Tick loop task, aborted on teardown
    pub ticker: JoinHandle<()>,
}

impl Engagement {
    /// Whether enough time has passed to send another mocking message
    pub fn due_for_mock(&self, now: Instant) -> bool {
        now.duration_since(self.last_mock) > self.mock_gap
    }

    /// Record a sent mock and draw the next gap
    pub fn mocked(&mut self, now: Instant) {
        self.last_mock = now;
        self.mock_gap = random_mock_gap();
    }
}

/// Randomized 10-20s gap between mocking messages
pub fn random_mock_gap() -> Duration {
    let jitter = rand::rng().random_range(0..10_000u64);
    Duration::from_millis(10_000 + jitter)
}

/// Pick a mocking message for the target, uniformly at random
pub fn mocking_message(target: &str) -> String {
    let messages = [
        format!("You are finished {target}!"),
        format!("That's what you get {target}!"),
        format!("{target} messed with the wrong bot!"),
        format!("Game over {target}!"),
        format!("Better luck next time {target}!"),
        format!("{target} thought they could win?"),
        format!("That was too easy {target}!"),
        format!("{target} should have stayed away!"),
        format!("Bot 1, {target} 0!"),
        format!("You picked the wrong fight {target}!"),
    ];
    let index = rand::rng().random_range(0..messages.len());
    messages[index].clone()
}

/// Announcement sent when the locked target dies
pub fn elimination_message(target: &str) -> String {
    format!("{target} has been dealt with!")
}

/// Melee damage for a known weapon item name; unknown items deal 1
pub fn weapon_damage(item: &str) -> u32 {
    match item {
        "netherite_sword" => 8,
        "diamond_sword" => 7,
        "iron_sword" => 6,
        "stone_sword" => 5,
        "golden_sword" => 4,
        "wooden_sword" => 4,
        "netherite_axe" => 10,
        "diamond_axe" => 9,
        "iron_axe" => 9,
        "stone_axe" => 9,
        "golden_axe" => 7,
        "wooden_axe" => 7,
        _ => 1,
    }
}

/// Best-damage melee weapon among the given inventory items.
///
/// Only swords and axes are considered. Ties keep the earlier item, so
/// inventory iteration order breaks them.
pub fn best_weapon(items: &[String]) -> Option<&String> {
    let mut best: Option<(&String, u32)> = None;
    for item in items {
        if !item.contains("sword") && !item.contains("axe") {
            continue;
        }
        let damage = weapon_damage(item);
        if best.is_none_or(|(_, best_damage)| damage > best_damage) {
            best = Some((item, damage));
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn best_weapon_prefers_highest_damage() {
        let inventory = items(&["stone_sword", "netherite_axe", "diamond_sword"]);
        assert_eq!(best_weapon(&inventory).unwrap(), "netherite_axe");
    }

    #[test]
    fn best_weapon_breaks_ties_by_inventory_order() {
        // diamond_axe and iron_axe both deal 9
        let inventory = items(&["iron_axe", "diamond_axe"]);
        assert_eq!(best_weapon(&inventory).unwrap(), "iron_axe");
    }

    #[test]
    fn best_weapon_ignores_non_melee_items() {
        let inventory = items(&["bread", "torch", "bow"]);
        assert_eq!(best_weapon(&inventory), None);

        let inventory = items(&["bread", "wooden_sword"]);
        assert_eq!(best_weapon(&inventory).unwrap(), "wooden_sword");
    }

    #[test]
    fn unknown_melee_items_still_count() {
        // A modded sword beats nothing but is still equippable
        let inventory = items(&["ruby_sword"]);
        assert_eq!(best_weapon(&inventory).unwrap(), "ruby_sword");
        assert_eq!(weapon_damage("ruby_sword"), 1);
    }

    #[test]
    fn mocking_messages_mention_the_target() {
        for _ in 0..50 {
            assert!(mocking_message("Hunter").contains("Hunter"));
        }
    }

    #[test]
    fn mock_gap_is_within_bounds() {
        for _ in 0..100 {
            let gap = random_mock_gap();
            assert!(gap >= Duration::from_secs(10));
            assert!(gap < Duration::from_secs(20));
        }
    }
}
