//! Built-in opponents for BOT MATCH

use std::collections::HashMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::ws::protocol::Update;

use super::{Action, SeatPeer};

/// Decision logic for a computer opponent
pub trait Bot: Send + Sync {
    fn name(&self) -> &str;

    /// Pick the next action given the latest (non-terminal) update
    fn choose(&self, update: &Update, rng: &mut ChaCha8Rng) -> Action;
}

/// Always swings
pub struct Brawler;

impl Bot for Brawler {
    fn name(&self) -> &str {
        "brawler"
    }

    fn choose(&self, _update: &Update, _rng: &mut ChaCha8Rng) -> Action {
        Action::Attack
    }
}

/// Picks at random, but heals when it is low
pub struct Gambler;

impl Bot for Gambler {
    fn name(&self) -> &str {
        "gambler"
    }

    fn choose(&self, update: &Update, rng: &mut ChaCha8Rng) -> Action {
        if update.me.life < 20 && rng.gen_bool(0.5) {
            return Action::Heal;
        }
        match rng.gen_range(0..3) {
            0 => Action::Attack,
            1 => Action::Defend,
            _ => Action::Heal,
        }
    }
}

/// Bots selectable by name (case-insensitive)
#[derive(Clone, Default)]
pub struct BotRoster {
    bots: HashMap<String, Arc<dyn Bot>>,
}

impl BotRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roster with every bundled bot
    pub fn builtin() -> Self {
        let mut roster = Self::new();
        roster.register(Arc::new(Brawler));
        roster.register(Arc::new(Gambler));
        roster
    }

    pub fn register(&mut self, bot: Arc<dyn Bot>) {
        self.bots.insert(bot.name().to_lowercase(), bot);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Bot>> {
        self.bots.get(&name.trim().to_lowercase()).cloned()
    }
}

/// Drive `bot` from its seat: one action per non-terminal update
pub fn spawn_bot(bot: Arc<dyn Bot>, mut seat: SeatPeer) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = ChaCha8Rng::seed_from_u64(rand::random());

        while let Some(update) = seat.updates.recv().await {
            if update.is_terminal() {
                break;
            }
            let action = bot.choose(&update, &mut rng);
            if seat.input.send(action.into_message(bot.name())).await.is_err() {
                break;
            }
        }

        debug!(bot = bot.name(), "Bot finished");
    })
}
