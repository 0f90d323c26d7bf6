//! Turn-based duel engine
//!
//! Each side submits one action per turn. The engine keeps draining both
//! inputs while it waits, so a chatty participant never stalls the sender
//! feeding it. A closed input is a forfeit.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{FighterView, Message, Update};

use super::{Action, BattleEngine, Seat};

/// Damage range of an attack
const ATTACK_DAMAGE: std::ops::RangeInclusive<i32> = 8..=15;
/// Life restored by a heal
const HEAL_AMOUNT: std::ops::RangeInclusive<i32> = 5..=10;

/// The bundled battle engine
#[derive(Debug, Clone)]
pub struct Duel {
    starting_life: i32,
}

impl Duel {
    pub fn new(starting_life: i32) -> Self {
        Self { starting_life }
    }
}

impl BattleEngine for Duel {
    fn start(&self, match_id: Uuid, left: Seat, right: Seat) {
        let seed = rand::random::<u64>();
        let duel = DuelState::new(match_id, seed, self.starting_life, left, right);
        tokio::spawn(duel.run());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// One participant (authoritative)
struct Fighter {
    name: String,
    life: i32,
    input: Option<mpsc::Receiver<Message>>,
    updates: mpsc::Sender<Update>,
    pending: Option<Action>,
    listening: bool,
}

impl Fighter {
    fn new(seat: Seat, life: i32) -> Self {
        Self {
            name: seat.name,
            life,
            input: Some(seat.input),
            updates: seat.updates,
            pending: None,
            listening: true,
        }
    }

    fn view(&self) -> FighterView {
        FighterView {
            name: self.name.clone(),
            life: self.life,
        }
    }
}

enum DuelEvent {
    Input(Side, Option<Message>),
    Abandoned,
}

/// Duel state (owned by the duel task)
pub(crate) struct DuelState {
    id: Uuid,
    turn: u32,
    max_life: i32,
    left: Fighter,
    right: Fighter,
    rng: ChaCha8Rng,
}

impl DuelState {
    pub(crate) fn new(id: Uuid, seed: u64, starting_life: i32, left: Seat, right: Seat) -> Self {
        Self {
            id,
            turn: 0,
            max_life: starting_life,
            left: Fighter::new(left, starting_life),
            right: Fighter::new(right, starting_life),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn fighter_mut(&mut self, side: Side) -> &mut Fighter {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn is_decided(&self) -> bool {
        self.left.life <= 0 || self.right.life <= 0
    }

    /// Run the duel until it is decided or nobody is listening
    pub(crate) async fn run(mut self) {
        info!(
            match_id = %self.id,
            left = %self.left.name,
            right = %self.right.name,
            "Duel started"
        );

        self.broadcast(Vec::new()).await;

        while !self.is_decided() && (self.left.listening || self.right.listening) {
            let (left_updates, right_updates) = (&self.left.updates, &self.right.updates);
            let event = tokio::select! {
                msg = next_input(&mut self.left.input) => DuelEvent::Input(Side::Left, msg),
                msg = next_input(&mut self.right.input) => DuelEvent::Input(Side::Right, msg),
                _ = async { tokio::join!(left_updates.closed(), right_updates.closed()) } => {
                    DuelEvent::Abandoned
                }
            };

            match event {
                DuelEvent::Input(side, Some(msg)) => {
                    self.fighter_mut(side).pending = Some(Action::from_message(&msg));
                    if self.left.pending.is_some() && self.right.pending.is_some() {
                        let log = self.resolve_turn();
                        self.broadcast(log).await;
                    }
                }
                DuelEvent::Input(side, None) => {
                    let fighter = self.fighter_mut(side);
                    fighter.input = None;
                    fighter.life = 0;
                    let log = vec![format!("{} left the battle", fighter.name)];
                    self.broadcast(log).await;
                }
                DuelEvent::Abandoned => {
                    debug!(match_id = %self.id, "Both seats stopped listening");
                    break;
                }
            }
        }

        info!(
            match_id = %self.id,
            turn = self.turn,
            left_life = self.left.life,
            right_life = self.right.life,
            "Duel ended"
        );
    }

    /// Apply both pending actions. Heals land before attacks; a defending target
    /// takes half damage.
    fn resolve_turn(&mut self) -> Vec<String> {
        self.turn += 1;
        let mut log = Vec::new();

        let left_action = self.left.pending.take().unwrap_or(Action::Pass);
        let right_action = self.right.pending.take().unwrap_or(Action::Pass);

        for (side, action) in [(Side::Left, left_action), (Side::Right, right_action)] {
            if action == Action::Heal {
                let amount = self.rng.gen_range(HEAL_AMOUNT);
                let max_life = self.max_life;
                let fighter = self.fighter_mut(side);
                fighter.life = fighter.life.saturating_add(amount).min(max_life);
                log.push(format!("{} heals to {}", fighter.name, fighter.life));
            }
        }

        for (side, action, target_action) in [
            (Side::Left, left_action, right_action),
            (Side::Right, right_action, left_action),
        ] {
            if action != Action::Attack {
                continue;
            }
            let mut damage = self.rng.gen_range(ATTACK_DAMAGE);
            if target_action == Action::Defend {
                damage /= 2;
            }
            let (attacker, target) = match side {
                Side::Left => (&self.left, &mut self.right),
                Side::Right => (&self.right, &mut self.left),
            };
            target.life = target.life.saturating_sub(damage);
            log.push(format!("{} hits {} for {}", attacker.name, target.name, damage));
        }

        for (fighter, action) in [(&self.left, left_action), (&self.right, right_action)] {
            match action {
                Action::Defend => log.push(format!("{} defends", fighter.name)),
                Action::Pass => log.push(format!("{} waits", fighter.name)),
                Action::Attack | Action::Heal => {}
            }
        }

        log
    }

    /// Send each side the state from its own perspective
    async fn broadcast(&mut self, log: Vec<String>) {
        let left_view = self.left.view();
        let right_view = self.right.view();

        let deliveries = [
            (Side::Left, left_view.clone(), right_view.clone()),
            (Side::Right, right_view, left_view),
        ];

        for (side, me, enemy) in deliveries {
            let update = Update {
                me,
                enemy,
                turn: self.turn,
                log: log.clone(),
            };
            let id = self.id;
            let fighter = self.fighter_mut(side);
            if !fighter.listening {
                continue;
            }
            if fighter.updates.send(update).await.is_err() {
                debug!(match_id = %id, fighter = %fighter.name, "Seat stopped listening");
                fighter.listening = false;
            }
        }
    }
}

/// Next message from an input, pending forever once the input is gone
async fn next_input(input: &mut Option<mpsc::Receiver<Message>>) -> Option<Message> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
