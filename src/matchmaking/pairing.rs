//! Ready-user pairing

use std::collections::BTreeMap;

use tracing::warn;
use uuid::Uuid;

use crate::game::BattleEngine;
use crate::lobby::{ConnId, Connection, LobbyState, User};
use crate::ws::protocol::Message;

/// A match formed by the matchmaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub match_id: Uuid,
    pub left: ConnId,
    pub right: ConnId,
}

/// First two users (in iteration order) that are ready and not already in a
/// game. Callers iterate in connection order, so the oldest ready connections
/// are paired first; nothing more about fairness is promised.
pub fn pick_pair<'a>(
    users: impl IntoIterator<Item = (ConnId, &'a User)>,
) -> Option<(ConnId, ConnId)> {
    let mut ready = users
        .into_iter()
        .filter(|(_, user)| user.state() == LobbyState::Ready)
        .map(|(id, _)| id);

    let left = ready.next()?;
    let right = ready.next()?;
    Some((left, right))
}

/// Pair two ready users if there are at least two. Both get a START GAME
/// naming the other, then one battle and two bridges are started. With fewer
/// than two ready users this does nothing.
pub async fn evaluate(
    connections: &mut BTreeMap<ConnId, Connection>,
    engine: &dyn BattleEngine,
) -> Option<Pairing> {
    let (left, right) = pick_pair(connections.iter().map(|(id, conn)| (*id, &conn.user)))?;

    let match_id = Uuid::new_v4();
    let mut seats = Vec::with_capacity(2);

    for (me, them) in [(left, right), (right, left)] {
        let opponent = connections
            .get(&them)
            .map(|conn| conn.user.name.clone())
            .unwrap_or_default();
        let conn = connections.get_mut(&me)?;

        if conn.outbound.send(Message::start_game(opponent).into()).await.is_err() {
            warn!(conn_id = %me, "Failed to send START GAME, connection closing");
        }
        seats.push(conn.enter_battle(me, match_id));
    }

    let right_seat = seats.pop()?;
    let left_seat = seats.pop()?;
    engine.start(match_id, left_seat, right_seat);

    Some(Pairing {
        match_id,
        left,
        right,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(ready: bool, in_game: bool) -> User {
        User {
            ready,
            in_game,
            ..User::default()
        }
    }

    #[test]
    fn test_no_pair_with_fewer_than_two_ready() {
        let users = [(ConnId(1), user(true, false)), (ConnId(2), user(false, false))];
        assert_eq!(pick_pair(users.iter().map(|(id, u)| (*id, u))), None);
        assert_eq!(pick_pair(std::iter::empty::<(ConnId, &User)>()), None);
    }

    #[test]
    fn test_in_game_users_are_skipped() {
        let users = [
            (ConnId(1), user(true, true)),
            (ConnId(2), user(true, false)),
            (ConnId(3), user(false, false)),
            (ConnId(4), user(true, false)),
        ];
        assert_eq!(
            pick_pair(users.iter().map(|(id, u)| (*id, u))),
            Some((ConnId(2), ConnId(4)))
        );
    }

    #[test]
    fn test_first_two_ready_in_order() {
        let users = [
            (ConnId(5), user(true, false)),
            (ConnId(6), user(true, false)),
            (ConnId(7), user(true, false)),
        ];
        assert_eq!(
            pick_pair(users.iter().map(|(id, u)| (*id, u))),
            Some((ConnId(5), ConnId(6)))
        );
    }
}
