pub mod card;
pub mod net;
pub mod player;
pub mod session;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use uuid::Uuid;

    use crate::card::{Card, CardPackMap};
    use crate::player::PlayerGuid;
    use crate::session::{GameSession, WinCurve, generate_session_code};

    /// Build a session with `extra_players` approved members besides the
    /// owner. Returns the session, owner guid, and the extra player guids
    /// in join order.
    pub fn make_session(
        extra_players: usize,
        rounds_override: Option<u32>,
    ) -> (GameSession, PlayerGuid, Vec<PlayerGuid>) {
        let curve = WinCurve::default();
        let owner = Uuid::new_v4();
        let mut session = GameSession::new(
            generate_session_code(),
            owner,
            "Owner".to_string(),
            crate::time::now_ms(),
            &curve,
            rounds_override,
        )
        .expect("valid session config");

        let mut guids = Vec::with_capacity(extra_players);
        for i in 0..extra_players {
            let guid = Uuid::new_v4();
            session
                .request_join(guid, format!("Player{}", i + 1), crate::time::now_ms())
                .expect("fresh guid joins");
            session
                .approve_join(owner, guid, &curve)
                .expect("owner approves");
            guids.push(guid);
        }
        (session, owner, guids)
    }

    /// Build a pack map with `packs` packs of `cards_per_pack` cards each,
    /// pack ids `pack-0`, `pack-1`, ...
    pub fn make_pack_map(packs: usize, cards_per_pack: u32) -> CardPackMap {
        let mut map = CardPackMap::new();
        for p in 0..packs {
            let pack_id = format!("pack-{p}");
            let cards = (0..cards_per_pack)
                .map(|i| {
                    (
                        i,
                        Card {
                            pack_id: pack_id.clone(),
                            card_index: i,
                        },
                    )
                })
                .collect();
            map.insert(pack_id, cards);
        }
        map
    }
}
