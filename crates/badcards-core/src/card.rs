use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// A reference to one card in one pack. The pair (pack_id, card_index) is
/// the card's identity; the card text itself lives in pack content files
/// and is resolved elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub pack_id: String,
    pub card_index: u32,
}

/// Pack id → (slot index → card). Both levels are ordered maps so that
/// flattening and indexing walk packs and slots deterministically.
pub type CardPackMap = BTreeMap<String, BTreeMap<u32, Card>>;

/// Canonical identity string for a card: `"<pack_id>:<card_index>"`.
pub fn compute_identity(card: &Card) -> String {
    format!("{}:{}", card.pack_id, card.card_index)
}

/// Concatenate every pack's cards into one flat list, pack order then slot
/// order. No deduplication: a card appearing in two packs yields two entries.
pub fn flatten_all_cards(map: &CardPackMap) -> Vec<Card> {
    map.values()
        .flat_map(|pack| pack.values().cloned())
        .collect()
}

/// Build a lookup table keyed by identity string. On identity collision the
/// later pack wins (last-writer-wins).
pub fn build_identity_index(map: &CardPackMap) -> HashMap<String, Card> {
    let mut index = HashMap::new();
    for pack in map.values() {
        for card in pack.values() {
            index.insert(compute_identity(card), card.clone());
        }
    }
    index
}
