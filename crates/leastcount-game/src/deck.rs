//! Stateless deck utilities: building, shuffling and valuing cards.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::card::{Card, CardId, Rank, Suit};

/// Counter for physical card ids. Never reset, so ids stay unique across
/// rounds and rooms.
static NEXT_CARD_ID: AtomicU64 = AtomicU64::new(1);

/// Cards in one deck: 52 standard plus two jokers.
pub const CARDS_PER_DECK: usize = 54;

/// Number of decks to play with for `players` active players.
///
/// Up to 7 players use 2 decks (108 cards), 8–10 use 3 (162 cards).
pub fn deck_count(players: usize) -> usize {
    if players <= 7 { 2 } else { 3 }
}

/// Builds `num_decks` full decks and returns them shuffled.
pub fn create_deck<R: Rng + ?Sized>(num_decks: usize, rng: &mut R) -> Vec<Card> {
    let mut cards = Vec::with_capacity(num_decks * CARDS_PER_DECK);
    for _ in 0..num_decks {
        for suit in Suit::STANDARD {
            for rank in Rank::STANDARD {
                cards.push(Card::new(rank, suit, next_card_id()));
            }
        }
        for _ in 0..2 {
            cards.push(Card::new(Rank::Joker, Suit::Joker, next_card_id()));
        }
    }
    shuffle(&mut cards, rng);
    cards
}

/// Uniform in-place permutation (Fisher–Yates).
pub fn shuffle<R: Rng + ?Sized>(cards: &mut [Card], rng: &mut R) {
    cards.shuffle(rng);
}

/// Face value of a rank.
pub fn card_value(rank: Rank) -> u32 {
    rank.value()
}

/// Sum of a hand. Jokers and cards of the wild rank count 0.
pub fn hand_value(hand: &[Card], wild: Option<Rank>) -> u32 {
    hand.iter().map(|c| c.points(wild)).sum()
}

fn next_card_id() -> CardId {
    CardId(NEXT_CARD_ID.fetch_add(1, Ordering::Relaxed))
}
