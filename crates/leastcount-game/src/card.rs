//! Card values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Card rank. Serialized the way players write it: `"A"`, `"7"`, `"K"`,
/// `"Joker"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    Joker,
}

impl Rank {
    /// The thirteen ranks of a standard suit, in order.
    pub const STANDARD: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Face value: A=1, 2–10 as printed, J/Q/K=10, Joker=0.
    ///
    /// Independent of the round's wild rank; see
    /// [`hand_value`](crate::deck::hand_value) for that.
    pub fn value(self) -> u32 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
            Rank::Joker => 0,
        }
    }

    pub fn is_joker(self) -> bool {
        matches!(self, Rank::Joker)
    }

    fn label(self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Joker => "Joker",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
    Joker,
}

impl Suit {
    pub const STANDARD: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];
}

/// Identifies one physical card. Unique across the whole process, so two
/// seven-of-hearts from different decks never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card-{}", self.0)
    }
}

/// An immutable card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
    pub value: u32,
    pub id: CardId,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit, id: CardId) -> Self {
        Self {
            rank,
            suit,
            value: rank.value(),
            id,
        }
    }

    /// What this card costs in a hand when `wild` is the round's wild rank.
    pub fn points(&self, wild: Option<Rank>) -> u32 {
        if self.rank.is_joker() || Some(self.rank) == wild {
            0
        } else {
            self.value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_value_table() {
        assert_eq!(Rank::Ace.value(), 1);
        assert_eq!(Rank::Seven.value(), 7);
        assert_eq!(Rank::Ten.value(), 10);
        assert_eq!(Rank::Jack.value(), 10);
        assert_eq!(Rank::Queen.value(), 10);
        assert_eq!(Rank::King.value(), 10);
        assert_eq!(Rank::Joker.value(), 0);
    }

    #[test]
    fn test_rank_serializes_as_printed_label() {
        assert_eq!(serde_json::to_string(&Rank::Ace).unwrap(), "\"A\"");
        assert_eq!(serde_json::to_string(&Rank::Ten).unwrap(), "\"10\"");
        assert_eq!(serde_json::to_string(&Rank::Joker).unwrap(), "\"Joker\"");
        let parsed: Rank = serde_json::from_str("\"Q\"").unwrap();
        assert_eq!(parsed, Rank::Queen);
    }

    #[test]
    fn test_card_points_zero_for_wild_and_joker() {
        let king = Card::new(Rank::King, Suit::Spades, CardId(1));
        let joker = Card::new(Rank::Joker, Suit::Joker, CardId(2));
        assert_eq!(king.points(None), 10);
        assert_eq!(king.points(Some(Rank::King)), 0);
        assert_eq!(king.points(Some(Rank::Two)), 10);
        assert_eq!(joker.points(None), 0);
    }

    #[test]
    fn test_card_json_shape() {
        let card = Card::new(Rank::Five, Suit::Clubs, CardId(9));
        let json = serde_json::to_value(card).unwrap();
        assert_eq!(json["rank"], "5");
        assert_eq!(json["suit"], "clubs");
        assert_eq!(json["value"], 5);
        assert_eq!(json["id"], 9);
    }
}
