//! The 14-variant element enum and the compile-time attribute tables that
//! key off it (density, immovability, liquid/gas membership).
//!
//! Capabilities are table lookups, never methods on a polymorphic type --
//! elements are a tagged byte, not objects (see DESIGN.md's note on this).

use derive_more::Display;

/// One of the 14 element kinds a cell can hold. `EMPTY` is element code 0,
/// matching the all-zero cell word (data model invariant I1).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Element {
    #[display("empty")]
    Empty = 0,
    #[display("sand")]
    Sand = 1,
    #[display("water")]
    Water = 2,
    #[display("stone")]
    Stone = 3,
    #[display("fire")]
    Fire = 4,
    #[display("steam")]
    Steam = 5,
    #[display("wood")]
    Wood = 6,
    #[display("glass")]
    Glass = 7,
    #[display("smoke")]
    Smoke = 8,
    #[display("oil")]
    Oil = 9,
    #[display("lava")]
    Lava = 10,
    #[display("acid")]
    Acid = 11,
    #[display("gunpowder")]
    Gunpowder = 12,
    #[display("bomb")]
    Bomb = 13,
}

impl Element {
    pub const ALL: [Element; 14] = [
        Element::Empty,
        Element::Sand,
        Element::Water,
        Element::Stone,
        Element::Fire,
        Element::Steam,
        Element::Wood,
        Element::Glass,
        Element::Smoke,
        Element::Oil,
        Element::Lava,
        Element::Acid,
        Element::Gunpowder,
        Element::Bomb,
    ];

    /// Decodes an element byte. Used only by host-facing inspection helpers;
    /// the kernel's hot path never decodes an element it didn't just write
    /// itself, so it never needs to handle the invalid case.
    pub const fn from_byte(byte: u8) -> Option<Element> {
        Some(match byte {
            0 => Element::Empty,
            1 => Element::Sand,
            2 => Element::Water,
            3 => Element::Stone,
            4 => Element::Fire,
            5 => Element::Steam,
            6 => Element::Wood,
            7 => Element::Glass,
            8 => Element::Smoke,
            9 => Element::Oil,
            10 => Element::Lava,
            11 => Element::Acid,
            12 => Element::Gunpowder,
            13 => Element::Bomb,
            _ => return None,
        })
    }

    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Relative density used by the gravity-swap rule: a column pair swaps
    /// when `density(top) > density(bottom)`. Gas densities (0, 1) sit below
    /// `Empty` (2) so gases rise under the same comparison that makes sand
    /// fall.
    pub const fn density(self) -> u16 {
        match self {
            Element::Fire => 0,
            Element::Smoke => 1,
            Element::Steam => 1,
            Element::Empty => 2,
            Element::Oil => 4,
            Element::Water => 5,
            Element::Acid => 6,
            Element::Lava => 7,
            Element::Wood => 9,
            Element::Sand => 10,
            Element::Gunpowder => 10,
            Element::Glass => 200,
            Element::Bomb => 255,
            Element::Stone => 255,
        }
    }

    /// STONE, WOOD, GLASS, BOMB never move under gravity or lateral spread.
    pub const fn is_immovable(self) -> bool {
        matches!(
            self,
            Element::Stone | Element::Wood | Element::Glass | Element::Bomb
        )
    }

    pub const fn is_liquid(self) -> bool {
        matches!(
            self,
            Element::Water | Element::Oil | Element::Lava | Element::Acid
        )
    }

    pub const fn is_gas(self) -> bool {
        matches!(self, Element::Fire | Element::Smoke | Element::Steam)
    }

    /// True for elements whose aux byte carries a meaning (I4): FIRE/STEAM/
    /// SMOKE lifetime, LAVA/STONE heat, ACID potency.
    pub const fn has_aux(self) -> bool {
        matches!(
            self,
            Element::Fire
                | Element::Steam
                | Element::Smoke
                | Element::Lava
                | Element::Stone
                | Element::Acid
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_byte() {
        for e in Element::ALL {
            assert_eq!(Element::from_byte(e.as_byte()), Some(e));
        }
    }

    #[test]
    fn unknown_byte_decodes_to_none() {
        assert_eq!(Element::from_byte(200), None);
    }

    #[test]
    fn gases_are_lighter_than_empty() {
        assert!(Element::Fire.density() < Element::Empty.density());
        assert!(Element::Smoke.density() < Element::Empty.density());
        assert!(Element::Steam.density() < Element::Empty.density());
    }

    #[test]
    fn immovables_match_spec_table() {
        for e in Element::ALL {
            let expect = matches!(
                e,
                Element::Stone | Element::Wood | Element::Glass | Element::Bomb
            );
            assert_eq!(e.is_immovable(), expect, "{e}");
        }
    }
}
