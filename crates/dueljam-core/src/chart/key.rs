//! Note lanes and input key state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lane a note belongs to
///
/// Player lanes are `0x10..=0x19` and `0x20..=0x29` (scratch first), the
/// autoplay range starts at `0x30` and background lanes at `0x40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteKey(pub u8);

impl NoteKey {
    pub const P1_S: NoteKey = NoteKey(0x10);
    pub const P1_1: NoteKey = NoteKey(0x11);
    pub const P1_2: NoteKey = NoteKey(0x12);
    pub const P1_3: NoteKey = NoteKey(0x13);
    pub const P1_4: NoteKey = NoteKey(0x14);
    pub const P1_5: NoteKey = NoteKey(0x15);
    pub const P1_6: NoteKey = NoteKey(0x16);
    pub const P1_7: NoteKey = NoteKey(0x17);
    pub const P1_8: NoteKey = NoteKey(0x18);
    pub const P1_9: NoteKey = NoteKey(0x19);

    pub const P2_S: NoteKey = NoteKey(0x20);
    pub const P2_1: NoteKey = NoteKey(0x21);
    pub const P2_2: NoteKey = NoteKey(0x22);
    pub const P2_3: NoteKey = NoteKey(0x23);
    pub const P2_4: NoteKey = NoteKey(0x24);
    pub const P2_5: NoteKey = NoteKey(0x25);
    pub const P2_6: NoteKey = NoteKey(0x26);
    pub const P2_7: NoteKey = NoteKey(0x27);
    pub const P2_8: NoteKey = NoteKey(0x28);
    pub const P2_9: NoteKey = NoteKey(0x29);

    pub const AUTO: NoteKey = NoteKey(0x30);
    pub const BG: NoteKey = NoteKey(0x40);

    /// Wrap any index into the background range `0x40..=0xFF`
    pub fn background(index: u8) -> Self {
        NoteKey((index % 192) + Self::BG.0)
    }

    /// Wrap any index into the autoplay range `0x30..=0x3F`
    pub fn autoplay(index: u8) -> Self {
        NoteKey((index % 16) + Self::AUTO.0)
    }

    /// Player 1 lane `index` (0 is scratch)
    pub fn player1(index: u8) -> Option<Self> {
        (index <= 9).then(|| NoteKey(Self::P1_S.0 + index))
    }

    /// Player 2 lane `index` (0 is scratch)
    pub fn player2(index: u8) -> Option<Self> {
        (index <= 9).then(|| NoteKey(Self::P2_S.0 + index))
    }

    /// Autoplay and background lanes are never judged against input
    pub fn is_autoplay(self) -> bool {
        self.0 >= Self::AUTO.0
    }

    pub fn is_background(self) -> bool {
        self.0 >= Self::BG.0
    }

    pub fn is_player1(self) -> bool {
        (Self::P1_S.0..Self::P2_S.0).contains(&self.0)
    }

    pub fn is_player2(self) -> bool {
        (Self::P2_S.0..Self::AUTO.0).contains(&self.0)
    }

    /// 0 for autoplay lanes, 1 or 2 for player lanes
    pub fn player(self) -> Option<u8> {
        if self.is_autoplay() {
            Some(0)
        } else if self.is_player1() {
            Some(1)
        } else if self.is_player2() {
            Some(2)
        } else {
            None
        }
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// State of the physical key behind a lane
///
/// A pressed key is ON until something uses the press and locks it; the
/// lock lasts until release. AUTO drives autoplay lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputKeyStatus {
    #[default]
    Off,
    On,
    Locked,
    Auto,
}

impl InputKeyStatus {
    pub fn is_off(self) -> bool {
        self == InputKeyStatus::Off
    }

    /// Anything but OFF counts as held
    pub fn is_on(self) -> bool {
        self != InputKeyStatus::Off
    }

    pub fn is_locked(self) -> bool {
        self == InputKeyStatus::Locked
    }

    pub fn turn_on(&mut self) {
        if *self == InputKeyStatus::Off {
            *self = InputKeyStatus::On;
        }
    }

    pub fn turn_off(&mut self) {
        *self = InputKeyStatus::Off;
    }

    pub fn try_lock(&mut self) -> bool {
        if *self == InputKeyStatus::On {
            *self = InputKeyStatus::Locked;
            true
        } else {
            false
        }
    }

    pub fn try_unlock(&mut self) -> bool {
        if *self == InputKeyStatus::Locked {
            *self = InputKeyStatus::On;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ranges() {
        assert_eq!(NoteKey::P1_S.player(), Some(1));
        assert_eq!(NoteKey::P2_9.player(), Some(2));
        assert_eq!(NoteKey::AUTO.player(), Some(0));
        assert_eq!(NoteKey::background(7).player(), Some(0));
        assert_eq!(NoteKey(0x05).player(), None);

        assert!(NoteKey::BG.is_autoplay(), "background lanes autoplay too");
        assert!(!NoteKey::autoplay(3).is_background());
        assert_eq!(NoteKey::autoplay(17), NoteKey(0x31));
        assert_eq!(NoteKey::background(200), NoteKey(0x48));
        assert_eq!(NoteKey::player1(3), Some(NoteKey::P1_3));
        assert_eq!(NoteKey::player2(10), None);
    }

    #[test]
    fn test_key_status_transitions() {
        let mut status = InputKeyStatus::Off;
        assert!(!status.try_lock(), "cannot lock a released key");

        status.turn_on();
        assert_eq!(status, InputKeyStatus::On);
        assert!(status.try_lock());
        assert!(status.is_locked() && status.is_on());

        status.turn_on();
        assert_eq!(status, InputKeyStatus::Locked, "turn_on keeps an existing lock");
        assert!(status.try_unlock());
        assert_eq!(status, InputKeyStatus::On);

        status.turn_off();
        assert!(status.is_off());
        assert!(!status.try_unlock());
    }
}
