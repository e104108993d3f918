//! Numeric enumerations referenced by the wire format.

use serde::{Deserialize, Serialize};

/// Declares a fieldless `#[repr(u8)]` enum with lossless `u8` conversions.
///
/// The generated type derives serde traits, so callers need `serde` in scope as
/// a dependency.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Every variant in ascending wire order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = $crate::UnknownValue;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )+
                    other => Err($crate::UnknownValue::new(stringify!($name), other)),
                }
            }
        }
    };
}

wire_enum! {
    /// Player body colour.
    Colour {
        /// Red.
        Red = 0x00,
        /// Blue.
        Blue = 0x01,
        /// Dark green.
        DarkGreen = 0x02,
        /// Pink.
        Pink = 0x03,
        /// Orange.
        Orange = 0x04,
        /// Yellow.
        Yellow = 0x05,
        /// Black.
        Black = 0x06,
        /// White.
        White = 0x07,
        /// Purple.
        Purple = 0x08,
        /// Brown.
        Brown = 0x09,
        /// Cyan.
        Cyan = 0x0a,
        /// Lime.
        Lime = 0x0b,
    }
}

wire_enum! {
    /// Playable maps.
    MapId {
        /// The Skeld.
        Skeld = 0x00,
        /// Mira HQ.
        MiraHq = 0x01,
        /// Polus.
        Polus = 0x02,
    }
}

impl MapId {
    /// Bit used for this map in search filters.
    pub fn search_bit(self) -> u8 {
        1 << (self as u8)
    }
}

wire_enum! {
    /// Rooms and ship sub-systems. Also the slot index inside ShipStatus.
    SystemType {
        /// Hallway.
        Hallway = 0x00,
        /// Storage.
        Storage = 0x01,
        /// Cafeteria.
        Cafeteria = 0x02,
        /// Reactor.
        Reactor = 0x03,
        /// Upper engine.
        UpperEngine = 0x04,
        /// Navigation.
        Navigation = 0x05,
        /// Admin.
        Admin = 0x06,
        /// Electrical (lights).
        Electrical = 0x07,
        /// Oxygen.
        O2 = 0x08,
        /// Shields.
        Shields = 0x09,
        /// Medbay.
        MedBay = 0x0a,
        /// Security.
        Security = 0x0b,
        /// Weapons.
        Weapons = 0x0c,
        /// Lower engine.
        LowerEngine = 0x0d,
        /// Communications.
        Communications = 0x0e,
        /// Ship tasks.
        ShipTasks = 0x0f,
        /// Doors.
        Doors = 0x10,
        /// Sabotage controller.
        Sabotage = 0x11,
        /// Decontamination.
        Decontamination = 0x12,
        /// Launchpad.
        Launchpad = 0x13,
        /// Locker room.
        LockerRoom = 0x14,
        /// Laboratory (Polus seismic stabilizers).
        Laboratory = 0x15,
        /// Balcony.
        Balcony = 0x16,
        /// Office.
        Office = 0x17,
        /// Greenhouse.
        Greenhouse = 0x18,
        /// Dropship.
        Dropship = 0x19,
        /// Second decontamination corridor.
        Decontamination2 = 0x1a,
        /// Outside.
        Outside = 0x1b,
        /// Specimen room.
        Specimens = 0x1c,
        /// Boiler room.
        BoilerRoom = 0x1d,
    }
}

wire_enum! {
    /// Archetype of a spawned object; fixes its component list.
    SpawnKind {
        /// The Skeld ship.
        ShipStatus = 0x00,
        /// Meeting screen.
        MeetingHub = 0x01,
        /// Lobby.
        LobbyBehaviour = 0x02,
        /// Player table and vote bans.
        GameData = 0x03,
        /// A player.
        Player = 0x04,
        /// Mira HQ ship.
        HeadQuarters = 0x05,
        /// Polus ship.
        PlanetMap = 0x06,
        /// Mirrored Skeld.
        AprilShipStatus = 0x07,
    }
}

wire_enum! {
    /// Why a game ended.
    GameEndReason {
        /// Crew voted out every impostor.
        HumansByVote = 0x00,
        /// Crew finished their tasks.
        HumansByTask = 0x01,
        /// Impostors won a vote.
        ImpostorByVote = 0x02,
        /// Impostors killed enough crew.
        ImpostorByKill = 0x03,
        /// A sabotage ran out.
        ImpostorBySabotage = 0x04,
        /// The last impostor left.
        ImpostorDisconnect = 0x05,
        /// Too many crew left.
        HumansDisconnect = 0x06,
    }
}

wire_enum! {
    /// Impostor kill range.
    KillDistance {
        /// Short.
        Short = 0x00,
        /// Medium.
        Medium = 0x01,
        /// Long.
        Long = 0x02,
    }
}

wire_enum! {
    /// When the shared task bar refreshes.
    TaskBarUpdate {
        /// Always.
        Always = 0x00,
        /// Only during meetings.
        InMeetings = 0x01,
        /// Never.
        Never = 0x02,
    }
}

wire_enum! {
    /// Decontamination door cycle state.
    DeconState {
        /// Idle.
        Idle = 0x00,
        /// Entering.
        Enter = 0x01,
        /// Doors closed.
        Closed = 0x02,
        /// Exiting.
        Exit = 0x04,
        /// Going up (Polus).
        HeadingUp = 0x08,
    }
}

wire_enum! {
    /// Sub-tag of the AlterGame payload.
    AlterGameTag {
        /// Toggle public visibility.
        ChangePrivacy = 0x01,
    }
}

wire_enum! {
    /// Sub-tag of the client-bound game list payload.
    GameListTag {
        /// A list of open games.
        List = 0x00,
        /// Per-map game counts.
        Count = 0x01,
    }
}

/// A byte read for a wire enum, kept as-is when it names no known variant.
///
/// Settings and ship state carry enums that newer clients extend; holding the
/// raw byte lets the rest of the blob decode and re-encode unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Wire<T> {
    /// A recognised variant.
    Known(T),
    /// A byte outside the enumeration.
    Raw(u8),
}

impl<T: TryFrom<u8> + Into<u8> + Copy> Wire<T> {
    /// Classify a wire byte.
    pub fn from_byte(byte: u8) -> Self {
        T::try_from(byte).map_or(Wire::Raw(byte), Wire::Known)
    }

    /// The byte to write back.
    pub fn byte(self) -> u8 {
        match self {
            Wire::Known(value) => value.into(),
            Wire::Raw(byte) => byte,
        }
    }

    /// The variant, if the byte was recognised.
    pub fn known(self) -> Option<T> {
        match self {
            Wire::Known(value) => Some(value),
            Wire::Raw(_) => None,
        }
    }
}

impl<T> From<T> for Wire<T> {
    fn from(value: T) -> Self {
        Wire::Known(value)
    }
}

/// Chat language filter. Values are bit flags, except [`Language::ENGLISH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(pub u32);

impl Language {
    /// Any language.
    pub const ANY: Self = Self(0x00);
    /// Other.
    pub const OTHER: Self = Self(0x01);
    /// Spanish.
    pub const SPANISH: Self = Self(0x02);
    /// Korean.
    pub const KOREAN: Self = Self(0x04);
    /// Russian.
    pub const RUSSIAN: Self = Self(0x08);
    /// Portuguese.
    pub const PORTUGUESE: Self = Self(0x10);
    /// Arabic.
    pub const ARABIC: Self = Self(0x20);
    /// Filipino.
    pub const FILIPINO: Self = Self(0x40);
    /// Polish.
    pub const POLISH: Self = Self(0x80);
    /// English.
    pub const ENGLISH: Self = Self(0x100);
}

impl Default for Language {
    fn default() -> Self {
        Self::ENGLISH
    }
}
