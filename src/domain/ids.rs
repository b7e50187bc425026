use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u16);

        impl $name {
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub fn from_index(idx: usize) -> Self {
                $name(idx as u16)
            }
        }
    };
}

arena_id!(
    /// Index into `Institution::levels`.
    LevelId
);
arena_id!(
    /// Index into `Institution::subjects`.
    SubjectId
);
arena_id!(
    /// Index into `Institution::groups`.
    GroupId
);
arena_id!(
    /// Index into `Institution::teachers`.
    TeacherId
);
arena_id!(
    /// Index into `Institution::rooms`.
    RoomId
);
arena_id!(
    /// Index into `Institution::families`.
    FamilyId
);

/// One of the two alternating weeks.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
)]
pub enum WeekVariant {
    A,
    B,
}

impl WeekVariant {
    pub const ALL: [WeekVariant; 2] = [WeekVariant::A, WeekVariant::B];

    #[inline(always)]
    pub fn index(self) -> usize {
        match self {
            WeekVariant::A => 0,
            WeekVariant::B => 1,
        }
    }

    pub fn from_index(idx: usize) -> Self {
        if idx == 0 {
            WeekVariant::A
        } else {
            WeekVariant::B
        }
    }

    pub fn other(self) -> Self {
        match self {
            WeekVariant::A => WeekVariant::B,
            WeekVariant::B => WeekVariant::A,
        }
    }
}

/// A (day, period) position on the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: u8,
    pub period: u8,
}

impl TimeSlot {
    pub fn new(day: u8, period: u8) -> Self {
        Self { day, period }
    }
}
