use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of catalogued work. Stored in the database as the uppercase code
/// (`BOOK`, `GAME`, ...); every label lives here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Book,
    Game,
    Music,
    Comic,
    Film,
    Tv,
    Perf,
    Broadcast,
}

impl MediaType {
    pub const ALL: [Self; 8] = [
        Self::Book,
        Self::Game,
        Self::Music,
        Self::Comic,
        Self::Film,
        Self::Tv,
        Self::Perf,
        Self::Broadcast,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "BOOK",
            Self::Game => "GAME",
            Self::Music => "MUSIC",
            Self::Comic => "COMIC",
            Self::Film => "FILM",
            Self::Tv => "TV",
            Self::Perf => "PERF",
            Self::Broadcast => "BROADCAST",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Book => "Book",
            Self::Game => "Video game",
            Self::Music => "Music",
            Self::Comic => "Comic",
            Self::Film => "Film",
            Self::Tv => "TV series",
            Self::Perf => "Show/performance",
            Self::Broadcast => "Broadcast (podcast, web series, etc.)",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "media type",
                value: s.to_string(),
            })
    }
}

/// Engagement status of a catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Paused,
    Dnf,
}

impl MediaStatus {
    pub const ALL: [Self; 5] = [
        Self::Planned,
        Self::InProgress,
        Self::Completed,
        Self::Paused,
        Self::Dnf,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Paused => "PAUSED",
            Self::Dnf => "DNF",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::InProgress => "In progress",
            Self::Completed => "Completed",
            Self::Paused => "Paused",
            Self::Dnf => "Did not finish",
        }
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Publication year bounds (antiquity through near future).
pub const PUB_YEAR_MIN: i32 = -4000;
pub const PUB_YEAR_MAX: i32 = 2200;

pub const SCORE_MIN: i32 = 1;
pub const SCORE_MAX: i32 = 10;

pub const TITLE_MAX_LEN: usize = 255;
pub const NAME_MAX_LEN: usize = 255;

/// Display labels for the 1-10 score scale.
pub const SCORE_CHOICES: [(i32, &str); 10] = [
    (1, "1\u{2b50} - Detested"),
    (2, "2\u{2b50} - Hated"),
    (3, "3\u{2b50} - Disliked"),
    (4, "4\u{2b50} - Not appreciated"),
    (5, "5\u{2b50} - Moderately appreciated"),
    (6, "6\u{2b50} - Appreciated"),
    (7, "7\u{2b50} - Enjoyed"),
    (8, "8\u{2b50} - Really enjoyed"),
    (9, "9\u{2b50} - Loved"),
    (10, "10\u{2b50} - Adored"),
];

pub const SCORE_NONE_LABEL: &str = "Not rated";

#[must_use]
pub fn score_label(score: i32) -> Option<&'static str> {
    SCORE_CHOICES
        .iter()
        .find(|(value, _)| *value == score)
        .map(|(_, label)| *label)
}
