//! Serde shapes for the gym service's wall and route records, plus the
//! derived normalized/ranked types built from them.
//!
//! Every record keeps the fields it does not interpret in a flattened `extra`
//! map so that a load/save cycle writes back what the service sent.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub type HoldId = u64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Hold {
    pub id: HoldId,
    #[serde(rename = "polygonStr", default)]
    pub polygon_str: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Hold {
    pub fn new(id: HoldId, polygon_str: impl Into<String>) -> Self {
        Self {
            id,
            polygon_str: polygon_str.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Picture {
    pub name: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WallConfig {
    pub holds: Vec<Hold>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<Picture>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CrowdGrade {
    #[serde(default)]
    pub hueco: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "crowdGrade", default)]
    pub crowd_grade: CrowdGrade,
    #[serde(rename = "holdsList")]
    pub holds_list: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Route {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        grade: impl Into<String>,
        holds_list: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            crowd_grade: CrowdGrade {
                hueco: grade.into(),
                extra: Map::new(),
            },
            holds_list: holds_list.into(),
            extra: Map::new(),
        }
    }

    pub fn grade(&self) -> &str {
        &self.crowd_grade.hueco
    }
}

/// The part a hold plays in one particular route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum HoldRole {
    Start,
    Foot,
    On,
    Top,
    /// Only produced when normalizing with [`crate::RoleMode::Lenient`];
    /// such holds cannot be drawn.
    Unknown(char),
}

impl HoldRole {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'S' => Some(HoldRole::Start),
            'F' => Some(HoldRole::Foot),
            'O' => Some(HoldRole::On),
            'T' => Some(HoldRole::Top),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            HoldRole::Start => 'S',
            HoldRole::Foot => 'F',
            HoldRole::On => 'O',
            HoldRole::Top => 'T',
            HoldRole::Unknown(c) => *c,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, HoldRole::Unknown(_))
    }
}

impl fmt::Display for HoldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl From<HoldRole> for String {
    fn from(role: HoldRole) -> Self {
        role.as_char().to_string()
    }
}

impl TryFrom<String> for HoldRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(HoldRole::from_char(c).unwrap_or(HoldRole::Unknown(c))),
            _ => Err(format!("hold role must be a single character, got '{value}'")),
        }
    }
}

/// A copy of a catalog hold tagged with the role it plays in one route.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedHold {
    #[serde(flatten)]
    pub hold: Hold,
    #[serde(rename = "type")]
    pub role: HoldRole,
}

impl NormalizedHold {
    pub fn id(&self) -> HoldId {
        self.hold.id
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRoute {
    #[serde(flatten)]
    pub route: Route,
    #[serde(rename = "normalizedHolds")]
    pub normalized_holds: Vec<NormalizedHold>,
}

impl NormalizedRoute {
    pub fn id(&self) -> &str {
        &self.route.id
    }

    pub fn name(&self) -> &str {
        &self.route.name
    }

    pub fn grade(&self) -> &str {
        self.route.grade()
    }

    pub fn hold_ids(&self) -> impl Iterator<Item = HoldId> + '_ {
        self.normalized_holds.iter().map(NormalizedHold::id)
    }
}

/// Every other route of a collection, nearest first, with its hold-inclusion distance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedRoute {
    pub route_id: String,
    pub ranking: Vec<(String, usize)>,
}

impl RankedRoute {
    pub fn nearest(&self) -> Option<(&str, usize)> {
        self.ranking.first().map(|(id, d)| (id.as_str(), *d))
    }
}
