//! Sub-object authoring metadata
//!
//! Sub-objects carry free-text properties such as
//! `pieces=shards count=4 sizevar=0.3 rotaxes=xz entity timeout=10`. They are
//! parsed once per asset into [`PieceProps`].

use std::convert::Infallible;
use std::str::FromStr;

/// Axes a generic piece may be randomly rotated around
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisMask {
    pub fn parse(text: &str) -> Self {
        let text = text.to_ascii_lowercase();
        Self {
            x: text.contains('x'),
            y: text.contains('y'),
            z: text.contains('z'),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.x || self.y || self.z)
    }
}

/// Parsed sub-object properties
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PieceProps {
    /// Helper sub-object holding the authored break pieces
    pub pieces: Option<String>,
    /// Number of generic pieces (`count=` or `generic=`)
    pub count: Option<u32>,
    /// Random scale variation of generic pieces
    pub size_var: Option<f32>,
    pub rot_axes: Option<AxisMask>,
    /// `entity`: always spawn as an entity
    pub force_entity: bool,
    /// `entity_mp`: spawn as an entity in multiplayer sessions
    pub force_entity_mp: bool,
    /// `bone=`: parsed but not supported
    pub bone: Option<String>,
    /// `breaker`: the piece keeps breaking what it hits
    pub breaker: bool,
    /// Self-removal timeout in seconds
    pub timeout: Option<f32>,
    /// Lifetime once the piece is no longer rendered
    pub lifetime_invisible: Option<f32>,
}

impl PieceProps {
    /// Parse `key=value` and bare-flag tokens
    ///
    /// Tokens are separated by whitespace, commas or semicolons. Keys are
    /// case-insensitive; unknown keys and malformed numbers are ignored.
    pub fn parse(text: &str) -> Self {
        let mut props = Self::default();
        for token in text
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
            .filter(|t| !t.is_empty())
        {
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), Some(v.trim())),
                None => (token.to_ascii_lowercase(), None),
            };
            match (key.as_str(), value) {
                ("pieces", Some(v)) if !v.is_empty() => props.pieces = Some(v.to_string()),
                ("count" | "generic", Some(v)) => props.count = v.parse().ok(),
                ("sizevar", Some(v)) => props.size_var = v.parse().ok(),
                ("rotaxes", Some(v)) => props.rot_axes = Some(AxisMask::parse(v)),
                ("entity", _) => props.force_entity = true,
                ("entity_mp", _) => props.force_entity_mp = true,
                ("bone", Some(v)) => props.bone = Some(v.to_string()),
                ("breaker", _) => props.breaker = true,
                ("timeout", Some(v)) => props.timeout = v.parse().ok(),
                ("invis", Some(v)) => props.lifetime_invisible = v.parse().ok(),
                _ => tracing::trace!("ignoring sub-object property '{}'", token),
            }
        }
        props
    }

    /// True when the piece must become an entity under the given session policy
    pub fn wants_entity(&self, multiplayer: bool) -> bool {
        self.force_entity || (multiplayer && self.force_entity_mp)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl FromStr for PieceProps {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PieceProps::parse(s))
    }
}
