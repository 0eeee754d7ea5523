//! Player identity derived from the robot name
//!
//! The simulation names robots like `red player 2` or `blue player 4`:
//! the last space-separated token is the player number, a leading `r`
//! means the red team, anything else the blue team.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// Lower-case name used in shared state keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Red => f.write_str("RED"),
            Team::Blue => f.write_str("BLUE"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Robot name is empty")]
    EmptyName,
    #[error("Robot name '{0}' does not end with a player number")]
    MissingPlayerNumber(String),
}

/// Team and player number of the robot this gateway serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub team: Team,
    pub player: u8,
}

impl PlayerIdentity {
    pub fn new(team: Team, player: u8) -> Self {
        Self { team, player }
    }

    /// Parse a robot name such as `red player 1`
    pub fn from_robot_name(name: &str) -> Result<Self, IdentityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        let token = name.rsplit(' ').next().unwrap_or(name);
        let player = token
            .parse::<u8>()
            .map_err(|_| IdentityError::MissingPlayerNumber(name.to_string()))?;
        let team = if name.starts_with('r') {
            Team::Red
        } else {
            Team::Blue
        };
        Ok(Self { team, player })
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.team, self.player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_player() {
        let id = PlayerIdentity::from_robot_name("red player 1").unwrap();
        assert_eq!(id, PlayerIdentity::new(Team::Red, 1));
        assert_eq!(id.to_string(), "RED 1");
    }

    #[test]
    fn test_blue_player() {
        let id = PlayerIdentity::from_robot_name("blue player 4").unwrap();
        assert_eq!(id.team, Team::Blue);
        assert_eq!(id.player, 4);
    }

    #[test]
    fn test_non_red_prefix_is_blue() {
        let id = PlayerIdentity::from_robot_name("Red 2").unwrap();
        assert_eq!(id.team, Team::Blue);
    }

    #[test]
    fn test_bare_number() {
        let id = PlayerIdentity::from_robot_name("3").unwrap();
        assert_eq!(id, PlayerIdentity::new(Team::Blue, 3));
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(
            PlayerIdentity::from_robot_name("   "),
            Err(IdentityError::EmptyName)
        );
        assert!(matches!(
            PlayerIdentity::from_robot_name("red player one"),
            Err(IdentityError::MissingPlayerNumber(_))
        ));
    }

    #[test]
    fn test_team_keys() {
        assert_eq!(Team::Red.as_str(), "red");
        assert_eq!(Team::Blue.as_str(), "blue");
    }
}
