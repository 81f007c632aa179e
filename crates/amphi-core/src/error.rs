use std::fmt;

/// Why a join request was declined. No state changes on rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRejection {
    NotInLobby,
    NameTaken,
    InvalidName,
    AlreadyJoined,
}

impl fmt::Display for JoinRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInLobby => write!(f, "game already in progress"),
            Self::NameTaken => write!(f, "name already taken"),
            Self::InvalidName => write!(f, "name required (1-32 characters)"),
            Self::AlreadyJoined => write!(f, "already joined"),
        }
    }
}

impl std::error::Error for JoinRejection {}

/// Why a start command was declined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartRejection {
    NotInLobby,
    NotEnoughParticipants { joined: usize, required: usize },
}

impl fmt::Display for StartRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInLobby => write!(f, "game already in progress"),
            Self::NotEnoughParticipants { joined, required } => {
                write!(f, "need at least {required} participants, have {joined}")
            },
        }
    }
}

impl std::error::Error for StartRejection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_display() {
        assert_eq!(JoinRejection::NameTaken.to_string(), "name already taken");
        assert_eq!(
            StartRejection::NotEnoughParticipants {
                joined: 1,
                required: 2
            }
            .to_string(),
            "need at least 2 participants, have 1"
        );
    }
}
