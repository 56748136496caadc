use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A user's opinion of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            other => Err(format!("Unknown reaction: {}", other)),
        }
    }
}

/// Stored reaction; at most one per (video, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reaction {
    pub video_id: Uuid,
    pub user_id: String,
    pub reaction: ReactionKind,
}

/// Request body for setting a reaction
#[derive(Debug, Deserialize)]
pub struct SetReactionRequest {
    pub reaction: ReactionKind,
}

/// Reaction counts for one video plus the caller's own reaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReactionSummary {
    pub likes: u64,
    pub dislikes: u64,
    pub user_reaction: Option<ReactionKind>,
}

impl ReactionSummary {
    /// Aggregate the reaction rows of a single video
    pub fn from_reactions(reactions: &[Reaction], user_id: &str) -> Self {
        reactions
            .iter()
            .fold(ReactionSummary::default(), |mut summary, r| {
                match r.reaction {
                    ReactionKind::Like => summary.likes += 1,
                    ReactionKind::Dislike => summary.dislikes += 1,
                }
                if r.user_id == user_id {
                    summary.user_reaction = Some(r.reaction);
                }
                summary
            })
    }
}
