pub mod activity;
pub mod reaction;
pub mod topic;
pub mod video;

pub use activity::{ActivityType, AuditRefs};
pub use reaction::{Reaction, ReactionKind, ReactionSummary, SetReactionRequest};
pub use topic::{NewTopic, Topic, TopicUpdate};
pub use video::{NewVideo, Video, VideoUpdate};
