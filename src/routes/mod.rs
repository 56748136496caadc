pub mod actor;
pub mod health;
pub mod stream;
pub mod topics;
pub mod videos;

pub use actor::Actor;
pub use health::health_check;
pub use stream::stream_video;
pub use topics::{create_topic, delete_topic, get_topic, list_topics, update_topic};
pub use videos::{
    clear_reaction, create_video, delete_video, get_video, list_topic_videos, set_reaction,
    update_video, upload_video, upload_video_to_topic,
};
