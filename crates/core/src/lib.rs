pub mod conversation;
pub mod intent;
pub mod llm_client;
pub mod prompts;
pub mod reply;
pub mod turn_taking;

pub use conversation::{ConversationState, Role, Turn};
pub use intent::{IntentClassifier, IntentTag};
pub use reply::ReplyGenerator;
pub use turn_taking::{MessageSink, TurnTaker, TurnTakingConfig};
