pub mod chatbot_engine;
pub mod message_handler;

pub use chatbot_engine::ChatbotEngine;
pub use message_handler::MessageHandler;
