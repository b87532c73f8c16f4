pub mod answer_llm;
pub mod db;

pub use answer_llm::OpenAiAnswerAdapter;
pub use db::DbAdapter;
