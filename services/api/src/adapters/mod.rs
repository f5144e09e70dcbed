pub mod advisor_llm;
pub mod db;

pub use advisor_llm::{AdvisorModels, OpenAiAdvisorAdapter};
pub use db::DbAdapter;
