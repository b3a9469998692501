pub mod db;
pub mod faq_llm;
pub mod identity;

pub use db::DbAdapter;
pub use faq_llm::OpenAiFaqAdapter;
pub use identity::TokenIdentityAdapter;
