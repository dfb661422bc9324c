//! 检索层：语义检索后端的客户端抽象与实现（HTTP / 内置静态语料）

pub mod corpus;
pub mod http;
pub mod traits;

pub use corpus::StaticCorpus;
pub use http::HttpRetrievalClient;
pub use traits::{Document, Passage, RetrievalClient, RetrievalError};
