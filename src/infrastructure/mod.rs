//! 基础设施层
//!
//! 持有稀缺资源（HTTP Client、地址栏），只暴露能力

pub mod address_bar;
pub mod http_executor;
pub mod url_state;

pub use address_bar::AddressBar;
pub use http_executor::{fetch_json, HttpExecutor, StatusTransport};
pub use url_state::UrlStateManager;
