pub mod web;
pub use web::{search_context, web_search};
