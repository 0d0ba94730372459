pub mod db;
pub mod model;

pub use db::{ConsumeResult, Store};
pub use model::SecretRecord;
