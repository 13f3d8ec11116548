pub mod db;
pub mod kv;

pub use db::Db;
pub use kv::{Kv, SharedKv, memory::MemoryKv};
