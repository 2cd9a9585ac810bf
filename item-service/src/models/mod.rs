pub mod item;

pub use item::{update_partition_key, validate_item_id, Item};
