pub mod items;

pub use items::{ItemListParams, PartitionKeyQuery};
