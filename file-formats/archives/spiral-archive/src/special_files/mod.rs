//! Reserved entries that carry patcher metadata inside a container

mod priority_list;

pub use priority_list::{decode_priority_list, encode_priority_list};
