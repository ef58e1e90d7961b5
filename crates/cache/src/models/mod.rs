mod item;

pub use self::item::{Candidate, TypeCount};
pub(crate) use self::item::ItemRow;
