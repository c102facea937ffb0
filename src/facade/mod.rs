mod store;

pub use store::{Class, Store};
pub(crate) use store::StoreInner;
