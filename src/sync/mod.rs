//! Internal synchronization utilities.

pub(crate) use head::HeadCell;

mod head;
