pub(crate) mod item;
pub(crate) mod layout;
pub(crate) mod scheduler;
