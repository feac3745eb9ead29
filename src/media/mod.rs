pub(crate) mod audio;
pub(crate) mod probe;
