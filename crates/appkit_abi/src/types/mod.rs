pub(crate) mod collections;
mod primitives;
