//! Geometry serialization.

mod obj;

pub use obj::{write_obj, OBJ_HEADER};
