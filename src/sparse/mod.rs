mod cursor;
mod vector;

pub use cursor::{SparseCursor, SparseCursorMut};
pub use vector::{IntoIter, Iter, IterMut, SparseVector};
