//! Text primitives.
//!
//! Offsets are UTF-8 byte offsets into a document's text and must fall on
//! character boundaries.

pub mod diff;
pub mod edit;
mod hash;
pub mod line_edit;
pub mod position;
pub mod range;
mod rooted;

pub use diff::{DEFAULT_CONTEXT_LINES, render_line_diff};
pub use edit::{Bias, Edit, Replacement, compose};
pub use hash::{Fnv1a, fnv1a_hash};
pub use line_edit::{LineEdit, LineReplacement};
pub use position::{LineIndex, LinePosition};
pub use range::OffsetRange;
pub use rooted::{RootedEdit, render_history};
