//! Small helpers shared by the exporters.

mod dot;

pub use dot::escape_dot;
