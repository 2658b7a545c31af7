//! Reusable widgets shared by the views.

pub mod header;
