// Linear algebra primitives

pub mod matrix;

pub use matrix::Matrix;
