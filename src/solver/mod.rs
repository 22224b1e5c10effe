//! Solvers consuming the grid data plane.

pub mod fdtd;

pub use fdtd::FdtdSolver;
