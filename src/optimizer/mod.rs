//! # Optimizer Module
//!
//! - `tools`: tipi di optimizer esterni e posizionamento degli argomenti
//! - `chain`: esecuzione ordinata della catena su una copia di lavoro

pub mod chain;
pub mod tools;

pub use chain::{OptimizeOutcome, OptimizerChain};
pub use tools::{OptimizerEntry, OptimizerTool};
