pub mod registry;
pub mod repl;
pub mod session;
pub mod turn;
