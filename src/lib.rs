/// A module containing configuration of tightening and model runs
pub mod config;
/// A module containing general logic of dual decomposition factor graphs: equality messages, builders and tightening
pub mod core;
/// A module containing simplex factors, their messages and a search of violated cycle inequalities
pub mod mrf;
/// A module containing a reader of UAI model files
pub mod uai;

#[cfg(test)]
mod tests;
