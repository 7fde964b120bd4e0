mod config_tests;
mod factor_graph_builder_tests;
mod scheduler_tests;
mod uai_tests;
mod utils;
