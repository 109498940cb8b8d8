pub mod config;
pub mod models;
pub mod query_ast;
pub mod query_tools;

pub use config::FlowConfig;
pub use query_ast::{
    FlowError, ParseError, DataSource, execution_catalog, open_source, parse_create_table,
    parse_execution_order, parse_select_query, simulate, visualize,
};
pub use query_tools::{detect_type, run_script, split_and_classify, split_statements};

/// Install the process-wide logger. `RUST_LOG` still wins when set; otherwise
/// the crate logs at `level` and dependencies stay at warn.
pub fn init_logging(level: &str) {
    let filter = level.parse().unwrap_or(log::LevelFilter::Info);
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("sqlflow", filter)
        .parse_default_env()
        .is_test(false)
        .try_init();
}
