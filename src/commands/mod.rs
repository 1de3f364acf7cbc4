pub type CmdResult<T> = hookline::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod config;
pub mod deploy;
pub mod plan;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (hookline::Result<serde_json::Value>, i32) {
    hookline::log_status!("hookline", "working...");

    match command {
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
