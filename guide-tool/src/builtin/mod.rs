mod exit_loop;

pub use exit_loop::{DONE_STATUS, EXIT_LOOP_TOOL, ExitLoopTool, is_termination_signal};
