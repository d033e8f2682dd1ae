//! Integration tests for the capture agent

mod support;
mod test_idle;
mod test_run;
mod test_select;
