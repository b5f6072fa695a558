//! Integration tests for the GameHub extension runtime.

mod helpers;

mod dispatcher_test;
mod plugin_test;
mod scheduler_test;
