//! Integration tests: commands and heartbeat sweeps against mock
//! collaborators.

mod commands;
mod heartbeat;
mod mock_api;
