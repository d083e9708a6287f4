// commands - One module per `iac` subcommand.

pub mod graph;
pub mod list_policies;
pub mod run;
