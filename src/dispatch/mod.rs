//! Command dispatch
//!
//! - `rules`: the ordered phrase table and `classify`
//! - `dispatcher`: turn execution (mode switch, exit, built-in, fallback)
//! - `actions`: built-in action bodies and their spoken responses
//! - `host`: the OS side effects behind built-in actions

pub mod actions;
pub mod dispatcher;
pub mod host;
pub mod rules;

pub use actions::ActionRunner;
pub use dispatcher::CommandDispatcher;
pub use host::{ActionError, HostActions, PowerAction, SystemHost, VolumeStep};
pub use rules::{classify, rules, Builtin, Route, Rule};
