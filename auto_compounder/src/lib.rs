mod api;
mod canister;
mod cleanup;
mod compounder;
mod constants;
mod journal;
mod market;
mod port;
mod rate;
mod state;
mod timers;
mod types;
mod utils;

pub use canister::Compounder;
