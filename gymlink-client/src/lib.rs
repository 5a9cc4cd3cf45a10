//! gymlink-client: Blocking client for remote environments
//!
//! Connects to a gymlink server, creates a named environment, and drives it
//! through reset, step, and the auxiliary operations of the protocol.
//!
//! ```no_run
//! use gymlink_client::Env;
//!
//! let env = Env::connect("tcp://127.0.0.1:5001", "CartPole-v0")?;
//! env.reset()?;
//! let step = env.step(&0)?;
//! println!("reward {}", step.reward);
//! env.close();
//! # Ok::<(), gymlink_client::EnvError>(())
//! ```

pub mod address;
pub mod cli;
pub mod commands;
pub mod config;
pub mod env;
pub mod error;

pub use address::{Address, Stream};
pub use config::ClientConfig;
pub use env::{Env, Step};
pub use error::EnvError;

pub use gymlink_protocol::{JsonMap, JsonValue, Observation, Space};
