//! Command implementations for the gymlink binary

use std::io::Write;

use tracing::info;

use gymlink_protocol::JsonValue;

use crate::cli::Command;
use crate::{Address, ClientConfig, Env, EnvError};

/// Totals for one finished episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub reward: f64,
}

/// Run a command and return the process exit code
pub fn execute(
    command: Command,
    addr: Option<String>,
    env: Option<String>,
) -> Result<i32, EnvError> {
    let config = ClientConfig::load()?;
    let addr = Address::parse(&config.resolve_address(addr.as_deref()))?;
    let env_name = config.resolve_env(env.as_deref())?;
    let env = Env::connect_to(&addr, &env_name, config.read_timeout())?;
    let mut out = std::io::stdout().lock();

    match command {
        Command::Spaces => spaces(&env, &mut out)?,
        Command::Sample { count } => sample(&env, count, &mut out)?,
        Command::Rollout {
            episodes,
            max_steps,
            render,
            monitor,
            force,
            resume,
            video,
        } => {
            if let Some(dir) = monitor {
                env.monitor(dir, force, resume, video)?;
            }
            rollout(&env, episodes, max_steps, render, &mut out)?;
        }
    }

    env.close();
    Ok(0)
}

/// Print both spaces as one pretty JSON document
pub fn spaces<W: Write>(env: &Env, out: &mut W) -> Result<(), EnvError> {
    let spaces = serde_json::json!({
        "action": env.action_space()?,
        "observation": env.observation_space()?,
    });
    writeln!(out, "{:#}", spaces)?;
    Ok(())
}

/// Print `count` sampled actions, one JSON value per line
pub fn sample<W: Write>(env: &Env, count: usize, out: &mut W) -> Result<(), EnvError> {
    for _ in 0..count {
        let action: JsonValue = env.sample_action()?;
        writeln!(out, "{}", action)?;
    }
    Ok(())
}

/// Drive `episodes` episodes with sampled actions
///
/// An episode ends when the environment reports done or after `max_steps`
/// steps, whichever comes first.
pub fn rollout<W: Write>(
    env: &Env,
    episodes: usize,
    max_steps: usize,
    render: bool,
    out: &mut W,
) -> Result<Vec<EpisodeSummary>, EnvError> {
    let mut summaries = Vec::with_capacity(episodes);

    for episode in 0..episodes {
        env.reset()?;
        let mut summary = EpisodeSummary {
            steps: 0,
            reward: 0.0,
        };

        while summary.steps < max_steps {
            let action: JsonValue = env.sample_action()?;
            if render {
                env.render()?;
            }
            let step = env.step(&action)?;
            summary.reward += step.reward;
            summary.steps += 1;
            if step.done {
                break;
            }
        }

        info!(episode, steps = summary.steps, reward = summary.reward, "episode finished");
        writeln!(
            out,
            "episode {}: reward {} over {} steps",
            episode, summary.reward, summary.steps
        )?;
        summaries.push(summary);
    }

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    use bytes::Bytes;
    use gymlink_protocol::{codec, Observation, PacketType};
    use serde_json::json;

    fn field(data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        codec::put_byte_field(&mut buf, data).unwrap();
        buf
    }

    fn observation() -> Vec<u8> {
        let mut buf = Vec::new();
        let obs = Observation::Json(Bytes::from_static(b"[0]"));
        codec::put_observation(&mut buf, &obs).unwrap();
        buf
    }

    /// Fake server answering every request until the client hangs up
    ///
    /// Steps pop `(reward, done)` pairs from `steps`. The handle yields the
    /// packet types received, in order.
    fn spawn_server(steps: Vec<(f64, bool)>) -> (String, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("tcp://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            serve(&mut stream, steps.into())
        });
        (addr, handle)
    }

    fn serve(stream: &mut TcpStream, mut steps: VecDeque<(f64, bool)>) -> Vec<u8> {
        codec::read_u8(stream).unwrap();
        codec::read_byte_field(stream).unwrap();
        stream.write_all(&[0, 0, 0, 0]).unwrap();

        let mut packets = Vec::new();
        while let Ok(packet) = codec::read_u8(stream) {
            packets.push(packet);
            let response = match PacketType::try_from(packet).unwrap() {
                PacketType::Reset => observation(),
                PacketType::Step => {
                    codec::read_action(stream).unwrap();
                    let (reward, done) = steps.pop_front().unwrap();
                    let mut buf = observation();
                    codec::put_reward(&mut buf, reward);
                    codec::put_bool(&mut buf, done);
                    buf.extend(field(b""));
                    buf
                }
                PacketType::GetSpace => match codec::read_u8(stream).unwrap() {
                    0 => field(br#"{"type": "Discrete", "n": 2}"#),
                    _ => field(br#"{"type": "MultiBinary", "n": 4}"#),
                },
                PacketType::SampleAction => {
                    let mut buf = vec![0];
                    buf.extend(field(b"1"));
                    buf
                }
                PacketType::Render => Vec::new(),
                other => panic!("unexpected packet: {:?}", other),
            };
            stream.write_all(&response).unwrap();
        }
        packets
    }

    #[test]
    fn test_rollout_stops_on_done_and_max_steps() {
        let steps = vec![(1.0, false), (2.0, true), (1.0, false), (0.5, false), (1.0, false)];
        let (addr, server) = spawn_server(steps);
        let env = Env::connect(&addr, "CartPole-v0").unwrap();

        let mut out: Vec<u8> = Vec::new();
        let summaries = rollout(&env, 2, 3, false, &mut out).unwrap();
        env.close();

        assert_eq!(
            summaries,
            vec![
                EpisodeSummary {
                    steps: 2,
                    reward: 3.0
                },
                EpisodeSummary {
                    steps: 3,
                    reward: 2.5
                },
            ]
        );
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "episode 0: reward 3 over 2 steps\nepisode 1: reward 2.5 over 3 steps\n"
        );
        assert_eq!(server.join().unwrap(), vec![0, 3, 1, 3, 1, 0, 3, 1, 3, 1, 3, 1]);
    }

    #[test]
    fn test_rollout_renders_before_each_step() {
        let (addr, server) = spawn_server(vec![(1.0, false), (1.0, true)]);
        let env = Env::connect(&addr, "CartPole-v0").unwrap();

        let summaries = rollout(&env, 1, 10, true, &mut Vec::<u8>::new()).unwrap();
        env.close();

        assert_eq!(summaries[0].steps, 2);
        assert_eq!(server.join().unwrap(), vec![0, 3, 5, 1, 3, 5, 1]);
    }

    #[test]
    fn test_spaces_prints_both() {
        let (addr, server) = spawn_server(Vec::new());
        let env = Env::connect(&addr, "CartPole-v0").unwrap();

        let mut out: Vec<u8> = Vec::new();
        spaces(&env, &mut out).unwrap();
        env.close();

        let printed: JsonValue = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            printed,
            json!({
                "action": {"type": "Discrete", "n": 2},
                "observation": {"type": "MultiBinary", "n": 4},
            })
        );
        assert_eq!(server.join().unwrap(), vec![2, 2]);
    }

    #[test]
    fn test_sample_prints_one_action_per_line() {
        let (addr, server) = spawn_server(Vec::new());
        let env = Env::connect(&addr, "CartPole-v0").unwrap();

        let mut out: Vec<u8> = Vec::new();
        sample(&env, 3, &mut out).unwrap();
        env.close();

        assert_eq!(String::from_utf8(out).unwrap(), "1\n1\n1\n");
        assert_eq!(server.join().unwrap(), vec![3, 3, 3]);
    }

    #[test]
    fn test_rollout_with_zero_episodes_sends_nothing() {
        let (addr, server) = spawn_server(Vec::new());
        let env = Env::connect(&addr, "CartPole-v0").unwrap();

        let summaries = rollout(&env, 0, 10, false, &mut Vec::<u8>::new()).unwrap();
        env.close();

        assert!(summaries.is_empty());
        assert!(server.join().unwrap().is_empty());
    }
}
