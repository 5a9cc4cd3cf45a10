//! Blocking client for a remote environment
//!
//! An [`Env`] owns one connection. Every method runs a complete
//! request/response exchange while holding the connection lock, so an
//! `Env` shared between threads never interleaves bytes on the wire.
//!
//! Responses are read in full before any part of them is interpreted. A
//! decode error in the payload therefore leaves the stream positioned at
//! the next response and the connection usable. I/O failures and anything
//! else that loses track of the framing mark the connection unusable, and
//! every later call fails with [`EnvError::ConnectionUnusable`].

use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::Encoder;
use tracing::{debug, trace, warn};

use gymlink_protocol::codec;
use gymlink_protocol::{
    Action, CodecError, JsonMap, JsonValue, Observation, PacketType, Request, RequestCodec, Space,
    SpaceId, HANDSHAKE_OPERATION,
};

use crate::address::{Address, Stream};
use crate::error::EnvError;


/// Outcome of a single step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    /// Diagnostic document; `Null` when the server sent an empty field
    pub info: JsonValue,
}

/// Stream plus the per-connection encode state
struct Connection<S> {
    reader: BufReader<S>,
    codec: RequestCodec,
    write_buf: BytesMut,
    usable: bool,
}

impl<S: Read + Write> Connection<S> {
    fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
            codec: RequestCodec::new(),
            write_buf: BytesMut::with_capacity(256),
            usable: true,
        }
    }

    /// Send one request and read its response with `read`
    fn transact<T>(
        &mut self,
        request: Request,
        read: impl FnOnce(&mut BufReader<S>) -> Result<T, EnvError>,
    ) -> Result<T, EnvError> {
        if !self.usable {
            return Err(EnvError::ConnectionUnusable);
        }

        let op = request.name();
        let expects_response = request.expects_response();
        self.send(op, request)?;
        if expects_response {
            trace!(op, "awaiting response");
        }

        let result = read(&mut self.reader);
        if let Err(err) = &result {
            if err.breaks_framing() {
                self.poison(op, err);
            }
        }
        result
    }

    fn send(&mut self, op: &'static str, request: Request) -> Result<(), EnvError> {
        self.write_buf.clear();
        // Nothing has been written yet, so an encode failure is harmless.
        self.codec.encode(request, &mut self.write_buf)?;

        let stream = self.reader.get_mut();
        let written = stream
            .write_all(&self.write_buf)
            .and_then(|()| stream.flush());
        if let Err(e) = written {
            let err = EnvError::Io(e);
            self.poison(op, &err);
            return Err(err);
        }
        trace!(op, bytes = self.write_buf.len(), "request sent");
        Ok(())
    }

    fn poison(&mut self, op: &'static str, err: &EnvError) {
        warn!(op, error = %err, "connection no longer usable");
        self.usable = false;
    }
}

/// Handle on one environment hosted by a remote server
///
/// `S` is the underlying byte stream; connections dialed through
/// [`Env::connect`] use a boxed [`Stream`].
pub struct Env<S = Box<dyn Stream>> {
    conn: Mutex<Connection<S>>,
    env_name: String,
}

impl Env {
    /// Dial `addr` and create the environment `env_name`
    ///
    /// An empty `env_name` asks the server not to create an environment.
    pub fn connect(addr: &str, env_name: &str) -> Result<Self, EnvError> {
        let addr =
            Address::parse(addr).map_err(|e| EnvError::from(e).context(HANDSHAKE_OPERATION))?;
        Self::connect_to(&addr, env_name, None)
    }

    /// Like [`Env::connect`] with a parsed address and an optional bound
    /// on each blocking read
    pub fn connect_to(
        addr: &Address,
        env_name: &str,
        read_timeout: Option<Duration>,
    ) -> Result<Self, EnvError> {
        debug!("Connecting to {} for environment '{}'", addr, env_name);
        let stream = addr
            .connect(read_timeout)
            .map_err(|e| EnvError::from(e).context(HANDSHAKE_OPERATION))?;
        Self::handshake(stream, env_name)
    }
}

impl<S: Read + Write> Env<S> {
    /// Run the handshake over an already-open stream
    ///
    /// The stream is dropped, and so closed, if the server rejects the
    /// environment.
    pub fn handshake(stream: S, env_name: &str) -> Result<Self, EnvError> {
        let mut conn = Connection::new(stream);
        let request = Request::Handshake {
            env_name: env_name.to_string(),
        };
        conn.transact(request, |r| match codec::read_error_field(r)? {
            None => Ok(()),
            Some(msg) => Err(EnvError::HandshakeRejected(msg)),
        })
        .map_err(|e| e.context(HANDSHAKE_OPERATION))?;

        debug!("Environment '{}' ready", env_name);
        Ok(Self {
            conn: Mutex::new(conn),
            env_name: env_name.to_string(),
        })
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// Whether the connection can still carry requests
    pub fn is_usable(&self) -> bool {
        self.conn.lock().usable
    }

    /// Reset the environment and return the initial observation
    pub fn reset(&self) -> Result<Observation, EnvError> {
        self.exchange(Request::Reset, |r| Ok(codec::read_observation(r)?))
    }

    /// Apply `action` and advance the environment one step
    ///
    /// The action is serialized as JSON.
    pub fn step<A: Serialize + ?Sized>(&self, action: &A) -> Result<Step, EnvError> {
        let action = Action::from_value(action)
            .map_err(|e| EnvError::from(e).context(PacketType::Step.operation_name()))?;
        self.exchange(Request::Step { action }, read_step)
    }

    pub fn action_space(&self) -> Result<Space, EnvError> {
        self.space(SpaceId::Action)
    }

    pub fn observation_space(&self) -> Result<Space, EnvError> {
        self.space(SpaceId::Observation)
    }

    /// Ask the server for a random legal action
    pub fn sample_action<T: DeserializeOwned>(&self) -> Result<T, EnvError> {
        self.exchange(Request::SampleAction, |r| {
            let action = codec::read_action(r)?;
            Ok(action.decode()?)
        })
    }

    /// Start recording episodes into `dir` on the server host
    ///
    /// Relative paths are resolved against the current directory first.
    pub fn monitor(
        &self,
        dir: impl AsRef<Path>,
        force: bool,
        resume: bool,
        video: bool,
    ) -> Result<(), EnvError> {
        let dir = absolute_utf8(dir.as_ref())
            .map_err(|e| e.context(PacketType::Monitor.operation_name()))?;
        let request = Request::Monitor {
            dir,
            force,
            resume,
            video,
        };
        self.exchange(request, read_status)
    }

    /// Ask the server to draw the environment. No response is awaited.
    pub fn render(&self) -> Result<(), EnvError> {
        self.exchange(Request::Render, |_| Ok(()))
    }

    /// Upload monitor results recorded in `dir`
    pub fn upload(
        &self,
        dir: impl AsRef<Path>,
        api_key: &str,
        algorithm_id: Option<&str>,
    ) -> Result<(), EnvError> {
        let dir = absolute_utf8(dir.as_ref())
            .map_err(|e| e.context(PacketType::Upload.operation_name()))?;
        let request = Request::Upload {
            dir,
            api_key: api_key.to_string(),
            algorithm_id: algorithm_id.map(str::to_string),
        };
        self.exchange(request, read_status)
    }

    pub fn universe_configure(&self, options: Option<JsonMap>) -> Result<(), EnvError> {
        let request = Request::UniverseConfigure {
            options: options.unwrap_or_default(),
        };
        self.exchange(request, read_status)
    }

    pub fn universe_wrap(&self, wrapper: &str, options: Option<JsonMap>) -> Result<(), EnvError> {
        let request = Request::UniverseWrap {
            wrapper: wrapper.to_string(),
            options: options.unwrap_or_default(),
        };
        self.exchange(request, read_status)
    }

    pub fn retro_configure(&self, options: Option<JsonMap>) -> Result<(), EnvError> {
        let request = Request::RetroConfigure {
            options: options.unwrap_or_default(),
        };
        self.exchange(request, read_status)
    }

    pub fn retro_wrap(&self, wrapper: &str, options: Option<JsonMap>) -> Result<(), EnvError> {
        let request = Request::RetroWrap {
            wrapper: wrapper.to_string(),
            options: options.unwrap_or_default(),
        };
        self.exchange(request, read_status)
    }

    /// Release the environment and hand back the stream
    pub fn into_stream(self) -> S {
        self.conn.into_inner().reader.into_inner()
    }

    /// Close the connection
    pub fn close(self) {
        debug!("Closing environment '{}'", self.env_name);
        drop(self.into_stream());
    }

    fn space(&self, space: SpaceId) -> Result<Space, EnvError> {
        self.exchange(Request::GetSpace { space }, |r| {
            let document = codec::read_byte_field(r)?;
            serde_json::from_slice(&document).map_err(EnvError::MalformedSpace)
        })
    }

    fn exchange<T>(
        &self,
        request: Request,
        read: impl FnOnce(&mut BufReader<S>) -> Result<T, EnvError>,
    ) -> Result<T, EnvError> {
        let op = request.name();
        debug!(op, env = %self.env_name, "sending request");
        let mut conn = self.conn.lock();
        conn.transact(request, read).map_err(|e| e.context(op))
    }
}

fn read_step<R: Read>(src: &mut R) -> Result<Step, EnvError> {
    let frame = codec::read_observation_frame(src)?;
    let reward = codec::read_reward(src)?;
    let done = codec::read_u8(src)?;
    let info = codec::read_byte_field(src)?;

    // Whole response consumed; from here on errors keep the framing intact.
    let observation = frame.decode()?;
    let done = codec::bool_from_byte(done)?;
    let info = if info.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&info).map_err(CodecError::from)?
    };

    Ok(Step {
        observation,
        reward,
        done,
        info,
    })
}

/// Read an error field, mapping a non-empty message to [`EnvError::Remote`]
fn read_status<R: Read>(src: &mut R) -> Result<(), EnvError> {
    match codec::read_error_field(src)? {
        None => Ok(()),
        Some(msg) => Err(EnvError::Remote(msg)),
    }
}

fn absolute_utf8(path: &Path) -> Result<String, EnvError> {
    let absolute = std::path::absolute(path).map_err(|e| EnvError::InvalidPath {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    absolute
        .into_os_string()
        .into_string()
        .map_err(|_| EnvError::InvalidPath {
            path: path.to_path_buf(),
            reason: "not valid UTF-8".into(),
        })
}
