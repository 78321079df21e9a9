//! Remote execution session
//!
//! One authenticated SSH connection plus an attached SFTP sub-channel.
//! All operations run on the owning task; the session is not meant for
//! concurrent command submission, and state (current directory, history,
//! output, cache) is mutated only through `&mut self`.
//!
//! Operation failures surface as typed errors and leave the session
//! usable; only `connect()` itself moves the state machine to Failed, and
//! nothing retries automatically.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

use tether_core::config::{HostConfiguration, RemoteConfig};
use tether_core::error::RemoteError;
use tether_core::{ConnectionState, RemoteFile};

use crate::cache::DirectoryCache;
use crate::listing::{parent_path, remote_file, sort_entries};
use crate::state::{CommandHistory, OutputBuffer};

/// The command used to resolve the remote working directory
const DIRECTORY_QUERY: &str = "pwd";

/// One terminal/file-browser session against a remote host
pub struct RemoteSession {
    config: RemoteConfig,
    state: ConnectionState,
    handle: Option<Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
    current_dir: String,
    history: CommandHistory,
    output: OutputBuffer,
    cache: DirectoryCache,
}

impl RemoteSession {
    /// Create an idle session
    pub fn new(config: RemoteConfig) -> Self {
        let output = OutputBuffer::new(config.output_buffer_lines);
        let cache = DirectoryCache::new(config.cache_ttl);
        Self {
            config,
            state: ConnectionState::Disconnected,
            handle: None,
            sftp: None,
            current_dir: String::new(),
            history: CommandHistory::new(),
            output,
            cache,
        }
    }

    /// Current session state
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Tracked remote working directory (empty while disconnected)
    pub fn current_directory(&self) -> &str {
        &self.current_dir
    }

    /// Executed commands, oldest first, immediate repeats collapsed
    pub fn history(&self) -> &[String] {
        self.history.entries()
    }

    /// Bounded session output
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Open the SSH transport, authenticate, attach the SFTP sub-channel,
    /// and resolve the home directory.
    ///
    /// Never retries; any authentication or transport failure leaves the
    /// session Failed with the underlying reason, and a fresh `connect()`
    /// is the only way back.
    pub async fn connect(&mut self, host: HostConfiguration) -> Result<(), RemoteError> {
        self.state = ConnectionState::Connecting;
        info!("Connecting to {}@{}", host.username, host.address());

        match self.establish(&host).await {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!("Remote session established in {}", self.current_dir);

                // Warm the browser view; a listing failure is not fatal
                let home = self.current_dir.clone();
                if let Err(e) = self.list_directory(&home).await {
                    warn!("Initial listing of {} failed: {}", home, e);
                }
                Ok(())
            }
            Err(e) => {
                self.handle = None;
                self.sftp = None;
                self.state = ConnectionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn establish(&mut self, host: &HostConfiguration) -> Result<(), RemoteError> {
        let config = Arc::new(client::Config::default());
        let mut handle = client::connect(
            config,
            (host.hostname.as_str(), host.port),
            ClientHandler,
        )
        .await
        .map_err(transport_lost)?;

        let authenticated = handle
            .authenticate_password(&host.username, &host.password)
            .await
            .map_err(transport_lost)?;
        if !authenticated {
            return Err(RemoteError::AuthenticationFailed {
                user: host.username.clone(),
                host: host.hostname.clone(),
            });
        }

        let channel = handle.channel_open_session().await.map_err(transport_lost)?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(transport_lost)?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| RemoteError::TransportLost(e.to_string()))?;

        let home = run_command(&handle, DIRECTORY_QUERY).await?;
        let home = home.trim().to_string();
        if home.is_empty() {
            return Err(RemoteError::OperationFailed(
                "could not resolve home directory".to_string(),
            ));
        }

        self.handle = Some(handle);
        self.sftp = Some(sftp);
        self.current_dir = home;
        Ok(())
    }

    /// Run a command verbatim on the remote shell and capture its
    /// combined output.
    ///
    /// The command and its output land in the bounded output buffer; the
    /// command joins the history unless it repeats the previous entry. A
    /// `cd`-prefixed command triggers a follow-up directory query to
    /// resync the tracked working directory.
    pub async fn execute_command(&mut self, command: &str) -> Result<String, RemoteError> {
        let handle = self.handle.as_ref().ok_or(RemoteError::NotConnected)?;

        let output = run_command(handle, command).await?;

        self.output
            .push_line(format!("{} {}", self.config.prompt, command));
        self.output.push_block(&output);
        self.history.push(command);

        if command == DIRECTORY_QUERY {
            let dir = output.trim();
            if !dir.is_empty() {
                self.current_dir = dir.to_string();
            }
        } else if command == "cd" || command.starts_with("cd ") {
            let queried = run_command(handle, DIRECTORY_QUERY).await?;
            let dir = queried.trim();
            if !dir.is_empty() {
                self.current_dir = dir.to_string();
                debug!("Working directory resynced to {}", dir);
            }
        }

        Ok(output)
    }

    /// List a remote directory.
    ///
    /// The path is canonicalized remotely; `.`/`..` entries are dropped
    /// and the rest sorted directories-first. Results are cached by
    /// canonical path, and a fresh cache hit skips the remote round trip.
    pub async fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        let sftp = self.sftp.as_ref().ok_or(RemoteError::NotConnected)?;

        let canonical = sftp.canonicalize(path).await.map_err(operation_failed)?;

        if let Some(cached) = self.cache.get(&canonical) {
            trace!("Directory cache hit for {}", canonical);
            return Ok(cached.to_vec());
        }

        let read_dir = sftp.read_dir(&canonical).await.map_err(operation_failed)?;
        let mut entries = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            entries.push(remote_file(&canonical, &name, &entry.metadata()));
        }
        sort_entries(&mut entries);

        debug!("Listed {} entries in {}", entries.len(), canonical);
        self.cache.insert(canonical, entries.clone());
        Ok(entries)
    }

    /// Read a remote file's contents over the SFTP sub-channel
    pub async fn read_file(&mut self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let sftp = self.sftp.as_ref().ok_or(RemoteError::NotConnected)?;

        let mut file = sftp.open(path).await.map_err(operation_failed)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .await
            .map_err(operation_failed)?;
        Ok(data)
    }

    /// Write a remote file over the SFTP sub-channel, replacing any
    /// existing contents, and drop the parent's cached listing
    pub async fn write_file(&mut self, path: &str, data: &[u8]) -> Result<(), RemoteError> {
        let sftp = self.sftp.as_ref().ok_or(RemoteError::NotConnected)?;

        let mut file = sftp.create(path).await.map_err(operation_failed)?;
        file.write_all(data).await.map_err(operation_failed)?;
        file.shutdown().await.map_err(operation_failed)?;

        self.cache.invalidate(&parent_path(path));
        Ok(())
    }

    /// Remove a remote file or empty directory and drop the parent's
    /// cached listing
    pub async fn delete_file(&mut self, file: &RemoteFile) -> Result<(), RemoteError> {
        let sftp = self.sftp.as_ref().ok_or(RemoteError::NotConnected)?;

        if file.is_directory {
            sftp.remove_dir(&file.path).await.map_err(operation_failed)?;
        } else {
            sftp.remove_file(&file.path).await.map_err(operation_failed)?;
        }

        self.cache.invalidate(&parent_path(&file.path));
        debug!("Removed {}", file.path);
        Ok(())
    }

    /// Close the SFTP sub-channel, then the SSH transport, and reset
    /// session state. Idempotent.
    pub async fn disconnect(&mut self) {
        if let Some(sftp) = self.sftp.take() {
            let _ = sftp.close().await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "closing", "en")
                .await;
        }
        self.current_dir.clear();
        self.cache.clear();
        self.state = ConnectionState::Disconnected;
        debug!("Remote session disconnected");
    }
}

/// Execute one command over a fresh exec channel, draining combined
/// stdout/stderr until the channel closes
async fn run_command(
    handle: &Handle<ClientHandler>,
    command: &str,
) -> Result<String, RemoteError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(transport_lost)?;
    channel.exec(true, command).await.map_err(transport_lost)?;

    let mut output = Vec::new();
    loop {
        let Some(msg) = channel.wait().await else {
            break;
        };
        match msg {
            ChannelMsg::Data { ref data } => output.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
            _ => {}
        }
    }

    Ok(String::from_utf8_lossy(&output).into_owned())
}

fn transport_lost(e: impl std::fmt::Display) -> RemoteError {
    RemoteError::TransportLost(e.to_string())
}

fn operation_failed(e: impl std::fmt::Display) -> RemoteError {
    RemoteError::OperationFailed(e.to_string())
}

/// SSH client handler for the remote session.
///
/// Host key verification is out of scope for this layer; the transport's
/// security posture is delegated to the surrounding deployment.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        trace!("Server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}
