// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform endpoint the agent accepts connections on.

use std::io;

#[cfg(unix)]
pub(crate) use unix::Incoming;
#[cfg(windows)]
pub(crate) use windows::Incoming;

#[cfg(unix)]
mod unix {
    use super::io;
    use std::os::unix::fs::MetadataExt;
    use std::path::{Path, PathBuf};
    use tokio::net::{UnixListener, UnixStream};
    use tracing::{debug, warn};

    /// Unix domain socket endpoint
    pub(crate) struct Incoming {
        listener: UnixListener,
        path: PathBuf,
        /// `(dev, ino)` of the socket file this listener created
        file_id: Option<(u64, u64)>,
    }

    impl Incoming {
        pub fn bind(path: &Path) -> io::Result<Self> {
            let listener = UnixListener::bind(path)?;
            let file_id = file_id(path);
            Ok(Self { listener, path: path.to_path_buf(), file_id })
        }

        pub async fn accept(&mut self) -> io::Result<UnixStream> {
            let (stream, _) = self.listener.accept().await?;
            Ok(stream)
        }

        /// Stop listening and remove the socket file, unless another
        /// agent has since bound a new socket at the same path.
        pub fn close(self) {
            drop(self.listener);
            let replaced = self.file_id.is_none() || file_id(&self.path) != self.file_id;
            if replaced || answers(&self.path) {
                debug!(socket = %self.path.display(), "socket replaced, leaving it");
                return;
            }
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(socket = %self.path.display(), error = %e, "failed removing socket")
                }
            }
        }
    }

    /// Whether a listener other than ours is bound at `path`. Inode
    /// numbers can be reused as soon as our file is unlinked.
    fn answers(path: &Path) -> bool {
        match std::os::unix::net::UnixStream::connect(path) {
            Ok(_) => true,
            Err(e) => !matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ),
        }
    }

    fn file_id(path: &Path) -> Option<(u64, u64)> {
        let meta = std::fs::symlink_metadata(path).ok()?;
        Some((meta.dev(), meta.ino()))
    }
}

#[cfg(windows)]
mod windows {
    use super::io;
    use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};

    /// Named pipe endpoint. One server instance is kept waiting for the
    /// next client at all times.
    pub(crate) struct Incoming {
        name: String,
        next: NamedPipeServer,
    }

    impl Incoming {
        pub fn bind(name: &str) -> io::Result<Self> {
            let next = ServerOptions::new().first_pipe_instance(true).create(name)?;
            Ok(Self { name: name.to_string(), next })
        }

        pub async fn accept(&mut self) -> io::Result<NamedPipeServer> {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.name)?;
            Ok(std::mem::replace(&mut self.next, fresh))
        }

        pub fn close(self) {}
    }
}
