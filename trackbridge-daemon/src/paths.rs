use std::path::{Path, PathBuf};

use trackbridge_core::config::bridge_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

/// `<home>/.trackbridge/daemon.sock`
pub fn socket_path(home: &Path) -> PathBuf {
    bridge_root(home).join(DAEMON_SOCKET)
}
