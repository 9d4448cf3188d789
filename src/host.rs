use std::net::TcpListener;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};

/// Handle to the `ttyd` process serving the live terminal over a local
/// port. The session owns this handle exclusively and kills it exactly
/// once at teardown.
pub struct TerminalHost {
    port: u16,
    child: Child,
}

impl TerminalHost {
    /// Spawns `ttyd` on a free local port serving an interactive shell.
    pub fn spawn() -> Result<Self> {
        let port = free_port()?;
        let child = Command::new("ttyd")
            .args(["--port", &port.to_string()])
            .args(["--interface", "127.0.0.1"])
            .arg("--writable")
            .arg("bash")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to start ttyd (is it installed?)")?;
        Ok(Self { port, child })
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Force-kills the host process.
    pub fn kill(mut self) -> Result<()> {
        self.child
            .kill()
            .context("failed to kill terminal host process")
    }
}

fn free_port() -> Result<u16> {
    let listener =
        TcpListener::bind(("127.0.0.1", 0)).context("failed to probe for a free port")?;
    let port = listener
        .local_addr()
        .context("failed to read probe socket address")?
        .port();
    Ok(port)
}
