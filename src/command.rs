//! External command execution

use crate::error::{NetplanError, NetplanResult};
use tokio::process::Command;
use tracing::debug;

/// Run `program args...` and return stdout; non-zero exit is an error.
pub async fn run(program: &str, args: &[&str]) -> NetplanResult<String> {
    let cmd_str = command_line(program, args);
    debug!("Running: {}", cmd_str);

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| NetplanError::CommandFailed {
            cmd: cmd_str.clone(),
            code: None,
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(NetplanError::CommandFailed {
            cmd: cmd_str,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Whether `program args...` exits successfully. Spawn failures count as no.
pub async fn succeeds(program: &str, args: &[&str]) -> bool {
    match Command::new(program).args(args).output().await {
        Ok(output) => output.status.success(),
        Err(e) => {
            debug!("{} could not be started: {}", command_line(program, args), e);
            false
        }
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
