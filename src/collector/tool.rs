// src/collector/tool.rs
//! Thin wrappers around the external cluster tools.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Output};

use crate::error::{CollectError, SetupError};

/// Function to check that every path exists and is an executable file.
pub fn check_executables(paths: &[&str]) -> Result<(), SetupError> {
    for path in paths {
        let metadata = fs::metadata(path).map_err(|_| SetupError::NotFound(path.to_string()))?;

        if metadata.is_dir() {
            return Err(SetupError::IsDirectory(path.to_string()));
        }
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(SetupError::NotExecutable(path.to_string()));
        }
    }

    Ok(())
}

/// Function to check that a plain file exists.
pub fn check_file(path: &str) -> Result<(), SetupError> {
    if fs::metadata(path).is_err() {
        return Err(SetupError::NotFound(path.to_string()));
    }
    Ok(())
}

fn spawn(path: &str, args: &[&str]) -> Result<Output, CollectError> {
    Command::new(path)
        .args(args)
        .output()
        .map_err(|e| CollectError::Execution {
            command: command_line(path, args),
            reason: e.to_string(),
        })
}

/// Function to run a tool and return its stdout whatever its exit status.
///
/// Used for tools that exit non-zero on benign conditions (a faulty ring
/// makes `corosync-cfgtool` return 1); the parser decides what is valid.
pub fn stdout_ignoring_status(path: &str, args: &[&str]) -> Result<Vec<u8>, CollectError> {
    Ok(spawn(path, args)?.stdout)
}

/// Function to run a tool and return its stdout, failing on a non-zero exit.
pub fn stdout(path: &str, args: &[&str]) -> Result<Vec<u8>, CollectError> {
    let output = spawn(path, args)?;

    if !output.status.success() {
        return Err(CollectError::Execution {
            command: command_line(path, args),
            reason: format!(
                "{} ({})",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(output.stdout)
}

/// Function to run a tool for its exit status and stdout. A tool that cannot
/// be started at all is reported as `None`.
pub fn status(path: &str, args: &[&str]) -> Option<(bool, Vec<u8>)> {
    Command::new(path)
        .args(args)
        .output()
        .ok()
        .map(|output| (output.status.success(), output.stdout))
}

fn command_line(path: &str, args: &[&str]) -> String {
    let mut line = path.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    /// Helper function to create a file with the given mode.
    fn create_file(dir: &TempDir, name: &str, mode: u32) -> String {
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_check_executables_ok() {
        let dir = TempDir::new().unwrap();
        let tool = create_file(&dir, "tool", 0o755);

        assert!(check_executables(&[&tool]).is_ok());
    }

    #[test]
    fn test_check_executables_missing() {
        let err = check_executables(&["/nonexistent/tool"]).unwrap_err();

        assert_eq!(err.to_string(), "'/nonexistent/tool' does not exist");
    }

    #[test]
    fn test_check_executables_not_executable() {
        let dir = TempDir::new().unwrap();
        let dummy = create_file(&dir, "dummy", 0o644);

        let err = check_executables(&[&dummy]).unwrap_err();
        assert_eq!(err.to_string(), format!("'{}' is not executable", dummy));
    }

    #[test]
    fn test_check_executables_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().into_owned();

        let err = check_executables(&[&path]).unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn test_stdout_reports_spawn_failure() {
        let err = stdout("/nonexistent/tool", &["-s"]).unwrap_err();

        assert!(matches!(err, CollectError::Execution { .. }));
        assert!(err.to_string().contains("/nonexistent/tool -s"));
    }
}
