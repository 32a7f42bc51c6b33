//! Real host implementation backed by `std::process`, `nix` and `reqwest`.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use flate2::read::GzDecoder;
use log::debug;
use nix::sys::signal::{Signal, kill};
use nix::sys::statvfs::statvfs;
use nix::unistd::Pid;
use tar::Archive;

use super::{CommandOutput, Invocation, System};
use crate::error::SystemError;

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("webstack/", env!("CARGO_PKG_VERSION"));

/// The machine we are running on.
#[derive(Debug, Default)]
pub struct LinuxSystem;

impl LinuxSystem {
    pub fn new() -> Self {
        Self
    }

    fn client(timeout: Duration) -> Result<reqwest::blocking::Client, reqwest::Error> {
        reqwest::blocking::Client::builder()
            .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
    }
}

impl System for LinuxSystem {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, SystemError> {
        let spawn_err = |source| SystemError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command.spawn().map_err(spawn_err)?;

        if let Some(input) = &invocation.stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes()).map_err(spawn_err)?;
            // dropping the pipe closes stdin
        }

        let output = child.wait_with_output().map_err(spawn_err)?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn command_exists(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }

    fn is_superuser(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<(), SystemError> {
        let download_err = |message: String| SystemError::Download {
            url: url.to_string(),
            message,
        };

        let client = Self::client(DOWNLOAD_TIMEOUT).map_err(|e| download_err(e.to_string()))?;
        let mut response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_err(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| SystemError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = fs::File::create(dest).map_err(|source| SystemError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| download_err(e.to_string()))?;
        debug!("downloaded {bytes} bytes from {url} to {}", dest.display());
        Ok(())
    }

    fn extract_tar_gz(
        &self,
        archive: &Path,
        dest: &Path,
        strip: usize,
    ) -> Result<(), SystemError> {
        let extract_err = |message: String| SystemError::Extract {
            archive: archive.to_path_buf(),
            message,
        };

        let file = fs::File::open(archive).map_err(|source| SystemError::Io {
            path: archive.to_path_buf(),
            source,
        })?;
        fs::create_dir_all(dest).map_err(|source| SystemError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        let mut tar = Archive::new(GzDecoder::new(file));
        let entries = tar.entries().map_err(|e| extract_err(e.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| extract_err(e.to_string()))?;
            let path = entry.path().map_err(|e| extract_err(e.to_string()))?;
            let Some(relative) = strip_components(&path, strip) else {
                continue;
            };
            let target = dest.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| SystemError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            entry
                .unpack(&target)
                .map_err(|e| extract_err(format!("{}: {e}", target.display())))?;
        }
        Ok(())
    }

    fn terminate(&self, pid: i32) -> Result<(), SystemError> {
        kill(Pid::from_raw(pid), Signal::SIGKILL).map_err(|e| SystemError::Signal {
            pid,
            message: e.to_string(),
        })
    }

    fn free_disk_bytes(&self, path: &Path) -> Result<u64, SystemError> {
        let stat = statvfs(path).map_err(|e| SystemError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::from(e),
        })?;
        Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
    }

    fn probe(&self, host: &str) -> bool {
        let Ok(client) = Self::client(PROBE_TIMEOUT) else {
            return false;
        };
        client.head(format!("https://{host}")).send().is_ok()
    }
}

/// Drop `count` leading components; `None` for entries that vanish entirely
/// or try to escape the destination.
fn strip_components(path: &Path, count: usize) -> Option<PathBuf> {
    let mut kept = PathBuf::new();
    for component in path.components().skip(count) {
        match component {
            Component::Normal(part) => kept.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if kept.as_os_str().is_empty() {
        None
    } else {
        Some(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_components_drops_leading_directory() {
        assert_eq!(
            strip_components(Path::new("phpMyAdmin-5.2.1/index.php"), 1),
            Some(PathBuf::from("index.php"))
        );
        assert_eq!(strip_components(Path::new("phpMyAdmin-5.2.1/"), 1), None);
        assert_eq!(strip_components(Path::new("a/../../etc/passwd"), 1), None);
    }

    #[test]
    fn extracts_tarball_with_stripping() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pma.tar.gz");
        {
            let file = fs::File::create(&archive).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let body = b"<?php echo 1;";
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "phpMyAdmin-5.2.1/index.php", &body[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("out");
        LinuxSystem::new()
            .extract_tar_gz(&archive, &dest, 1)
            .unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("index.php")).unwrap(),
            "<?php echo 1;"
        );
    }

    #[test]
    fn captures_exit_code_and_output() {
        let system = LinuxSystem::new();
        let out = system
            .run(&Invocation::new("sh").args(["-c", "read x; echo got $x; exit 3"]).stdin("hi\n"))
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "got hi");
    }
}
