//! Test fixtures for integration tests
//!
//! Provides a stand-in for yt-dlp so the full request path can run without
//! network access. The script picks its behaviour from the URL it is given:
//!
//! | URL contains | metadata                  | download                    |
//! |--------------|---------------------------|-----------------------------|
//! | `private`    | exits 1 (private video)   | -                           |
//! | `long`       | 600 s, quoted title       | echoes URL                  |
//! | `audio50`    | 50 s                      | echoes URL                  |
//! | `unknown`    | no duration               | echoes URL                  |
//! | `endless`    | 10 s                      | writes zeros until killed   |
//! | `broken`     | 10 s                      | partial output, exits 1     |
//! | anything else| 120 s, non-ASCII title    | echoes URL                  |

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use crate::config::ServerConfig;

const FAKE_YTDLP: &str = r#"#!/bin/sh
dir=$(dirname "$0")
for last; do :; done

case " $* " in
  *" --version "*) echo "2099.01.01"; exit 0 ;;
esac

case " $* " in
  *" --dump-single-json "*)
    case "$last" in
      *private*) echo "ERROR: [youtube] abc: Private video" >&2; exit 1 ;;
      *long*) printf '{"title":"Long \\"Talk\\"","duration":600}' ;;
      *audio50*) printf '{"title":"Song","duration":50}' ;;
      *unknown*) printf '{"title":"No Duration"}' ;;
      *endless*) printf '{"title":"Endless","duration":10}' ;;
      *broken*) printf '{"title":"Broken","duration":10}' ;;
      *) printf '{"title":"Caf\\u00e9 Clip","duration":120.0}' ;;
    esac
    exit 0 ;;
esac

printf '%s\n' "$@" > "$dir/download-args"
case "$last" in
  *endless*)
    echo $$ > "$dir/download-pid"
    while :; do head -c 65536 /dev/zero || exit 0; done ;;
  *broken*)
    printf 'partial'
    echo "ERROR: fragment 7 not found" >&2
    exit 1 ;;
  *) printf 'media-bytes:%s' "$last" ;;
esac
"#;

/// A fake yt-dlp in its own temporary directory
pub struct FakeYtDlp {
    dir: TempDir,
}

impl FakeYtDlp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("yt-dlp.sh"), FAKE_YTDLP).expect("write fake yt-dlp");
        Self { dir }
    }

    pub fn script(&self) -> PathBuf {
        self.dir.path().join("yt-dlp.sh")
    }

    /// Server configuration that runs the fake through `/bin/sh`.
    ///
    /// Going through the shell avoids exec'ing a file that was just written,
    /// which can fail with ETXTBSY while other tests fork.
    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.ytdlp.binary = "/bin/sh".to_string();
        config.ytdlp.base_args = vec![self.script().to_string_lossy().to_string()];
        config.ytdlp.metadata_timeout_secs = 10;
        config.download.exit_wait_secs = 5;
        config
    }

    /// Arguments of the last download invocation, one per line
    pub fn download_args(&self) -> Option<String> {
        std::fs::read_to_string(self.dir.path().join("download-args")).ok()
    }

    /// PID written by an `endless` download, waiting up to five seconds
    pub async fn download_pid(&self) -> u32 {
        let path = self.dir.path().join("download-pid");
        for _ in 0..100 {
            if let Some(pid) = read_pid(&path) {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("fake yt-dlp never wrote {}", path.display());
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Whether `pid` is a live process. Zombies count as dead.
pub fn process_alive(pid: u32) -> bool {
    let stat = Path::new("/proc").join(pid.to_string()).join("stat");
    if Path::new("/proc/self").exists() {
        return match std::fs::read_to_string(stat) {
            // State is the first field after the parenthesised command name
            Ok(s) => !matches!(
                s.rsplit_once(')').and_then(|(_, rest)| rest.trim_start().chars().next()),
                Some('Z') | Some('X') | None
            ),
            Err(_) => false,
        };
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Wait until `pid` has exited, up to `timeout`
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while process_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    true
}
