//! Common test utilities for social-dl integration tests
//!
//! Builds a stand-in for the media-fetch tool as a POSIX shell script, so the real
//! process supervisor runs end to end without network access.

#![allow(dead_code)]

use social_dl::{Config, SocialDownloader};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// How the fake fetch tool behaves when asked to download
#[derive(Clone, Copy, Debug)]
pub enum FakeTool {
    /// Print progress and write the `-o` target
    Succeed,
    /// Print an error line and exit 1
    Fail,
    /// Print nothing and never exit on its own
    Silent,
}

/// Title the fake tool reports for `--get-title` and preview requests
pub const FAKE_TITLE: &str = "Fake Clip Title";

/// Bytes the fake tool writes as the downloaded video
pub const FAKE_VIDEO: &str = "fake mp4 payload";

/// A temp root with fake tools and a launch log
pub struct Sandbox {
    pub dir: TempDir,
    pub fetch_tool: PathBuf,
    pub transcode_tool: PathBuf,
    pub log: PathBuf,
}

impl Sandbox {
    pub fn new(mode: FakeTool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("launches.log");
        let fetch_tool = dir.path().join("yt-dlp");
        let transcode_tool = dir.path().join("ffmpeg");

        write_script(&fetch_tool, &fetch_script(mode, &log));
        write_script(&transcode_tool, "#!/bin/sh\necho 'ffmpeg version 6.0'\nexit 0\n");

        Self {
            dir,
            fetch_tool,
            transcode_tool,
            log,
        }
    }

    /// Config pointing at the fake tools, with fast retries
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.download.temp_dir = self.dir.path().join("artifacts");
        config.download.attempt_timeout = Duration::from_secs(5);
        config.download.shutdown_grace = Duration::from_secs(2);
        config.tools.fetch_tool_path = Some(self.fetch_tool.clone());
        config.tools.transcode_tool_path = Some(self.transcode_tool.clone());
        config.tools.search_path = false;
        config.retry.backoff = Duration::from_millis(20);
        config.retry.jitter = false;
        config.preview.oembed_endpoint = "http://127.0.0.1:9/oembed".to_string();
        config.preview.oembed_timeout = Duration::from_secs(1);
        config
    }

    pub async fn downloader(&self) -> SocialDownloader {
        SocialDownloader::new(self.config()).await.unwrap()
    }

    /// Argument lines of every non-probe launch, in order
    pub fn launches(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

fn fetch_script(mode: FakeTool, log: &Path) -> String {
    let download = match mode {
        FakeTool::Succeed => format!(
            r#"echo "[download]   0.0% of 1.00KiB at 1.00KiB/s ETA 00:01"
echo "[download]  42.7% of 1.00KiB at 1.00KiB/s ETA 00:01"
echo "[download] 100.0% of 1.00KiB at 1.00KiB/s ETA 00:00"
printf '%s' '{FAKE_VIDEO}' > "$out"
exit 0"#
        ),
        FakeTool::Fail => r#"echo "ERROR: [generic] Unable to download webpage" >&2
exit 1"#
            .to_string(),
        FakeTool::Silent => "exec sleep 30".to_string(),
    };

    format!(
        r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "2024.01.01"
  exit 0
fi
echo "$*" >> "{log}"
out=""
prev=""
for a in "$@"; do
  case "$a" in
    --get-title)
      echo "{FAKE_TITLE}"
      [ "$prev" = "-g" ] && echo "https://video.xx.fbcdn.net/v/t42/clip.mp4?efg=1"
      exit 0
      ;;
  esac
  [ "$prev" = "-o" ] && out="$a"
  prev="$a"
done
{download}
"#,
        log = log.display()
    )
}
