//! Resume persistence
//!
//! The queue, its flags and the playback position survive restarts in a
//! plain `key=value` snapshot. Flag lines precede their `url=` line. The
//! `playing=` line marks the track that was on air, carrying its elapsed
//! milliseconds or `-1` when timing was never known. A footer after the
//! last entry records when the snapshot was written (`created=`) and how
//! long the write took (`ms=`). The format is versioned and a snapshot
//! with an unknown version is refused rather than half-loaded.

use super::Player;
use crate::error::{Error, Result};
use crate::queue::QueueEntry;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};

const RESUME_VERSION: u32 = 2;

/// One queue entry as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeEntry {
    pub url: String,
    pub played: bool,
    pub auto_play: bool,
    /// `Some` marks the entry that was on air; -1 means elapsed unknown
    pub playing_ms: Option<i64>,
}

impl ResumeEntry {
    fn new(url: String) -> Self {
        Self {
            url,
            played: false,
            auto_play: false,
            playing_ms: None,
        }
    }
}

/// A parsed or to-be-written resume snapshot.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResumeSnapshot {
    pub entries: Vec<ResumeEntry>,
    /// When the snapshot was written
    pub created: Option<DateTime<Utc>>,
    /// How long writing the snapshot took, in ms
    pub write_ms: Option<u64>,
}

impl ResumeSnapshot {
    /// Render the snapshot in the line format described above.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "resumeversion={}", RESUME_VERSION);
        for entry in &self.entries {
            if entry.played {
                out.push_str("played=1\n");
            }
            if entry.auto_play {
                out.push_str("autoplay=1\n");
            }
            if let Some(ms) = entry.playing_ms {
                let _ = writeln!(out, "playing={}", ms);
            }
            let _ = writeln!(out, "url={}", entry.url);
        }
        if let Some(created) = self.created {
            let _ = writeln!(out, "created={}", created.to_rfc3339());
        }
        if let Some(ms) = self.write_ms {
            let _ = writeln!(out, "ms={}", ms);
        }
        out
    }

    /// Parse a snapshot; unknown keys are ignored, an unknown version is
    /// an error.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut snapshot = ResumeSnapshot::default();
        let mut pending = ResumeEntry::new(String::new());
        let mut version_seen = false;

        for line in contents.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "resumeversion" => {
                    let version: u32 = value
                        .parse()
                        .map_err(|_| Error::Resume(format!("bad version {:?}", value)))?;
                    if version != RESUME_VERSION {
                        return Err(Error::Resume(format!(
                            "unsupported resume version {}",
                            version
                        )));
                    }
                    version_seen = true;
                }
                "played" => pending.played = value == "1",
                "autoplay" => pending.auto_play = value == "1",
                "playing" => pending.playing_ms = value.parse().ok(),
                "url" => {
                    let mut entry =
                        std::mem::replace(&mut pending, ResumeEntry::new(String::new()));
                    entry.url = value.to_string();
                    snapshot.entries.push(entry);
                }
                "created" => {
                    snapshot.created = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|t| t.with_timezone(&Utc));
                }
                "ms" => snapshot.write_ms = value.parse().ok(),
                other => {
                    debug!(key = other, "ignoring unknown resume key");
                }
            }
        }

        if !version_seen && !snapshot.entries.is_empty() {
            return Err(Error::Resume("missing resumeversion header".to_string()));
        }
        Ok(snapshot)
    }
}

impl Player {
    /// Snapshot the queue and position for [`Player::save_resume`].
    ///
    /// Entries already played are left out unless the player is configured
    /// to reload them, so the filter applied here mirrors what the next
    /// session would keep. The on-air entry always survives.
    pub fn resume_snapshot(&self) -> ResumeSnapshot {
        let current = self.queue.current_position();
        let elapsed: Option<i64> = if self.primary.is_some() {
            Some(self.time().elapsed_ms.map(|ms| ms as i64).unwrap_or(-1))
        } else {
            None
        };

        let mut snapshot = ResumeSnapshot::default();
        for pos in 0..self.queue.len() {
            let Some(entry) = self.queue.entry_at(pos) else {
                continue;
            };
            let is_current = current == Some(pos);
            if entry.played && !is_current && !self.settings.resume_load_played {
                continue;
            }
            snapshot.entries.push(ResumeEntry {
                url: entry.url,
                played: entry.played,
                auto_play: entry.auto_play,
                playing_ms: if is_current { elapsed.or(Some(-1)) } else { None },
            });
        }
        snapshot
    }

    /// Write the resume snapshot, creating parent directories as needed.
    pub fn save_resume(&self, path: &Path) -> Result<()> {
        let started = jbx_common::time::ms_ticks();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut snapshot = self.resume_snapshot();
        snapshot.created = Some(jbx_common::time::now());
        snapshot.write_ms = Some(jbx_common::time::ms_ticks() - started);
        std::fs::write(path, snapshot.render())?;
        debug!(path = %path.display(), "resume snapshot saved");
        Ok(())
    }

    /// Restore the queue from a resume snapshot.
    ///
    /// A missing file is not an error. Played entries were already
    /// filtered when the snapshot was written, so every entry is taken
    /// as-is. If an on-air entry is marked, the position moves there and
    /// playback optionally restarts at the saved elapsed time; a saved
    /// elapsed of -1 means the player was not rendering when the snapshot
    /// was taken, and it stays stopped.
    pub fn load_resume(&mut self, path: &Path) -> Result<()> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let snapshot = ResumeSnapshot::parse(&contents)?;

        let mut resume_pos: Option<(usize, i64)> = None;
        for entry in snapshot.entries {
            let pos = self.queue.len();
            self.queue.enqueue(QueueEntry {
                url: entry.url,
                played: entry.played,
                auto_play: entry.auto_play,
                playtime_ms: None,
            });
            if let Some(ms) = entry.playing_ms {
                resume_pos = Some((pos, ms));
            }
        }

        if let Some((pos, elapsed_ms)) = resume_pos {
            self.queue.set_current_position(pos);
            info!(pos, elapsed_ms, "queue restored from resume snapshot");
            if self.settings.resume_start_playback && elapsed_ms >= 0 {
                if let Err(e) = self.play(elapsed_ms as u64) {
                    warn!(error = %e, "could not restart playback from resume snapshot");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrips_through_text() {
        let snapshot = ResumeSnapshot {
            entries: vec![
                ResumeEntry {
                    url: "file:///a.mp3".into(),
                    played: true,
                    auto_play: false,
                    playing_ms: None,
                },
                ResumeEntry {
                    url: "file:///b.mp3".into(),
                    played: true,
                    auto_play: true,
                    playing_ms: Some(42_500),
                },
                ResumeEntry {
                    url: "file:///c.mp3".into(),
                    played: false,
                    auto_play: false,
                    playing_ms: None,
                },
            ],
            created: Some(jbx_common::time::now()),
            write_ms: Some(3),
        };

        let parsed = ResumeSnapshot::parse(&snapshot.render()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn header_line_comes_first() {
        let snapshot = ResumeSnapshot {
            entries: vec![ResumeEntry::new("file:///a.mp3".into())],
            ..Default::default()
        };
        assert!(snapshot.render().starts_with("resumeversion=2\n"));
    }

    #[test]
    fn footer_follows_the_last_entry() {
        let snapshot = ResumeSnapshot {
            entries: vec![
                ResumeEntry::new("file:///a.mp3".into()),
                ResumeEntry::new("file:///b.mp3".into()),
            ],
            created: Some(jbx_common::time::now()),
            write_ms: Some(12),
        };

        let text = snapshot.render();
        let last_url = text.rfind("url=").unwrap();
        let created = text.find("created=").unwrap();
        assert!(created > last_url, "footer must come after all entries:\n{}", text);
        assert_eq!(text.matches("created=").count(), 1);
        assert!(text.ends_with("ms=12\n"));
    }

    #[test]
    fn unknown_elapsed_is_minus_one() {
        let mut entry = ResumeEntry::new("file:///a.mp3".into());
        entry.playing_ms = Some(-1);
        let text = ResumeSnapshot { entries: vec![entry], ..Default::default() }.render();
        assert!(text.contains("playing=-1\n"));

        let parsed = ResumeSnapshot::parse(&text).unwrap();
        assert_eq!(parsed.entries[0].playing_ms, Some(-1));
    }

    #[test]
    fn unsupported_version_is_refused() {
        let err = ResumeSnapshot::parse("resumeversion=99\nurl=file:///a.mp3\n");
        assert!(err.is_err());
    }

    #[test]
    fn missing_header_is_refused() {
        assert!(ResumeSnapshot::parse("url=file:///a.mp3\n").is_err());
    }

    #[test]
    fn footer_metadata_survives_a_parse() {
        let text = "resumeversion=2\nurl=file:///a.mp3\ncreated=2026-08-24T10:00:00+00:00\nms=7\n";
        let parsed = ResumeSnapshot::parse(text).unwrap();
        assert!(parsed.created.is_some());
        assert_eq!(parsed.write_ms, Some(7));
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let text = "resumeversion=2\nfutureflag=1\nurl=file:///a.mp3\n";
        let parsed = ResumeSnapshot::parse(text).unwrap();
        assert_eq!(parsed.entries.len(), 1);
    }
}
