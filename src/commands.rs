//! Line-oriented host commands: telephony transitions plus store and
//! analytics queries.

use anyhow::{anyhow, bail, Result};
use serde_json::json;

use crate::{
    analytics::{format_duration_ms, talk_listen_label, AnalyticsBucket, RankOrder, TimeWindow},
    telephony::{parse_event_line, TelephonyEvent},
    tracker::FinalizedCall,
    AppState,
};

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Telephony(TelephonyEvent),
    Track { number: String, label: String },
    Untrack { number: String },
    Calibrate,
    SkipCalibration,
    Stats { window: TimeWindow, contact: Option<String> },
    Recent,
    Rank { n: usize, order: RankOrder },
    Status,
}

impl HostCommand {
    /// `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if let Some(event) = parse_event_line(line) {
            return Ok(Some(Self::Telephony(event)));
        }

        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(word, rest)| (word, rest.trim()))
            .unwrap_or((line, ""));

        let command = match word.to_ascii_lowercase().as_str() {
            "track" => {
                let (number, label) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("usage: track <number> <label>"))?;
                Self::Track {
                    number: number.to_string(),
                    label: label.trim().to_string(),
                }
            }
            "untrack" => {
                if rest.is_empty() {
                    bail!("usage: untrack <number>");
                }
                Self::Untrack {
                    number: rest.to_string(),
                }
            }
            "calibrate" => Self::Calibrate,
            "skip-calibration" => Self::SkipCalibration,
            "stats" => {
                let (window, contact) = rest
                    .split_once(char::is_whitespace)
                    .map(|(w, c)| (w, Some(c.trim().to_string())))
                    .unwrap_or((rest, None));
                let window = TimeWindow::parse(window)
                    .ok_or_else(|| anyhow!("usage: stats <day|week|month|year|all> [contact]"))?;
                Self::Stats {
                    window,
                    contact: contact.filter(|c| !c.is_empty()),
                }
            }
            "recent" => Self::Recent,
            "rank" => {
                let mut parts = rest.split_whitespace();
                let n = parts
                    .next()
                    .unwrap_or("5")
                    .parse()
                    .map_err(|_| anyhow!("usage: rank <n> [listeners|talkative]"))?;
                let order = match parts.next() {
                    Some("talkative") => RankOrder::MostTalkative,
                    _ => RankOrder::BestListeners,
                };
                Self::Rank { n, order }
            }
            "status" => Self::Status,
            other => bail!("unknown command '{other}'"),
        };
        Ok(Some(command))
    }
}

/// Runs one command and renders its output. Calibration is long-running and
/// is expected to be spawned by the caller.
pub async fn dispatch(state: &AppState, command: HostCommand) -> Result<String> {
    match command {
        HostCommand::Telephony(event) => match state.on_telephony_event(event).await? {
            Some(FinalizedCall {
                record,
                persisted: true,
            }) => Ok(format!(
                "call with {} saved: {} ({})",
                record.label,
                format_duration_ms(record.total_duration_ms),
                talk_listen_label(record.talk_ratio)
            )),
            Some(FinalizedCall { record, .. }) => Ok(format!(
                "call with {} NOT saved, the record was discarded ({})",
                record.label,
                format_duration_ms(record.total_duration_ms)
            )),
            None => Ok(String::new()),
        },
        HostCommand::Track { number, label } => {
            let tracked = state.db.upsert_tracked_number(&number, &label, None).await?;
            Ok(format!("tracking {} as {}", tracked.phone_number, tracked.label))
        }
        HostCommand::Untrack { number } => {
            if state.db.remove_tracked_number(&number).await? {
                Ok(format!("stopped tracking {number}"))
            } else {
                Ok(format!("{number} was not tracked"))
            }
        }
        HostCommand::Calibrate => {
            let outcome = state.calibration.run().await?;
            Ok(format!(
                "calibration {}: noise floor {:.0}, threshold {:.0}",
                if outcome.complete { "complete" } else { "incomplete, defaults stored" },
                outcome.profile.noise_floor,
                outcome.profile.speaking_threshold
            ))
        }
        HostCommand::SkipCalibration => {
            let profile = state.calibration.skip().await?;
            Ok(format!(
                "calibration skipped: threshold {:.0}",
                profile.speaking_threshold
            ))
        }
        HostCommand::Stats { window, contact } => {
            let bucket = state
                .analytics
                .aggregate(window, None, contact.as_deref())
                .await?;
            Ok(render_bucket(&bucket))
        }
        HostCommand::Recent => {
            let records = state.analytics.most_recent_per_contact().await?;
            if records.is_empty() {
                return Ok("no calls recorded".to_string());
            }
            Ok(records
                .iter()
                .map(|r| {
                    format!(
                        "{}  {}  {}  {}",
                        r.label,
                        r.call_date,
                        format_duration_ms(r.total_duration_ms),
                        talk_listen_label(r.talk_ratio)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        HostCommand::Rank { n, order } => {
            let rankings = state.analytics.rank_contacts(n, order).await?;
            Ok(rankings
                .iter()
                .enumerate()
                .map(|(idx, r)| {
                    format!(
                        "{}. {} ({} calls, {})",
                        idx + 1,
                        r.label,
                        r.total_calls,
                        talk_listen_label(r.average_talk_ratio)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        HostCommand::Status => {
            let tracker = state.tracker.snapshot().await;
            let profile = state.calibration.current_profile().await;
            let metrics = state.metrics.get_snapshot().await;
            let status = json!({
                "tracker": tracker,
                "calibration": profile,
                "sampling": {
                    "sampleCount": metrics.sample_count,
                    "unavailableCount": metrics.unavailable_count,
                    "peakLevel": metrics.peak_level,
                    "cpuPercent": metrics.system.cpu_percent,
                    "memoryMb": metrics.system.memory_mb,
                },
            });
            Ok(serde_json::to_string_pretty(&status)?)
        }
    }
}

fn render_bucket(bucket: &AnalyticsBucket) -> String {
    if bucket.is_empty() {
        return format!("{}: no calls", bucket.period_key);
    }
    let mut out = format!(
        "{}: {} calls, {} total, avg {}\n{}\nspeaking {} / listening {}",
        bucket.period_key,
        bucket.total_calls,
        format_duration_ms(bucket.sum_duration_ms),
        format_duration_ms(bucket.average_call_duration_ms),
        talk_listen_label(bucket.average_talk_ratio),
        format_duration_ms(bucket.sum_speaking_ms),
        format_duration_ms(bucket.sum_listening_ms),
    );
    if let Some(style) = bucket.style() {
        out.push_str(&format!("\nstyle: {} ({})\n{}", style.name, style.category.range(), style.advice));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telephony::RawCallState;

    #[test]
    fn parses_telephony_lines_first() {
        let command = HostCommand::parse("RINGING +1 555 0100").unwrap().unwrap();
        match command {
            HostCommand::Telephony(event) => {
                assert_eq!(event.state, RawCallState::Ringing);
                assert_eq!(event.phone_number.as_deref(), Some("+1 555 0100"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_management_commands() {
        assert_eq!(
            HostCommand::parse("track +15550100 Alice Smith").unwrap(),
            Some(HostCommand::Track {
                number: "+15550100".into(),
                label: "Alice Smith".into(),
            })
        );
        assert_eq!(
            HostCommand::parse("stats week Alice").unwrap(),
            Some(HostCommand::Stats {
                window: TimeWindow::Week,
                contact: Some("Alice".into()),
            })
        );
        assert_eq!(
            HostCommand::parse("rank 3 talkative").unwrap(),
            Some(HostCommand::Rank {
                n: 3,
                order: RankOrder::MostTalkative,
            })
        );
        assert_eq!(HostCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(HostCommand::parse("track +15550100").is_err());
        assert!(HostCommand::parse("stats fortnight").is_err());
        assert!(HostCommand::parse("dance").is_err());
    }

    #[tokio::test]
    async fn full_call_through_dispatch() {
        use crate::{
            audio::{share, UnavailableSource},
            db::{Database, RecordQuery},
            settings::SettingsStore,
        };

        let settings_path = std::env::temp_dir()
            .join(format!("callmeter-dispatch-{}.json", uuid::Uuid::new_v4()));
        let state = AppState::assemble(
            Database::open_in_memory().unwrap(),
            SettingsStore::new(settings_path).unwrap(),
            share(Box::new(UnavailableSource::new("test"))),
            false,
        );

        for line in ["track +15550100 Alice", "RINGING +1 555 0100", "OFFHOOK"] {
            let command = HostCommand::parse(line).unwrap().unwrap();
            dispatch(&state, command).await.unwrap();
        }
        let out = dispatch(&state, HostCommand::parse("IDLE").unwrap().unwrap())
            .await
            .unwrap();
        assert!(out.starts_with("call with Alice saved"));

        let records = state.db.list_call_records(&RecordQuery::all()).await.unwrap();
        assert_eq!(records.len(), 1);

        let stats = dispatch(&state, HostCommand::parse("stats all").unwrap().unwrap())
            .await
            .unwrap();
        assert!(stats.contains("1 calls"));
    }

    #[tokio::test]
    async fn discarded_call_is_not_reported_as_saved() {
        use crate::{
            audio::{share, UnavailableSource},
            db::Database,
            settings::SettingsStore,
            status::StatusEvent,
        };

        let settings_path = std::env::temp_dir()
            .join(format!("callmeter-discard-{}.json", uuid::Uuid::new_v4()));
        let state = AppState::assemble(
            Database::open_in_memory().unwrap(),
            SettingsStore::new(settings_path).unwrap(),
            share(Box::new(UnavailableSource::new("test"))),
            false,
        );
        let mut events = state.events.subscribe();

        for line in ["track +15550100 Alice", "OFFHOOK +15550100"] {
            let command = HostCommand::parse(line).unwrap().unwrap();
            dispatch(&state, command).await.unwrap();
        }
        state
            .db
            .execute(|conn| {
                conn.execute("DROP TABLE call_records", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let out = dispatch(&state, HostCommand::parse("IDLE").unwrap().unwrap())
            .await
            .unwrap();
        assert!(!out.contains("saved:"), "unexpected output: {out}");
        assert!(out.contains("NOT saved"));

        let mut notice = None;
        while let Ok(event) = events.try_recv() {
            if let StatusEvent::Notice { message } = event {
                notice = Some(message);
            }
        }
        assert!(notice.expect("notice emitted").contains("Alice"));
    }
}
