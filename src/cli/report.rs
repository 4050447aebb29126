use std::{collections::HashMap, fmt::Display, future, sync::Arc};

use ansi_term::Colour;
use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use futures::{stream, Stream, StreamExt, TryStreamExt};
use now::DateTimeNow;
use tracing::error;

use crate::{
    classify::ActivityState,
    storage::{entities::ActivitySpanEntity, ledger_storage::LedgerStorage},
    utils::{
        percentage::{duration_percentage, Percentage},
        time::next_day_start,
    },
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\", \"12 AM 16/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\", \"12 AM 16/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take inputs as whole days. For example if start and end are both 15/03/2025 this option allows to extract the whole day"
    )]
    treat_as_days: bool,
    #[arg(short = 'p', long = "percentage", help = "Hide activities below this share of tracked time", default_value_t = Percentage::new_opt(1.).unwrap())]
    min_percentage: Percentage,
}

/// Range reported when no start date is given.
const DEFAULT_REPORT_SPAN: Duration = Duration::hours(24);

/// Processes the `report` command: aggregates recorded spans between
/// `start_date` and `end_date` into per-activity time and earnings.
pub async fn process_report_command(
    storage: impl LedgerStorage,
    ReportCommand {
        start_date,
        end_date,
        date_style,
        treat_as_days,
        min_percentage,
    }: ReportCommand,
) -> Result<()> {
    let (start, end) = match parse_values(start_date, end_date, date_style, treat_as_days) {
        Ok(value) => value,
        Err(value) => return Err(value),
    };

    let spans = extract_between(
        storage,
        ExtractConfig {
            start: start.into(),
            end: end.into(),
        },
    )
    .try_collect::<Vec<_>>()
    .await?;

    let (usages, tracked, earned) = analyze_states(spans, min_percentage);

    println!(
        "{}",
        Colour::Yellow.paint(format!(
            "Activity {} - {}",
            start.format("%x %H:%M"),
            end.format("%x %H:%M")
        ))
    );

    if usages.is_empty() {
        println!("No activity recorded in this range");
        return Ok(());
    }

    for usage in &usages {
        println!(
            "{}%\t{}\t{}\t{}",
            *duration_percentage(usage.duration, tracked) as i32,
            format_duration(usage.duration),
            paint_money(usage.earned),
            usage.state.as_str(),
        );
    }

    println!();
    println!(
        "Tracked {}, earned {} ({}/h)",
        format_duration(tracked),
        paint_money(earned),
        paint_money(per_hour(earned, tracked)),
    );
    Ok(())
}

/// Also provides sensible defaults for the `report` command.
fn parse_values(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
    treat_as_days: bool,
) -> Result<(DateTime<Local>, DateTime<Local>)> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();
    let mut start = match start_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
        None => now - DEFAULT_REPORT_SPAN,
    };
    let mut end = match end_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate end date {e}"),
                )
                .into());
        }
        None => now,
    };
    if treat_as_days {
        start = start.beginning_of_day();
        end = next_day_start(end);
    }
    Ok((start, end))
}

pub struct ExtractConfig {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExtractConfig {
    fn filter(&self, entity: ActivitySpanEntity) -> Option<ActivitySpanEntity> {
        entity.clamp(self.start, self.end)
    }
}

/// Extracts [ActivitySpanEntity] between 2 dates. To do it in an efficient manner streams are
/// used.
pub fn extract_between(
    storage: impl LedgerStorage,
    config: ExtractConfig,
) -> impl Stream<Item = Result<ActivitySpanEntity>> {
    let storage = Arc::new(storage);
    let start = config.start;
    let end = config.end;

    let date_iteration = date_range(start.date_naive(), end.date_naive());

    let files = date_iteration
        .map(move |day| {
            let storage = storage.clone();
            async move { (day, storage.spans_for(day).await) }
        })
        .buffered(4);

    files
        .flat_map(|(day, data)| match data {
            Ok(data) => stream::iter(data).map(Ok).boxed(),
            Err(e) => {
                error!("Failed to process file {day} {e}");
                stream::once(future::ready(Err(e))).boxed()
            }
        })
        .filter_map(move |v| future::ready(v.map(|v| config.filter(v)).transpose()))
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold((start, end), |(mut current, end)| {
        future::ready({
            if current <= end {
                let last_current = current;
                current = current.succ_opt().expect("End of time should never happen");
                Some((last_current, (current, end)))
            } else {
                None
            }
        })
    })
}

#[derive(Debug, PartialEq, Eq)]
pub struct StateUsage {
    pub state: ActivityState,
    pub duration: Duration,
    pub earned: i64,
}

/// Returns per-activity usage sorted by time spent, plus the tracked total
/// and total earnings. Activities under `min_percentage` of the tracked
/// time are dropped from the listing but still count toward the totals.
pub fn analyze_states(
    spans: Vec<ActivitySpanEntity>,
    min_percentage: Percentage,
) -> (Vec<StateUsage>, Duration, i64) {
    let mut map = HashMap::<ActivityState, StateUsage>::new();
    let mut tracked = Duration::zero();
    let mut earned = 0i64;

    for span in spans {
        tracked += span.duration;
        earned += span.earned;
        let usage = map.entry(span.state).or_insert_with(|| StateUsage {
            state: span.state,
            duration: Duration::zero(),
            earned: 0,
        });
        usage.duration += span.duration;
        usage.earned += span.earned;
    }

    let threshold = tracked * (*min_percentage as i32) / 100;

    let mut usages = map
        .into_values()
        .filter(|v| v.duration > threshold)
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| b.duration.cmp(&a.duration));
    (usages, tracked, earned)
}

fn per_hour(earned: i64, tracked: Duration) -> i64 {
    let seconds = tracked.num_seconds();
    if seconds == 0 {
        return 0;
    }
    earned * 3600 / seconds
}

fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

fn format_money(v: i64) -> String {
    let sign = if v < 0 { "-" } else { "" };
    let digits = v.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}${grouped}")
}

fn paint_money(v: i64) -> String {
    let text = format_money(v);
    if v < 0 {
        Colour::Red.paint(text).to_string()
    } else {
        Colour::Green.paint(text).to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use futures::StreamExt;

    use super::*;

    fn span(state: ActivityState, start_offset: i64, secs: i64, earned: i64) -> ActivitySpanEntity {
        ActivitySpanEntity {
            state,
            start: Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap()
                + Duration::seconds(start_offset),
            duration: Duration::seconds(secs),
            earned,
        }
    }

    #[tokio::test]
    async fn test_date_range_is_inclusive() {
        let dates = date_range(
            NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(),
            NaiveDate::from_ymd_opt(2018, 7, 6).unwrap(),
        )
        .collect::<Vec<_>>()
        .await;
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2018, 7, 4).unwrap());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2018, 7, 6).unwrap());
    }

    #[test]
    fn test_analyze_states_aggregates_and_sorts() {
        let spans = vec![
            span(ActivityState::Idle, 0, 600, 0),
            span(ActivityState::MissionActive, 600, 1200, 50_000),
            span(ActivityState::MissionActive, 1800, 600, 20_000),
        ];

        let (usages, tracked, earned) = analyze_states(spans, Percentage::new_opt(1.).unwrap());
        assert_eq!(tracked, Duration::seconds(2400));
        assert_eq!(earned, 70_000);
        assert_eq!(usages[0].state, ActivityState::MissionActive);
        assert_eq!(usages[0].duration, Duration::seconds(1800));
        assert_eq!(usages[0].earned, 70_000);
        assert_eq!(usages[1].state, ActivityState::Idle);
    }

    #[test]
    fn test_analyze_states_filters_below_percentage() {
        let spans = vec![
            span(ActivityState::MissionActive, 0, 10_000, 0),
            span(ActivityState::Loading, 10_000, 10, 0),
        ];

        let (usages, _, _) = analyze_states(spans, Percentage::new_opt(5.).unwrap());
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].state, ActivityState::MissionActive);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0), "$0");
        assert_eq!(format_money(950), "$950");
        assert_eq!(format_money(1_250_000), "$1,250,000");
        assert_eq!(format_money(-42_000), "-$42,000");
    }

    #[test]
    fn test_per_hour() {
        assert_eq!(per_hour(50_000, Duration::minutes(30)), 100_000);
        assert_eq!(per_hour(100, Duration::zero()), 0);
    }
}
