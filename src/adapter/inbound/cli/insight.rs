//! Handler for the `insight` command.

use serde_json::json;
use tabled::{Table, Tabled};

use super::command::InsightArgs;
use super::output;
use crate::domain::insight::{InsightRecord, RankedBucket, SetupFlag};
use crate::error::Result;
use crate::infrastructure::bootstrap::App;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::store::InsightFilter;

#[derive(Tabled)]
struct BucketRow {
    #[tabled(rename = "Rank")]
    rank: String,
    #[tabled(rename = "Bucket")]
    bucket: String,
    #[tabled(rename = "Trades")]
    trades: u32,
    #[tabled(rename = "Win %")]
    win_rate: String,
    #[tabled(rename = "Avg R")]
    average_r: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Version")]
    version: u64,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Generated")]
    generated_at: String,
    #[tabled(rename = "Trades")]
    trades: u32,
    #[tabled(rename = "Deltas")]
    deltas: usize,
}

/// Show the latest insight, one period's insight, or the full history.
pub async fn execute(config: Config, args: &InsightArgs) -> Result<()> {
    let app = App::build(config)?;

    if args.history {
        let records = app
            .persistence
            .query_insights(&InsightFilter::default())
            .await?;
        print_history(&records);
        return Ok(());
    }

    let record = match args.period {
        Some(period) => app.persistence.get_insight(period).await?,
        None => app.persistence.latest_insight().await?,
    };

    match record {
        Some(record) => print_record(&record),
        None if output::is_json() => output::json_output(&json!({
            "command": "insight",
            "insight": null,
        })),
        None => {
            output::warning("No insight stored yet");
            output::hint(&format!(
                "run {} after predictions have been validated",
                output::highlight("hindsight learn --period <PERIOD>")
            ));
        }
    }
    Ok(())
}

fn print_history(records: &[InsightRecord]) {
    if output::is_json() {
        let rows = records
            .iter()
            .map(|r| {
                json!({
                    "version": r.version,
                    "period": r.period,
                    "generated_at": r.generated_at,
                    "total_trades": r.evidence.total_trades,
                    "deltas": r.deltas,
                })
            })
            .collect::<Vec<_>>();
        output::json_output(&json!({
            "command": "insight.history",
            "insights": rows,
        }));
        return;
    }

    output::section("Insight History");
    if records.is_empty() {
        output::lines("No insights stored");
        return;
    }
    let rows = records.iter().map(|r| HistoryRow {
        version: r.version,
        period: r.period.to_string(),
        generated_at: r.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        trades: r.evidence.total_trades,
        deltas: r.deltas.len(),
    });
    output::lines(&Table::new(rows).to_string());
}

fn print_record(record: &InsightRecord) {
    if output::is_json() {
        output::json_output(&json!({
            "command": "insight",
            "insight": record,
        }));
        return;
    }

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Period", record.period);
    output::field("Version", record.version);
    output::field("Generated", record.generated_at.to_rfc3339());
    output::field(
        "Evidence",
        format!(
            "{} trades, {} eligible / {} thin buckets",
            record.evidence.total_trades,
            record.evidence.eligible_buckets,
            record.evidence.ineligible_buckets
        ),
    );

    print_buckets("Best setups", &record.best_setups);
    print_buckets("Worst setups", &record.worst_setups);
    print_buckets("Best hours", &record.best_times);
    print_buckets("Worst hours", &record.worst_times);

    output::section("Adjustments");
    if record.deltas.is_empty() {
        output::lines("none");
    }
    for (name, delta) in &record.deltas {
        output::field(name, output::signed(*delta, format!("{delta:+.4}")));
    }

    if !record.setup_flags.is_empty() {
        output::section("Setup flags");
        for (setup, flag) in &record.setup_flags {
            let label = match flag {
                SetupFlag::Include => output::signed(1.0, "include"),
                SetupFlag::Exclude => output::signed(-1.0, "exclude"),
            };
            output::field(setup, label);
        }
    }

    output::section("Parameters");
    output::field("confidence", format!("{:.4}", record.parameters.confidence_scale));
    output::field("risk", format!("{:.4}", record.parameters.risk_scale));
    for (signal, weight) in &record.parameters.weights {
        output::field(signal, format!("{weight:.4}"));
    }

    for warning in &record.calibration_warnings {
        output::warning(warning);
    }
}

fn print_buckets(title: &str, buckets: &[RankedBucket]) {
    output::section(title);
    if buckets.is_empty() {
        output::lines("none");
        return;
    }
    let rows = buckets.iter().enumerate().map(|(i, b)| BucketRow {
        rank: if b.eligible {
            format!("{}", i + 1)
        } else {
            format!("{}*", i + 1)
        },
        bucket: format!("{}={}", b.dimension, b.value),
        trades: b.stats.trades,
        win_rate: format!("{:.1}", b.win_rate * 100.0),
        average_r: format!("{:+.2}", b.average_r),
    });
    output::lines(&Table::new(rows).to_string());
}
