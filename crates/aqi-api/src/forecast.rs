use std::sync::Arc;
use std::time::Duration;

use aqi_db::Database;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use crate::air::DATE_FORMAT;
use crate::regression::linear_trend;

/// Daily values the trend is fitted on.
pub const HISTORY_DAYS: u32 = 30;
pub const HORIZON_DAYS: u64 = 7;

/// First instant after `now` whose UTC wall-clock time is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Extend the fitted trend `HORIZON_DAYS` steps past the last sample.
/// Negative values are clamped to zero.
pub fn trend_forecast(history: &[f64]) -> Vec<f64> {
    let Some((intercept, slope)) = linear_trend(history) else {
        return Vec::new();
    };
    let last = history.len() as f64 - 1.0;
    (1..=HORIZON_DAYS)
        .map(|step| {
            let v = intercept + slope * (last + step as f64);
            (v.max(0.0) * 100.0).round() / 100.0
        })
        .collect()
}

/// Regenerate forecasts for every city, dated from the day after `today`.
/// Rows for `today` and earlier are dropped as each city is rewritten.
/// Each city is read and written on its own so the writer lock is never
/// held for the whole run.
pub fn generate_forecasts(db: &Database, today: NaiveDate) -> anyhow::Result<usize> {
    let mut written = 0;
    for city in db.air_cities()? {
        let history: Vec<f64> = db
            .daily_city_aqi(&city, HISTORY_DAYS)?
            .into_iter()
            .map(|(_, aqi)| aqi)
            .collect();

        let points: Vec<(String, f64)> = trend_forecast(&history)
            .into_iter()
            .zip(1..)
            .filter_map(|(aqi, offset)| {
                let date = today.checked_add_days(Days::new(offset))?;
                Some((date.format(DATE_FORMAT).to_string(), aqi))
            })
            .collect();

        if points.is_empty() {
            debug!(city = %city, "No AQI history, skipping forecast");
            continue;
        }
        written += db.upsert_forecasts(&city, &today.format(DATE_FORMAT).to_string(), &points)?;
    }
    Ok(written)
}

async fn run_once(db: Arc<Database>, now: DateTime<Utc>) -> anyhow::Result<(usize, usize)> {
    tokio::task::spawn_blocking(move || {
        let written = generate_forecasts(&db, now.date_naive())?;
        let pruned = db.prune_spent_tokens(now.timestamp())?;
        Ok::<_, anyhow::Error>((written, pruned))
    })
    .await?
}

/// Background task that fires once a day at `at` (UTC), regenerates the
/// per-city forecasts and prunes expired spent tokens.
pub async fn run_forecast_loop(db: Arc<Database>, at: NaiveTime) {
    loop {
        let now = Utc::now();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!("Next forecast run at {}", next);
        tokio::time::sleep(wait).await;

        match run_once(db.clone(), Utc::now()).await {
            Ok((written, pruned)) => {
                info!("Forecast: wrote {} points, pruned {} spent tokens", written, pruned);
            }
            Err(e) => {
                warn!("Forecast error: {}", e);
            }
        }
    }
}
