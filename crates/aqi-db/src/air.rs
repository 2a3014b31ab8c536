use crate::Database;
use crate::models::{AirQualityRow, ForecastRow};
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Row, params_from_iter};

/// Pollutant feature columns, in the order the predictor expects them.
pub const POLLUTANT_COLUMNS: [&str; 6] = ["PM25", "PM10", "NO2", "SO2", "CO", "O3"];

/// Filter over the read-only `air_quality` dataset. Dates are `YYYY-MM-DD`
/// and both bounds are inclusive.
#[derive(Debug, Default, Clone)]
pub struct AirFilter {
    pub cities: Vec<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl Database {
    // -- Air quality (read-only) --

    pub fn air_cities(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT City FROM air_quality WHERE City IS NOT NULL ORDER BY City",
            )?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    pub fn air_records(&self, filter: &AirFilter) -> Result<Vec<AirQualityRow>> {
        self.with_conn(|conn| {
            let mut clauses = vec![
                "City IS NOT NULL".to_string(),
                "date(Date) IS NOT NULL".to_string(),
            ];
            let mut values: Vec<Value> = Vec::new();

            if !filter.cities.is_empty() {
                let start = values.len();
                values.extend(filter.cities.iter().cloned().map(Value::Text));
                let list = (start + 1..=values.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                clauses.push(format!("City IN ({})", list));
            }
            if let Some(from) = &filter.from {
                values.push(Value::Text(from.clone()));
                clauses.push(format!("date(Date) >= date(?{})", values.len()));
            }
            if let Some(to) = &filter.to {
                values.push(Value::Text(to.clone()));
                clauses.push(format!("date(Date) <= date(?{})", values.len()));
            }

            let sql = format!(
                "SELECT City, date(Date), AQI, PM25, PM10, NO2, SO2, CO, O3
                 FROM air_quality
                 WHERE {}
                 ORDER BY date(Date), City",
                clauses.join(" AND ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), air_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Rows with every pollutant and the AQI present, as
    /// `[PM25, PM10, NO2, SO2, CO, O3, AQI]`.
    pub fn air_training_rows(&self) -> Result<Vec<[f64; 7]>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT PM25, PM10, NO2, SO2, CO, O3, AQI FROM air_quality
                 WHERE PM25 IS NOT NULL AND PM10 IS NOT NULL AND NO2 IS NOT NULL
                   AND SO2 IS NOT NULL AND CO IS NOT NULL AND O3 IS NOT NULL
                   AND AQI IS NOT NULL",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let mut out = [0.0; 7];
                    for (i, slot) in out.iter_mut().enumerate() {
                        *slot = row.get(i)?;
                    }
                    Ok(out)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Daily mean AQI for a city, oldest first, limited to the most recent
    /// `days` distinct dates.
    pub fn daily_city_aqi(&self, city: &str, days: u32) -> Result<Vec<(String, f64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT day, aqi FROM (
                     SELECT date(Date) AS day, AVG(AQI) AS aqi
                     FROM air_quality
                     WHERE City = ?1 AND AQI IS NOT NULL AND date(Date) IS NOT NULL
                     GROUP BY day
                     ORDER BY day DESC
                     LIMIT ?2
                 ) ORDER BY day",
            )?;
            let rows = stmt
                .query_map((city, days), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Forecasts --

    /// Replace the forecast values for the given dates of one city and drop
    /// its rows dated on or before `today`, in one transaction.
    pub fn upsert_forecasts(
        &self,
        city: &str,
        today: &str,
        points: &[(String, f64)],
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM forecasts WHERE city = ?1 AND forecast_date <= ?2",
                (city, today),
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO forecasts (city, forecast_date, predicted_aqi) VALUES (?1, ?2, ?3)
                     ON CONFLICT(city, forecast_date) DO UPDATE SET
                         predicted_aqi = excluded.predicted_aqi,
                         generated_at = datetime('now')",
                )?;
                for (date, aqi) in points {
                    stmt.execute((city, date, aqi))?;
                }
            }
            tx.commit()?;
            Ok(points.len())
        })
    }

    pub fn list_forecasts(&self, city: &str) -> Result<Vec<ForecastRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT city, forecast_date, predicted_aqi FROM forecasts
                 WHERE city = ?1 ORDER BY forecast_date",
            )?;
            let rows = stmt
                .query_map([city], |row| {
                    Ok(ForecastRow {
                        city: row.get(0)?,
                        forecast_date: row.get(1)?,
                        predicted_aqi: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn air_from_row(row: &Row<'_>) -> rusqlite::Result<AirQualityRow> {
    Ok(AirQualityRow {
        city: row.get(0)?,
        date: row.get(1)?,
        aqi: row.get(2)?,
        pm25: row.get(3)?,
        pm10: row.get(4)?,
        no2: row.get(5)?,
        so2: row.get(6)?,
        co: row.get(7)?,
        o3: row.get(8)?,
    })
}

/// Test helper for seeding the dataset, which the server itself never writes.
#[cfg(test)]
pub(crate) fn seed(db: &Database, rows: &[(&str, &str, Option<f64>, [Option<f64>; 6])]) {
    db.with_conn_mut(|conn| {
        for (city, date, aqi, p) in rows {
            conn.execute(
                "INSERT INTO air_quality (City, Date, AQI, PM25, PM10, NO2, SO2, CO, O3)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![city, date, aqi, p[0], p[1], p[2], p[3], p[4], p[5]],
            )?;
        }
        Ok(())
    })
    .unwrap();
}
