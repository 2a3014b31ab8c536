use std::collections::{BTreeMap, BTreeSet};

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use aqi_db::air::{AirFilter, POLLUTANT_COLUMNS};
use aqi_db::models::AirQualityRow;
use aqi_types::api::{
    AirQualityRecord, AirQuery, CategoryCount, ForecastEntry, ForecastQuery, PollutantAverage,
    PredictRequest, PredictResponse, SummaryResponse,
};
use aqi_types::models::AqiCategory;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::regression::LinearModel;
use crate::session::{Operation, Session};
use crate::state::{AppState, AppStateInner};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn air_filter(query: &AirQuery) -> AirFilter {
    let cities = query
        .cities
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    AirFilter {
        cities,
        from: query.from.map(|d| d.format(DATE_FORMAT).to_string()),
        to: query.to.map(|d| d.format(DATE_FORMAT).to_string()),
    }
}

fn to_record(row: AirQualityRow) -> Option<AirQualityRecord> {
    let date = match NaiveDate::parse_from_str(&row.date, DATE_FORMAT) {
        Ok(d) => d,
        Err(e) => {
            warn!("Skipping air quality row for {} with date '{}': {}", row.city, row.date, e);
            return None;
        }
    };
    Some(AirQualityRecord {
        category: AqiCategory::from_aqi(row.aqi),
        city: row.city,
        date,
        aqi: row.aqi,
        pm25: row.pm25,
        pm10: row.pm10,
        no2: row.no2,
        so2: row.so2,
        co: row.co,
        o3: row.o3,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| round2(sum / n as f64))
}

/// Aggregate a filtered record set. Missing values are skipped rather than
/// counted as zero.
pub fn summarize(records: &[AirQualityRecord]) -> SummaryResponse {
    let cities: BTreeSet<&str> = records.iter().map(|r| r.city.as_str()).collect();

    let pollutant_values: [fn(&AirQualityRecord) -> Option<f64>; 6] = [
        |r| r.pm25,
        |r| r.pm10,
        |r| r.no2,
        |r| r.so2,
        |r| r.co,
        |r| r.o3,
    ];
    let pollutants = POLLUTANT_COLUMNS
        .iter()
        .zip(pollutant_values)
        .map(|(name, get)| PollutantAverage {
            pollutant: name.to_string(),
            average: mean(records.iter().filter_map(get)),
        })
        .collect();

    let mut categories: BTreeMap<AqiCategory, usize> = BTreeMap::new();
    for r in records {
        *categories.entry(r.category).or_default() += 1;
    }

    SummaryResponse {
        cities: cities.into_iter().map(str::to_string).collect(),
        records: records.len(),
        average_aqi: mean(records.iter().filter_map(|r| r.aqi)),
        max_aqi: records.iter().filter_map(|r| r.aqi).reduce(f64::max),
        pollutants,
        categories: categories
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect(),
    }
}

/// Air quality reader and predictor.
impl AppStateInner {
    pub fn air_cities(&self) -> ApiResult<Vec<String>> {
        Ok(self.db.air_cities()?)
    }

    pub fn air_records(&self, query: &AirQuery) -> ApiResult<Vec<AirQualityRecord>> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(ApiError::invalid_input("'from' must not be after 'to'"));
            }
        }
        let rows = self.db.air_records(&air_filter(query))?;
        Ok(rows.into_iter().filter_map(to_record).collect())
    }

    pub fn air_summary(&self, query: &AirQuery) -> ApiResult<SummaryResponse> {
        Ok(summarize(&self.air_records(query)?))
    }

    /// Fits on every complete row of the dataset, then predicts.
    pub fn predict_aqi(&self, input: PredictRequest) -> ApiResult<PredictResponse> {
        let rows = self.db.air_training_rows()?;
        let (features, targets): (Vec<[f64; 6]>, Vec<f64>) = rows
            .iter()
            .map(|r| ([r[0], r[1], r[2], r[3], r[4], r[5]], r[6]))
            .unzip();

        let model = LinearModel::fit(&features, &targets)
            .ok_or_else(|| ApiError::invalid_input("insufficient training data"))?;
        debug!(samples = targets.len(), "Fitted AQI model");

        let x = [input.pm25, input.pm10, input.no2, input.so2, input.co, input.o3];
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ApiError::invalid_input("pollutant values must be finite"));
        }
        let aqi = round2(model.predict(&x));
        Ok(PredictResponse {
            aqi,
            category: AqiCategory::from_aqi(Some(aqi)),
        })
    }

    pub fn forecast(&self, city: &str) -> ApiResult<Vec<ForecastEntry>> {
        let rows = self.db.list_forecasts(city)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let date = NaiveDate::parse_from_str(&row.forecast_date, DATE_FORMAT).ok()?;
                Some(ForecastEntry {
                    category: AqiCategory::from_aqi(Some(row.predicted_aqi)),
                    city: row.city,
                    date,
                    predicted_aqi: row.predicted_aqi,
                })
            })
            .collect())
    }
}

// -- Handlers --

pub async fn cities(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ViewData)?;
    Ok(Json(state.air_cities()?))
}

pub async fn records(
    State(state): State<AppState>,
    Query(query): Query<AirQuery>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ViewData)?;
    Ok(Json(state.air_records(&query)?))
}

pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<AirQuery>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ViewData)?;
    Ok(Json(state.air_summary(&query)?))
}

pub async fn predict(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<PredictRequest>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ViewData)?;
    let worker = state.clone();
    let prediction = tokio::task::spawn_blocking(move || worker.predict_aqi(req))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(Json(prediction))
}

pub async fn forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
    Extension(session): Extension<Session>,
) -> ApiResult<impl IntoResponse> {
    state.authorize(&session, Operation::ViewData)?;
    Ok(Json(state.forecast(query.city.trim())?))
}
