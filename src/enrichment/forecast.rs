//! Open-Meteo backed enrichment: geocode the city, fetch one day of forecast,
//! render it as a short plain-text report.

use crate::config::EnrichmentConfig;
use crate::coordination::errors::EnrichmentError;
use crate::coordination::traits::Enricher;
use crate::enrichment::dates::resolve_date;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,weather_code,precipitation_sum,wind_speed_10m_max";

/// WMO weather interpretation code to description
pub fn describe_weather_code(code: u16) -> String {
    let description = match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snowfall",
        73 => "Moderate snowfall",
        75 => "Heavy snowfall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        other => return format!("Unknown weather (code: {other})"),
    };
    description.to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<DailySeries>,
}

#[derive(Debug, Deserialize)]
struct DailySeries {
    time: Vec<String>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    weather_code: Vec<Option<u16>>,
    precipitation_sum: Vec<Option<f64>>,
    wind_speed_10m_max: Vec<Option<f64>>,
}

/// One day of weather for one place
#[derive(Debug, Clone, PartialEq)]
pub struct DailyWeather {
    pub city: String,
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub weather_code: u16,
    pub precipitation: f64,
    pub wind_max: f64,
}

impl DailySeries {
    fn day(&self, city: &str, date: NaiveDate) -> Option<DailyWeather> {
        let key = date.format("%Y-%m-%d").to_string();
        let idx = self.time.iter().position(|t| *t == key)?;
        Some(DailyWeather {
            city: city.to_string(),
            date,
            temp_max: (*self.temperature_2m_max.get(idx)?)?,
            temp_min: (*self.temperature_2m_min.get(idx)?)?,
            weather_code: (*self.weather_code.get(idx)?)?,
            precipitation: self.precipitation_sum.get(idx).copied().flatten().unwrap_or(0.0),
            wind_max: self.wind_speed_10m_max.get(idx).copied().flatten().unwrap_or(0.0),
        })
    }
}

/// Plain-text report every worker receives as task context
pub fn format_report(weather: &DailyWeather) -> String {
    format!(
        "[{} weather report]\nDate: {}\nWeather: {}\nTemperature: {:.1}°C ~ {:.1}°C\nPrecipitation: {:.1}mm\nWind: {:.1}km/h",
        weather.city,
        weather.date.format("%Y-%m-%d"),
        describe_weather_code(weather.weather_code),
        weather.temp_min,
        weather.temp_max,
        weather.precipitation,
        weather.wind_max
    )
}

pub struct ForecastEnricher {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
    language: String,
    max_forecast_days: i64,
}

impl ForecastEnricher {
    pub fn new(config: &EnrichmentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
            language: config.language.clone(),
            max_forecast_days: config.max_forecast_days,
        })
    }

    pub async fn geocode(&self, city: &str) -> Result<Place, EnrichmentError> {
        let response: GeocodingResponse = self
            .client
            .get(&self.geocoding_url)
            .query(&[
                ("name", city),
                ("count", "1"),
                ("language", self.language.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| EnrichmentError::CityNotFound { city: city.to_string() })
    }

    pub async fn daily_weather(&self, place: &Place, date: NaiveDate) -> Result<DailyWeather, EnrichmentError> {
        let day = date.format("%Y-%m-%d").to_string();
        let response: ForecastResponse = self
            .client
            .get(&self.forecast_url)
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
                ("start_date", day.clone()),
                ("end_date", day.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .daily
            .and_then(|series| series.day(&place.name, date))
            .ok_or(EnrichmentError::ForecastUnavailable { date: day })
    }
}

#[async_trait]
impl Enricher for ForecastEnricher {
    async fn enrich(&self, subject: &str, date_hint: Option<&str>) -> Result<String, EnrichmentError> {
        let date = resolve_date(date_hint, Local::now().date_naive(), self.max_forecast_days)?;
        debug!(city = subject, %date, "Fetching weather");

        let place = self.geocode(subject).await?;
        let weather = self.daily_weather(&place, date).await?;
        info!(city = %place.name, country = ?place.country, %date, "Weather fetched");

        Ok(format_report(&weather))
    }
}
