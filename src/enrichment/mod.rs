// Enrichment - turns a city/date trigger into the weather text every worker gets

pub mod dates;
pub mod forecast;

pub use dates::resolve_date;
pub use forecast::{describe_weather_code, format_report, DailyWeather, ForecastEnricher, Place};
