//! Texts the bot sends back.

use weatherbot_core::TemperatureUnit;
use weatherbot_weather::{format_temperature, CurrentWeather};

pub const UNKNOWN_COMMAND: &str = "Такая команда не доступна";
pub const COORDINATES_FAILED: &str = "Не смогли получить координаты";
pub const WEATHER_FAILED: &str = "Не смогли получить погоду в этой местности";
pub const CITY_USAGE: &str = "Укажите город: /city <название>";
pub const NO_SAVED_CITY: &str = "Сначала сохраните город командой /city <название>";
pub const HELP: &str = "Напишите название города, и я пришлю текущую температуру.\n\
/city <название> - сохранить город\n\
/weather - погода в сохраненном городе";

pub fn city_saved(city: &str) -> String {
    format!("Город {} сохранен", city)
}

pub fn temperature(place: &str, weather: &CurrentWeather, unit: TemperatureUnit) -> String {
    format!(
        "Температура в {}: {}",
        place,
        format_temperature(weather.temperature, unit)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather(temperature: f64) -> CurrentWeather {
        CurrentWeather {
            temperature,
            feels_like: None,
            humidity: None,
            description: None,
            observed_at: None,
        }
    }

    #[test]
    fn test_city_saved() {
        assert_eq!(city_saved("Омск"), "Город Омск сохранен");
    }

    #[test]
    fn test_temperature_reply() {
        assert_eq!(
            temperature("Москва", &weather(21.5), TemperatureUnit::Celsius),
            "Температура в Москва: 22°C"
        );
        assert_eq!(
            temperature("Oslo", &weather(-0.4), TemperatureUnit::Celsius),
            "Температура в Oslo: 0°C"
        );
    }
}
