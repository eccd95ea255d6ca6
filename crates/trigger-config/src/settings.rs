//! Configuration structures.

use chrono::{NaiveDate, NaiveTime};
use config::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use trigger_broker::{CommandSink, CommandSinkConfig, HttpSink, HttpSinkConfig};
use trigger_core::error::DealError;
use trigger_core::traits::{SinkRegistry, TradeSink, WeekdayCalendar};
use trigger_core::types::ExecutionBackend;
use trigger_engine::{Clock, EngineSettings, StopRule};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub calendar: CalendarSettings,
    #[serde(default)]
    pub stops: StopSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub paper: PaperSettings,
    #[serde(default)]
    pub desktop: DesktopSettings,
    #[serde(default)]
    pub streaming: StreamingSettings,
}

impl AppConfig {
    /// Sinks for every configured backend; `paper` serves simulated deals.
    pub fn sink_registry(&self, paper: Arc<dyn TradeSink>) -> Result<SinkRegistry, DealError> {
        let mut registry = SinkRegistry::new().with(ExecutionBackend::Paper, paper);
        if let Some(command) = self.desktop.command() {
            registry.register(ExecutionBackend::Desktop, Arc::new(CommandSink::new(command)));
        }
        if let Some(gateway) = self.streaming.gateway() {
            registry.register(ExecutionBackend::Streaming, Arc::new(HttpSink::new(gateway)?));
        }
        Ok(registry)
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "trigger".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Optional log file, written alongside stdout
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `HH:MM:SS`; previous-close signals after this are stale
    pub stale_cutoff: String,
    pub stale_multiplier: Decimal,
    pub deal_timeout_secs: u64,
    /// Per-symbol quote channel capacity
    pub channel_capacity: usize,
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = EngineSettings::default();
        Self {
            stale_cutoff: defaults.stale_cutoff.format("%H:%M:%S").to_string(),
            stale_multiplier: defaults.stale_multiplier,
            deal_timeout_secs: defaults.deal_timeout.as_secs(),
            channel_capacity: 64,
            clock: defaults.clock,
        }
    }
}

impl EngineConfig {
    /// Convert to engine settings, validating the cutoff and multiplier.
    pub fn to_settings(&self) -> Result<EngineSettings, ConfigError> {
        let stale_cutoff = NaiveTime::parse_from_str(self.stale_cutoff.trim(), "%H:%M:%S")
            .map_err(|e| ConfigError::Message(format!("engine.stale_cutoff {:?}: {e}", self.stale_cutoff)))?;
        if self.stale_multiplier < Decimal::ONE {
            return Err(ConfigError::Message(format!(
                "engine.stale_multiplier must be at least 1, got {}",
                self.stale_multiplier
            )));
        }
        if self.deal_timeout_secs == 0 {
            return Err(ConfigError::Message("engine.deal_timeout_secs must be positive".to_string()));
        }

        Ok(EngineSettings {
            stale_cutoff,
            stale_multiplier: self.stale_multiplier,
            deal_timeout: Duration::from_secs(self.deal_timeout_secs),
            clock: self.clock,
        })
    }
}

/// Non-trading days on top of weekends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSettings {
    pub holidays: Vec<NaiveDate>,
}

impl CalendarSettings {
    pub fn calendar(&self) -> WeekdayCalendar {
        WeekdayCalendar::with_holidays(self.holidays.iter().copied())
    }
}

/// Protective watches created for held positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StopSettings {
    /// Stop-loss distance below cost, percent
    pub loss_pct: Option<Decimal>,
    /// Stop-profit target above cost, percent
    pub profit_pct: Option<Decimal>,
    /// Stop-profit pullback from the high, percent
    pub bounce_pct: Option<Decimal>,
}

impl StopSettings {
    /// Stop rules to apply to every holding.
    pub fn rules(&self) -> Vec<StopRule> {
        let mut rules = Vec::new();
        if let Some(loss_pct) = self.loss_pct {
            rules.push(StopRule::StopLoss { loss_pct });
        }
        if let Some(profit_pct) = self.profit_pct {
            rules.push(StopRule::StopProfit {
                profit_pct,
                bounce_pct: self.bounce_pct.unwrap_or(Decimal::ZERO),
            });
        }
        rules
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub rules: PathBuf,
    pub consumed_store: PathBuf,
    /// Optional CSV of current holdings
    pub holdings: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            rules: PathBuf::from("rules.csv"),
            consumed_store: PathBuf::from("data/consumed.jsonl"),
            holdings: None,
        }
    }
}

/// Paper sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    pub initial_cash: Decimal,
    pub slippage_pct: Decimal,
}

impl Default for PaperSettings {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            initial_cash: dec!(100000),
            slippage_pct: dec!(0.05),
        }
    }
}

/// Desktop automation bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopSettings {
    pub program: Option<String>,
    pub args: Vec<String>,
}

impl DesktopSettings {
    /// Bridge command, when a program is configured.
    pub fn command(&self) -> Option<CommandSinkConfig> {
        self.program.as_ref().map(|program| CommandSinkConfig {
            program: program.clone(),
            args: self.args.clone(),
        })
    }
}

/// Streaming-API gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: "TRIGGER_GATEWAY_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

impl StreamingSettings {
    /// Gateway settings with the key read from the environment.
    pub fn gateway(&self) -> Option<HttpSinkConfig> {
        self.base_url.as_ref().map(|base_url| {
            let mut config = HttpSinkConfig::new(base_url.clone()).with_key_from_env(&self.api_key_env);
            config.timeout_secs = self.timeout_secs;
            config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.app.name, "trigger");
        assert!(!config.logging.is_json());
        assert_eq!(config.paper.initial_cash, dec!(100000));
        assert!(config.desktop.command().is_none());
        assert!(config.streaming.gateway().is_none());
        assert!(config.stops.rules().is_empty());

        let engine = config.engine.to_settings().unwrap();
        assert_eq!(engine, EngineSettings::default());
    }

    #[test]
    fn test_invalid_engine_settings() {
        let config = EngineConfig {
            stale_cutoff: "9.32".to_string(),
            ..EngineConfig::default()
        };
        assert!(config.to_settings().is_err());

        let config = EngineConfig {
            stale_multiplier: dec!(0.5),
            ..EngineConfig::default()
        };
        assert!(config.to_settings().is_err());
    }

    #[test]
    fn test_stop_rules() {
        let stops = StopSettings {
            loss_pct: Some(dec!(5)),
            profit_pct: Some(dec!(10)),
            bounce_pct: Some(dec!(1)),
        };
        assert_eq!(
            stops.rules(),
            vec![
                StopRule::StopLoss { loss_pct: dec!(5) },
                StopRule::StopProfit {
                    profit_pct: dec!(10),
                    bounce_pct: dec!(1)
                },
            ]
        );
    }

    #[test]
    fn test_sink_registry_follows_config() {
        use trigger_broker::PaperSink;

        let paper: Arc<dyn TradeSink> = Arc::new(PaperSink::new(dec!(1000)));

        let registry = AppConfig::default().sink_registry(paper.clone()).unwrap();
        assert_eq!(registry.backends(), vec![ExecutionBackend::Paper]);
        assert!(registry.resolve(ExecutionBackend::Desktop).is_none());

        let config = AppConfig {
            desktop: DesktopSettings {
                program: Some("ths-bridge".to_string()),
                args: vec!["--account".to_string(), "main".to_string()],
            },
            streaming: StreamingSettings {
                base_url: Some("http://127.0.0.1:8080".to_string()),
                ..StreamingSettings::default()
            },
            ..AppConfig::default()
        };
        let registry = config.sink_registry(paper).unwrap();
        assert_eq!(registry.resolve(ExecutionBackend::Desktop).unwrap().name(), "desktop");
        assert_eq!(registry.resolve(ExecutionBackend::Streaming).unwrap().name(), "streaming");
        assert_eq!(registry.backends().len(), 3);
    }

    #[test]
    fn test_calendar_holidays() {
        use trigger_core::traits::TradingCalendar;

        let settings = CalendarSettings {
            holidays: vec![NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()],
        };
        let calendar = settings.calendar();
        assert!(!calendar.is_trading_day(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap()));
        assert!(calendar.is_trading_day(NaiveDate::from_ymd_opt(2024, 10, 8).unwrap()));
    }
}
