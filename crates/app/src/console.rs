use std::str::FromStr;

use bingbong_core::{Indicator, MetronomeError, SinkConfig, Tick};

/// Renders ticks as terminal lines. Stands in for the watch's sound and
/// haptic output, so it is the only reader of [`SinkConfig`].
#[derive(Debug, Clone)]
pub struct TickPrinter {
    config: SinkConfig,
}

impl TickPrinter {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    pub fn render(&self, tick: &Tick) -> String {
        let sound = if tick.sequence % 2 == 1 { "bing" } else { "bong" };
        let mut line = format!(
            "[{:>4}] {sound} ({}) @ {} bpm",
            tick.sequence, self.config.audio_asset_id, tick.bpm
        );
        if self.config.haptic_enabled {
            line.push_str(" ~bzz~");
        }
        line
    }
}

/// One line of interactive input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Edit,
    Nudge(i32),
    Set(i64),
    Done,
    Cancel,
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = MetronomeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err(MetronomeError::msg("empty command"));
        };

        let command = match head {
            "t" | "toggle" => Command::Toggle,
            "e" | "edit" => Command::Edit,
            "+" => Command::Nudge(1),
            "-" => Command::Nudge(-1),
            "set" => {
                let value = parts
                    .next()
                    .ok_or_else(|| MetronomeError::msg("usage: set <bpm>"))?;
                let value = value
                    .parse::<i64>()
                    .map_err(|_| MetronomeError::msg(format!("`{value}` is not a number")))?;
                Command::Set(value)
            }
            "done" => Command::Done,
            "cancel" => Command::Cancel,
            "s" | "status" => Command::Status,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" => Command::Quit,
            other => return Err(MetronomeError::msg(format!("unknown command `{other}`"))),
        };

        if parts.next().is_some() {
            return Err(MetronomeError::msg(format!("unexpected arguments after `{head}`")));
        }
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  t, toggle     play / pause
  e, edit       open the tempo editor (stops playback)
  + / -         nudge the staged tempo by one
  set <bpm>     stage a tempo
  done          commit the staged tempo
  cancel        discard the staged tempo
  s, status     show tempo and playback state
  q, quit       exit";

pub fn describe(indicator: &Indicator) -> String {
    format!(
        "{} [{}] swing {:>4.1}°",
        if indicator.playing { "playing" } else { "stopped" },
        indicator.icon.symbol_name(),
        indicator.angle_degrees
    )
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn tick(sequence: u64) -> Tick {
        Tick {
            sequence,
            generation: 1,
            bpm: 90,
            scheduled_at: Instant::now(),
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!("t".parse::<Command>().unwrap(), Command::Toggle);
        assert_eq!("+".parse::<Command>().unwrap(), Command::Nudge(1));
        assert_eq!(" set 140 ".parse::<Command>().unwrap(), Command::Set(140));
        assert_eq!("cancel".parse::<Command>().unwrap(), Command::Cancel);
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!("".parse::<Command>().is_err());
        assert!("set".parse::<Command>().is_err());
        assert!("set fast".parse::<Command>().is_err());
        assert!("toggle now".parse::<Command>().is_err());
        assert!("jump".parse::<Command>().is_err());
    }

    #[test]
    fn printer_honours_sink_config() {
        let quiet = TickPrinter::new(SinkConfig {
            haptic_enabled: false,
            audio_asset_id: "woodblock".to_string(),
        });
        let line = quiet.render(&tick(1));
        assert!(line.contains("woodblock"));
        assert!(line.contains("bing"));
        assert!(!line.contains("bzz"));

        let buzzy = TickPrinter::new(SinkConfig::default());
        let line = buzzy.render(&tick(2));
        assert!(line.contains("bong"));
        assert!(line.contains("bzz"));
    }

    #[test]
    fn describes_idle_indicator() {
        let text = describe(&Indicator::idle());
        assert!(text.starts_with("stopped"));
        assert!(text.contains("play.fill"));
    }
}
