use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_DOM_OUTBOUND_QUEUE_CAP: usize = 256;

pub const POLL_INTERVAL_VAR: &str = "FORMKIT_POLL_INTERVAL_MS";
pub const EDITOR_VAR: &str = "FORMKIT_EDITOR";
pub const DOM_OUTBOUND_QUEUE_CAP_VAR: &str = "FORMKIT_DOM_OUTBOUND_QUEUE_CAP";

#[cfg(windows)]
const PLATFORM_EDITOR: &str = "notepad";
#[cfg(not(windows))]
const PLATFORM_EDITOR: &str = "vi";

/// Process-wide knobs, read from the environment once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub poll_interval: Duration,
    pub editor: String,
    pub dom_outbound_queue_cap: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            editor: PLATFORM_EDITOR.to_string(),
            dom_outbound_queue_cap: DEFAULT_DOM_OUTBOUND_QUEUE_CAP,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable source. Invalid or zero
    /// numeric values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let poll_interval = lookup(POLL_INTERVAL_VAR)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map_or(defaults.poll_interval, Duration::from_millis);

        let editor = [EDITOR_VAR, "VISUAL", "EDITOR"]
            .into_iter()
            .filter_map(&lookup)
            .find(|command| !command.trim().is_empty())
            .unwrap_or(defaults.editor);

        let dom_outbound_queue_cap = lookup(DOM_OUTBOUND_QUEUE_CAP_VAR)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.dom_outbound_queue_cap);

        Self {
            poll_interval,
            editor,
            dom_outbound_queue_cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(Settings::from_lookup(|_| None), Settings::default());
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let settings = Settings::from_lookup(lookup_from(&[
            (POLL_INTERVAL_VAR, "soon"),
            (DOM_OUTBOUND_QUEUE_CAP_VAR, "0"),
        ]));
        assert_eq!(settings.poll_interval, Duration::from_millis(10));
        assert_eq!(settings.dom_outbound_queue_cap, 256);
    }

    #[test]
    fn valid_numbers_are_used() {
        let settings = Settings::from_lookup(lookup_from(&[
            (POLL_INTERVAL_VAR, " 25 "),
            (DOM_OUTBOUND_QUEUE_CAP_VAR, "8"),
        ]));
        assert_eq!(settings.poll_interval, Duration::from_millis(25));
        assert_eq!(settings.dom_outbound_queue_cap, 8);
    }

    #[test]
    fn editor_prefers_own_variable_then_visual_then_editor() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("EDITOR", "nano"),
            ("VISUAL", "code --wait"),
        ]));
        assert_eq!(settings.editor, "code --wait");

        let settings = Settings::from_lookup(lookup_from(&[
            (EDITOR_VAR, "hx"),
            ("VISUAL", "code --wait"),
        ]));
        assert_eq!(settings.editor, "hx");

        let settings = Settings::from_lookup(lookup_from(&[(EDITOR_VAR, "  "), ("EDITOR", "nano")]));
        assert_eq!(settings.editor, "nano");
    }
}
