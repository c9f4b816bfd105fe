use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var("SCROLLFEED_OUTPUT_FORMAT").ok().as_deref(),
            env::var("SCROLLFEED_OUTPUT_PRETTY").ok().as_deref(),
        )
    }

    pub fn from_vars(format: Option<&str>, pretty: Option<&str>) -> Self {
        let format = match format {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        };
        let pretty = match pretty {
            Some(v) if v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => true,
            _ => false,
        };
        OutputConfig { format, pretty }
    }

    /// `--json` forces JSON regardless of the environment.
    pub fn with_json(mut self, json: bool) -> Self {
        if json { self.format = OutputFormat::Json; }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_and_pretty() {
        let cfg = OutputConfig::from_vars(Some("json"), Some("YES"));
        assert_eq!(cfg, OutputConfig { format: OutputFormat::Json, pretty: true });
        let cfg = OutputConfig::from_vars(Some("xml"), None);
        assert_eq!(cfg, OutputConfig { format: OutputFormat::Text, pretty: false });
        assert_eq!(cfg.with_json(true).format, OutputFormat::Json);
    }
}
